use actix_cors::Cors;

/// `allowed_origins` empty => any origin (local development only).
pub fn create_cors(allowed_origins: &[String]) -> Cors {
    let cors = if allowed_origins.is_empty() {
        Cors::default().allowed_origin_fn(|_, _req_head| true)
    } else {
        allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        // 前端会带 Authorization 与 Stripe.js 的自定义 Header
        .allow_any_header()
        .max_age(3600)
}
