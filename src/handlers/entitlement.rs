use crate::handlers::current_identity;
use crate::models::*;
use crate::services::EntitlementService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/entitlement",
    tag = "entitlement",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current premium entitlement", body = Entitlement),
        (status = 401, description = "Unauthenticated"),
        (status = 503, description = "Storage unavailable and policy is `error`")
    )
)]
pub async fn get_entitlement(
    entitlement_service: web::Data<EntitlementService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match entitlement_service.check(&identity.external_id).await {
        Ok(entitlement) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": entitlement
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// Gated content. Non-premium callers get the upsell view with a 200.
#[utoipa::path(
    get,
    path = "/premium/access",
    tag = "entitlement",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Premium features or the upsell view", body = PremiumAccessResponse),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn premium_access(
    entitlement_service: web::Data<EntitlementService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match entitlement_service.premium_access(&identity.external_id).await {
        Ok(view) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": view
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn entitlement_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/entitlement", web::get().to(get_entitlement))
        .route("/premium/access", web::get().to(premium_access));
}
