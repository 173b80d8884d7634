use crate::handlers::current_identity;
use crate::models::*;
use crate::services::PaymentService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/payments/intent",
    tag = "payment",
    request_body = CreatePaymentIntentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "PaymentIntent created", body = CreatePaymentIntentResponse),
        (status = 400, description = "Unknown plan, amount mismatch or missing fields"),
        (status = 401, description = "Unauthenticated"),
        (status = 502, description = "Payment provider error")
    )
)]
pub async fn create_payment_intent(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    request: web::Json<CreatePaymentIntentRequest>,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match payment_service
        .create_payment_intent(&identity, request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/payments/confirm",
    tag = "payment",
    request_body = ConfirmPaymentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Provider-side status of the intent", body = ConfirmPaymentResponse),
        (status = 401, description = "Unauthenticated"),
        (status = 403, description = "Intent belongs to another user"),
        (status = 502, description = "Payment provider error")
    )
)]
pub async fn confirm_payment(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    request: web::Json<ConfirmPaymentRequest>,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match payment_service
        .confirm_payment(&identity, request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/payments/config",
    tag = "payment",
    responses(
        (status = 200, description = "Publishable key and currency", body = PaymentConfigResponse)
    )
)]
pub async fn get_payment_config(payment_service: web::Data<PaymentService>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(payment_service.payment_config())))
}

#[utoipa::path(
    get,
    path = "/payments",
    tag = "payment",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Payment history, newest first", body = [PaymentRecordResponse]),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn list_payments(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let identity = match current_identity(&req) {
        Ok(identity) => identity,
        Err(e) => return Ok(e.error_response()),
    };

    match payment_service.list_payments(&identity).await {
        Ok(records) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": records
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/plans",
    tag = "payment",
    responses(
        (status = 200, description = "Premium price table", body = [PlanPrice])
    )
)]
pub async fn list_plans(payment_service: web::Data<PaymentService>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(payment_service.plans())))
}

pub fn payment_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("", web::get().to(list_payments))
            .route("/intent", web::post().to(create_payment_intent))
            .route("/confirm", web::post().to(confirm_payment))
            .route("/config", web::get().to(get_payment_config)),
    )
    .route("/plans", web::get().to(list_plans));
}
