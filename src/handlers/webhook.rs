use crate::error::AppError;
use crate::models::PaymentEvent;
use crate::services::{EventOutcome, PaymentEventService};
use crate::utils::WebhookVerifier;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use chrono::Utc;
use log::{error, info, warn};

/// Stripe webhook处理器
///
/// Takes the raw body: the signature covers the exact bytes Stripe sent.
/// Nothing touches storage before the signature checks out.
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    verifier: web::Data<WebhookVerifier>,
    event_service: web::Data<PaymentEventService>,
) -> Result<HttpResponse> {
    let signature = match req
        .headers()
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(sig) => sig,
        None => {
            warn!("Missing Stripe-Signature header");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing Stripe-Signature header"
            })));
        }
    };

    let now = Utc::now();
    if let Err(e) = verifier.verify(&body, signature, now.timestamp()) {
        warn!("Webhook signature verification failed: {e}");
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid signature"
        })));
    }

    // 签名已通过但内容无法处理：确认收到，避免 Stripe 无限重试
    let event = match PaymentEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            error!("Unprocessable webhook payload: {e}");
            return Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true
            })));
        }
    };

    let event_id = event.event_id().to_string();
    match event_service.apply(event, now).await {
        Ok(outcome) => {
            match &outcome {
                EventOutcome::UserNotFound => {
                    warn!("Webhook event {event_id} references an unknown user")
                }
                other => info!("Processed webhook event {event_id}: {other:?}"),
            }
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true
            })))
        }
        Err(e) => {
            error!("Failed to process webhook event {event_id}: {e}");
            let message = match e {
                AppError::StorageTimeout(_) | AppError::DatabaseError(_) => "Storage failure",
                _ => "Processing failed",
            };
            // 返回 500，让 Stripe 稍后重试
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": message
            })))
        }
    }
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/stripe", web::post().to(stripe_webhook)));
}
