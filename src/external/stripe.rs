use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};
use crate::external::provider::{IntentStatus, NewPaymentIntent, PaymentProvider, ProviderIntent};
use async_trait::async_trait;
use stripe::{
    Client, CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods, Currency,
    PaymentIntent, PaymentIntentId, PaymentIntentStatus, StripeError,
};

const PROVIDER_UNAVAILABLE: &str = "Payment provider is unavailable, please try again";

/// Stripe-backed `PaymentProvider`. Built once in `main` and shared through `Arc`.
#[derive(Clone)]
pub struct StripeService {
    client: Client,
}

impl StripeService {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeService {
    async fn create_intent(&self, request: NewPaymentIntent) -> AppResult<ProviderIntent> {
        let currency: Currency =
            serde_json::from_value(serde_json::Value::String(request.currency.clone())).map_err(
                |_| AppError::ConfigError(format!("Unsupported currency: {}", request.currency)),
            )?;

        let mut params = CreatePaymentIntent::new(request.amount, currency);
        params.metadata = Some(request.metadata.to_map());
        params.description = Some(&request.description);
        params.receipt_email = Some(&request.receipt_email);
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            allow_redirects: None,
        });

        let intent = PaymentIntent::create(&self.client, params)
            .await
            .map_err(map_stripe_error)?;
        log::info!(
            "Created PaymentIntent {} for user_id={} plan={}",
            intent.id,
            request.metadata.user_id,
            request.metadata.plan
        );
        Ok(into_provider_intent(intent))
    }

    async fn retrieve_intent(&self, payment_intent_id: &str) -> AppResult<ProviderIntent> {
        let id = payment_intent_id
            .parse::<PaymentIntentId>()
            .map_err(|_| AppError::ValidationError("Invalid payment_intent_id".to_string()))?;
        let intent = PaymentIntent::retrieve(&self.client, &id, &[])
            .await
            .map_err(map_stripe_error)?;
        Ok(into_provider_intent(intent))
    }
}

fn into_provider_intent(intent: PaymentIntent) -> ProviderIntent {
    let last_error = intent
        .last_payment_error
        .as_ref()
        .and_then(|e| e.message.clone());
    ProviderIntent {
        id: intent.id.to_string(),
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency.to_string(),
        status: map_status(&intent.status, last_error.is_some()),
        raw_status: intent.status.as_str().to_string(),
        metadata: intent.metadata,
        last_error,
    }
}

/// A declined confirmation leaves the intent in `requires_payment_method`
/// with `last_payment_error` set; that is a failure from the customer's view.
fn map_status(status: &PaymentIntentStatus, has_error: bool) -> IntentStatus {
    match status {
        PaymentIntentStatus::Succeeded => IntentStatus::Succeeded,
        PaymentIntentStatus::Canceled => IntentStatus::Failed,
        PaymentIntentStatus::RequiresPaymentMethod if has_error => IntentStatus::Failed,
        _ => IntentStatus::Pending,
    }
}

/// Provider-reported errors (declines, invalid params) are passed on verbatim;
/// transport problems become a generic retry message.
fn map_stripe_error(err: StripeError) -> AppError {
    match err {
        StripeError::Stripe(req) => {
            log::warn!("Stripe rejected request ({}): {:?}", req.http_status, req.message);
            AppError::ExternalApiError(
                req.message
                    .unwrap_or_else(|| PROVIDER_UNAVAILABLE.to_string()),
            )
        }
        other => {
            log::error!("Stripe request failed: {other}");
            AppError::ExternalApiError(PROVIDER_UNAVAILABLE.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status() {
        assert_eq!(
            map_status(&PaymentIntentStatus::Succeeded, false),
            IntentStatus::Succeeded
        );
        assert_eq!(
            map_status(&PaymentIntentStatus::RequiresPaymentMethod, true),
            IntentStatus::Failed
        );
        assert_eq!(
            map_status(&PaymentIntentStatus::RequiresPaymentMethod, false),
            IntentStatus::Pending
        );
        assert_eq!(
            map_status(&PaymentIntentStatus::Processing, false),
            IntentStatus::Pending
        );
        assert_eq!(
            map_status(&PaymentIntentStatus::Canceled, false),
            IntentStatus::Failed
        );
    }

    #[test]
    fn test_transport_errors_become_generic_retry_message() {
        match map_stripe_error(StripeError::ClientError("connection reset".into())) {
            AppError::ExternalApiError(msg) => assert_eq!(msg, PROVIDER_UNAVAILABLE),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stripe_service_creation() {
        let config = StripeConfig {
            secret_key: "sk_test_123".to_string(),
            publishable_key: "pk_test_123".to_string(),
            webhook_secret: "whsec_123".to_string(),
            currency: "usd".to_string(),
            webhook_tolerance_secs: 300,
        };
        let _service = StripeService::new(&config);
    }
}
