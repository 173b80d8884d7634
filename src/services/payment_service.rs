use crate::config::StripeConfig;
use crate::entities::payment_entity as payments;
use crate::error::{AppError, AppResult};
use crate::external::{IntentStatus, NewPaymentIntent, PaymentProvider};
use crate::models::*;
use crate::services::UserService;
use crate::utils::{Identity, normalize_email, validate_email};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;

#[derive(Clone)]
pub struct PaymentService {
    pool: DatabaseConnection,
    provider: Arc<dyn PaymentProvider>,
    user_service: UserService,
    currency: String,
    publishable_key: String,
}

impl PaymentService {
    pub fn new(
        pool: DatabaseConnection,
        provider: Arc<dyn PaymentProvider>,
        user_service: UserService,
        stripe_config: &StripeConfig,
    ) -> Self {
        Self {
            pool,
            provider,
            user_service,
            currency: stripe_config.currency.to_ascii_lowercase(),
            publishable_key: stripe_config.publishable_key.clone(),
        }
    }

    pub fn payment_config(&self) -> PaymentConfigResponse {
        PaymentConfigResponse {
            publishable_key: self.publishable_key.clone(),
            currency: self.currency.clone(),
        }
    }

    pub fn plans(&self) -> Vec<PlanPrice> {
        price_table(&self.currency)
    }

    /// Checks the submitted amount against the server price table.
    pub fn resolve_price(
        plan_id: &str,
        user_type: Option<&str>,
        amount: i64,
    ) -> AppResult<(PremiumPlan, UserType)> {
        let plan = PremiumPlan::parse(plan_id.trim())
            .ok_or_else(|| AppError::ValidationError(format!("Unknown plan_id: {plan_id}")))?;
        let user_type = match user_type.map(str::trim) {
            None | Some("") => UserType::Standard,
            Some(raw) => UserType::parse(raw)
                .ok_or_else(|| AppError::ValidationError(format!("Unknown user_type: {raw}")))?,
        };

        let expected = plan.price_cents(user_type);
        if amount != expected {
            return Err(AppError::ValidationError(format!(
                "Amount {amount} does not match the price of the {plan} plan for {user_type} users"
            )));
        }
        Ok((plan, user_type))
    }

    /// Creates a provider-side PaymentIntent. Writes nothing locally: the
    /// grant only happens once the signed webhook arrives.
    pub async fn create_payment_intent(
        &self,
        identity: &Identity,
        request: CreatePaymentIntentRequest,
    ) -> AppResult<CreatePaymentIntentResponse> {
        let full_name = request.full_name.trim();
        if full_name.is_empty() {
            return Err(AppError::ValidationError("full_name is required".to_string()));
        }
        validate_email(&request.email)?;
        let (plan, user_type) =
            Self::resolve_price(&request.plan_id, request.user_type.as_deref(), request.amount)?;

        let user = self.user_service.require_user(identity).await?;

        let metadata = IntentMetadata {
            user_id: user.id,
            email: normalize_email(&request.email),
            plan,
            user_type,
        };
        let intent = self
            .provider
            .create_intent(NewPaymentIntent {
                amount: request.amount,
                currency: self.currency.clone(),
                description: format!("{full_name}: {plan} premium ({user_type})"),
                receipt_email: metadata.email.clone(),
                metadata,
            })
            .await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            AppError::ExternalApiError("Payment provider returned no client secret".to_string())
        })?;

        Ok(CreatePaymentIntentResponse {
            client_secret,
            payment_intent_id: intent.id,
            amount: request.amount,
            currency: self.currency.clone(),
            plan_id: plan,
            user_type,
        })
    }

    /// Reports the provider-side outcome of a client confirmation. Read-only:
    /// entitlement is only granted by the webhook receiver.
    pub async fn confirm_payment(
        &self,
        identity: &Identity,
        request: ConfirmPaymentRequest,
    ) -> AppResult<ConfirmPaymentResponse> {
        let payment_intent_id = request.payment_intent_id.trim();
        if payment_intent_id.is_empty() {
            return Err(AppError::ValidationError(
                "payment_intent_id is required".to_string(),
            ));
        }

        let user = self.user_service.require_user(identity).await?;
        let intent = self.provider.retrieve_intent(payment_intent_id).await?;

        let owner = intent
            .metadata
            .get("user_id")
            .and_then(|v| v.parse::<i64>().ok());
        if owner != Some(user.id) {
            return Err(AppError::Forbidden(
                "Payment does not belong to the current user".to_string(),
            ));
        }

        let (next_step, message) = match intent.status {
            IntentStatus::Succeeded => {
                let next = if user.profile_completed {
                    NextStep::Continue
                } else {
                    NextStep::CompleteProfile
                };
                (
                    next,
                    "Payment received. Premium access activates as soon as the payment is confirmed."
                        .to_string(),
                )
            }
            IntentStatus::Failed => (
                NextStep::Retry,
                intent
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "Payment failed, please try again".to_string()),
            ),
            IntentStatus::Pending => (
                NextStep::Wait,
                "Payment is still processing".to_string(),
            ),
        };

        log::info!(
            "Client confirmation for {} by user_id={}: {}",
            intent.id,
            user.id,
            intent.raw_status
        );

        Ok(ConfirmPaymentResponse {
            payment_intent_id: intent.id,
            status: intent.raw_status,
            next_step,
            message,
        })
    }

    pub async fn list_payments(&self, identity: &Identity) -> AppResult<Vec<PaymentRecordResponse>> {
        let user = self.user_service.require_user(identity).await?;
        let rows = payments::Entity::find()
            .filter(payments::Column::UserId.eq(user.id))
            .order_by_desc(payments::Column::CreatedAt)
            .all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PaymentRecordResponse::from).collect())
    }
}
