use crate::entities::{PaymentStatus, payment_entity};
use crate::models::{PremiumPlan, UserType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentIntentRequest {
    /// Smallest currency unit; must match the server price table exactly.
    #[schema(example = 199)]
    pub amount: i64,
    #[schema(example = "monthly")]
    pub plan_id: String,
    /// `standard` (default) or `advocate`.
    #[schema(example = "standard")]
    pub user_type: Option<String>,
    #[schema(example = "meera@example.com")]
    pub email: String,
    #[schema(example = "Meera Nair")]
    pub full_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
    pub plan_id: PremiumPlan,
    pub user_type: UserType,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    #[schema(example = "pi_3Nx...")]
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    /// Payment went through and the profile still needs to be filled in.
    CompleteProfile,
    /// Payment went through; go back to the app.
    Continue,
    /// The provider declined; show the message and let the user try again.
    Retry,
    /// Still processing or waiting on customer action.
    Wait,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmPaymentResponse {
    pub payment_intent_id: String,
    pub status: String,
    pub next_step: NextStep,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentConfigResponse {
    pub publishable_key: String,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentRecordResponse {
    pub id: i64,
    pub transaction_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub plan: PremiumPlan,
    pub user_type: UserType,
    pub granted_until: Option<DateTime<Utc>>,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<payment_entity::Model> for PaymentRecordResponse {
    fn from(p: payment_entity::Model) -> Self {
        Self {
            id: p.id,
            transaction_id: p.transaction_id,
            amount: p.amount,
            currency: p.currency,
            status: p.status,
            plan: p.plan,
            user_type: p.user_type,
            granted_until: p.granted_until,
            failure_message: p.failure_message,
            created_at: p.created_at,
        }
    }
}
