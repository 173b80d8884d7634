use crate::error::{AppError, AppResult};
use crate::models::{PremiumPlan, UserType};
use serde::Deserialize;
use std::collections::HashMap;

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";
pub const EVENT_PAYMENT_CANCELED: &str = "payment_intent.canceled";

/// Checkout context stamped onto every PaymentIntent we create and read back
/// from the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMetadata {
    pub user_id: i64,
    pub email: String,
    pub plan: PremiumPlan,
    pub user_type: UserType,
}

impl IntentMetadata {
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            ("user_id".to_string(), self.user_id.to_string()),
            ("email".to_string(), self.email.clone()),
            ("plan_id".to_string(), self.plan.to_string()),
            ("user_type".to_string(), self.user_type.to_string()),
        ])
    }

    pub fn from_map(map: &HashMap<String, String>) -> AppResult<Self> {
        let field = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::ValidationError(format!("Missing {key} in metadata")))
        };

        let user_id = field("user_id")?
            .parse::<i64>()
            .map_err(|_| AppError::ValidationError("Invalid user_id in metadata".to_string()))?;
        let email = field("email")?.to_string();
        let plan_raw = field("plan_id")?;
        let plan = PremiumPlan::parse(plan_raw).ok_or_else(|| {
            AppError::ValidationError(format!("Unknown plan_id in metadata: {plan_raw}"))
        })?;
        let user_type_raw = field("user_type")?;
        let user_type = UserType::parse(user_type_raw).ok_or_else(|| {
            AppError::ValidationError(format!("Unknown user_type in metadata: {user_type_raw}"))
        })?;

        Ok(Self {
            user_id,
            email,
            plan,
            user_type,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IntentObject {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Deserialize)]
struct LastPaymentError {
    #[serde(default)]
    message: Option<String>,
}

/// A PaymentIntent outcome carried by a verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentOutcome {
    pub event_id: String,
    /// PaymentIntent id, used as the idempotency key.
    pub transaction_id: String,
    pub amount: i64,
    pub currency: String,
    pub metadata: IntentMetadata,
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Succeeded(IntentOutcome),
    Failed(IntentOutcome),
    Canceled(IntentOutcome),
    Ignored { event_id: String, event_type: String },
}

impl PaymentEvent {
    /// Parses an already signature-checked payload.
    pub fn parse(payload: &[u8]) -> AppResult<Self> {
        let envelope: EventEnvelope = serde_json::from_slice(payload)?;

        let wrap: fn(IntentOutcome) -> PaymentEvent = match envelope.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED => PaymentEvent::Succeeded,
            EVENT_PAYMENT_FAILED => PaymentEvent::Failed,
            EVENT_PAYMENT_CANCELED => PaymentEvent::Canceled,
            _ => {
                return Ok(PaymentEvent::Ignored {
                    event_id: envelope.id,
                    event_type: envelope.event_type,
                });
            }
        };

        let intent: IntentObject = serde_json::from_value(envelope.data.object)?;
        let metadata = IntentMetadata::from_map(&intent.metadata)?;
        Ok(wrap(IntentOutcome {
            event_id: envelope.id,
            transaction_id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
            metadata,
            failure_message: intent.last_payment_error.and_then(|e| e.message),
        }))
    }

    pub fn event_id(&self) -> &str {
        match self {
            PaymentEvent::Succeeded(o) | PaymentEvent::Failed(o) | PaymentEvent::Canceled(o) => {
                &o.event_id
            }
            PaymentEvent::Ignored { event_id, .. } => event_id,
        }
    }
}
