use crate::entities::UserRole;
use crate::models::PlanPrice;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementReason {
    Admin,
    ActivePremium,
    Expired,
    NotPremium,
    UnknownUser,
    StorageUnavailable,
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Entitlement {
    pub premium: bool,
    pub role: Option<UserRole>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: EntitlementReason,
}

impl Entitlement {
    pub fn denied(reason: EntitlementReason) -> Self {
        Self {
            premium: false,
            role: None,
            expires_at: None,
            reason,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum PremiumAccessResponse {
    Granted {
        features: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
    },
    /// Upsell view shown instead of an error when the caller is not premium.
    Gated {
        message: String,
        reason: EntitlementReason,
        plans: Vec<PlanPrice>,
    },
}
