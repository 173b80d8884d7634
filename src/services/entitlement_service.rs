use crate::config::StorageErrorPolicy;
use crate::database::with_timeout;
use crate::entities::{UserRole, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::future::Future;

const PREMIUM_FEATURES: [&str; 4] = [
    "case_law_search",
    "document_templates",
    "advocate_directory",
    "priority_support",
];

/// Read-side premium gate. Every check loads the user fresh; nothing is cached.
#[derive(Clone)]
pub struct EntitlementService {
    pool: DatabaseConnection,
    timeout_secs: u64,
    policy: StorageErrorPolicy,
    currency: String,
}

impl EntitlementService {
    pub fn new(
        pool: DatabaseConnection,
        timeout_secs: u64,
        policy: StorageErrorPolicy,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            timeout_secs,
            policy,
            currency: currency.into(),
        }
    }

    /// Decision over an already loaded record. Expiry is exclusive: a grant
    /// ending exactly at `now` no longer counts.
    pub fn evaluate(user: Option<&users::Model>, now: DateTime<Utc>) -> Entitlement {
        let Some(user) = user else {
            return Entitlement::denied(EntitlementReason::UnknownUser);
        };

        if user.role == UserRole::Admin {
            return Entitlement {
                premium: true,
                role: Some(user.role),
                expires_at: user.premium_expires_at,
                reason: EntitlementReason::Admin,
            };
        }

        let (premium, reason) = match (user.is_premium, user.premium_expires_at) {
            (false, _) => (false, EntitlementReason::NotPremium),
            (true, None) => (true, EntitlementReason::ActivePremium),
            (true, Some(expires)) if expires > now => (true, EntitlementReason::ActivePremium),
            (true, Some(_)) => (false, EntitlementReason::Expired),
        };
        Entitlement {
            premium,
            role: Some(user.role),
            expires_at: user.premium_expires_at,
            reason,
        }
    }

    /// Runs a user lookup under the storage timeout and applies the storage
    /// error policy when it fails.
    pub async fn gate<F>(
        lookup: F,
        timeout_secs: u64,
        policy: StorageErrorPolicy,
        now: DateTime<Utc>,
    ) -> AppResult<Entitlement>
    where
        F: Future<Output = AppResult<Option<users::Model>>>,
    {
        match with_timeout(timeout_secs, lookup).await {
            Ok(user) => Ok(Self::evaluate(user.as_ref(), now)),
            Err(e) => match policy {
                StorageErrorPolicy::Deny => {
                    log::error!("Entitlement lookup failed, denying premium: {e}");
                    Ok(Entitlement::denied(EntitlementReason::StorageUnavailable))
                }
                StorageErrorPolicy::Error => {
                    log::error!("Entitlement lookup failed: {e}");
                    Err(AppError::ServiceUnavailable(
                        "Entitlement check is temporarily unavailable".to_string(),
                    ))
                }
            },
        }
    }

    pub async fn check(&self, external_id: &str) -> AppResult<Entitlement> {
        self.check_at(external_id, Utc::now()).await
    }

    pub async fn check_at(&self, external_id: &str, now: DateTime<Utc>) -> AppResult<Entitlement> {
        let lookup = async {
            let user = users::Entity::find()
                .filter(users::Column::ExternalId.eq(external_id))
                .one(&self.pool)
                .await?;
            Ok(user)
        };
        Self::gate(lookup, self.timeout_secs, self.policy, now).await
    }

    /// Premium content descriptor, or the upsell view for everyone else.
    pub async fn premium_access(&self, external_id: &str) -> AppResult<PremiumAccessResponse> {
        let entitlement = self.check(external_id).await?;
        if entitlement.premium {
            return Ok(PremiumAccessResponse::Granted {
                features: PREMIUM_FEATURES.iter().map(|f| f.to_string()).collect(),
                expires_at: entitlement.expires_at,
            });
        }

        let message = match entitlement.reason {
            EntitlementReason::Expired => "Your premium access has expired. Renew to continue.",
            EntitlementReason::StorageUnavailable => {
                "We could not verify your subscription right now. Please try again shortly."
            }
            _ => "Upgrade to premium to unlock this content.",
        };
        Ok(PremiumAccessResponse::Gated {
            message: message.to_string(),
            reason: entitlement.reason,
            plans: price_table(&self.currency),
        })
    }

    /// Clears `is_premium` on grants that ended. The stored expiry is kept so
    /// a later purchase can still see it.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::IsPremium, Expr::value(false))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::IsPremium.eq(true))
            .filter(users::Column::PremiumExpiresAt.is_not_null())
            .filter(users::Column::PremiumExpiresAt.lte(now))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected)
    }
}
