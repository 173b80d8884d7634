//! Test-mode payment bypass.
//!
//! Compiled only with the `payment-bypass` cargo feature so that QA builds can
//! finish onboarding without a card. It shares nothing with the webhook path
//! and writes no `payments` row; the next failed-payment event or the expiry
//! sweep clears what it grants.

use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, Set};
use subtle::ConstantTimeEq;

const BYPASS_GRANT_DAYS: i64 = 30;

#[derive(Clone, Default)]
pub struct PaymentBypass {
    token: Option<String>,
}

impl PaymentBypass {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match &self.token {
            Some(token) => bool::from(token.as_bytes().ct_eq(candidate.as_bytes())),
            None => false,
        }
    }

    pub async fn grant<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i64,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if !self.matches(candidate) {
            return Err(AppError::ValidationError(
                "Invalid payment bypass token".to_string(),
            ));
        }

        let user = users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let expires_at = bypass_expiry(user.premium_expires_at, now);
        let mut am = user.into_active_model();
        am.is_premium = Set(true);
        am.premium_expires_at = Set(Some(expires_at));
        am.updated_at = Set(now);
        am.update(db).await?;

        log::warn!("Payment bypass used: premium granted to user_id={user_id} without payment");
        Ok(())
    }
}

/// Never shortens a paid grant that runs past the bypass window.
fn bypass_expiry(existing: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let grant_end = now + Duration::days(BYPASS_GRANT_DAYS);
    match existing {
        Some(existing) if existing > grant_end => existing,
        _ => grant_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_requires_configured_token() {
        assert!(!PaymentBypass::disabled().matches(""));
        assert!(!PaymentBypass::new(Some(String::new())).matches(""));
        let bypass = PaymentBypass::new(Some("qa-skip".into()));
        assert!(bypass.matches("qa-skip"));
        assert!(!bypass.matches("qa-skip2"));
    }

    #[test]
    fn test_bypass_keeps_longer_paid_expiry() {
        let now = Utc::now();
        let paid = now + Duration::days(365);
        assert_eq!(bypass_expiry(Some(paid), now), paid);
        assert_eq!(bypass_expiry(None, now), now + Duration::days(30));
        assert_eq!(
            bypass_expiry(Some(now + Duration::days(3)), now),
            now + Duration::days(30)
        );
        assert_eq!(
            bypass_expiry(Some(now - Duration::days(3)), now),
            now + Duration::days(30)
        );
    }
}
