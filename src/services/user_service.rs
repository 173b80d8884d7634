use crate::database::with_timeout;
use crate::entities::{UserRole, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::{Identity, normalize_email, validate_email};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};

#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
    timeout_secs: u64,
    #[cfg(feature = "payment-bypass")]
    bypass: crate::services::bypass::PaymentBypass,
}

impl UserService {
    pub fn new(pool: DatabaseConnection, timeout_secs: u64) -> Self {
        Self {
            pool,
            timeout_secs,
            #[cfg(feature = "payment-bypass")]
            bypass: crate::services::bypass::PaymentBypass::disabled(),
        }
    }

    #[cfg(feature = "payment-bypass")]
    pub fn with_bypass(mut self, bypass: crate::services::bypass::PaymentBypass) -> Self {
        self.bypass = bypass;
        self
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<users::Model>> {
        with_timeout(self.timeout_secs, async {
            let user = users::Entity::find()
                .filter(users::Column::ExternalId.eq(external_id))
                .one(&self.pool)
                .await?;
            Ok(user)
        })
        .await
    }

    /// Loads the caller's record or fails with 404.
    pub async fn require_user(&self, identity: &Identity) -> AppResult<users::Model> {
        self.find_by_external_id(&identity.external_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("User not found, complete sign-in first".to_string())
            })
    }

    /// Authentication callback: creates the local record for a verified
    /// identity on first sign-in. Safe to call on every login.
    pub async fn ensure_user(&self, identity: &Identity) -> AppResult<users::Model> {
        let email = identity
            .email
            .as_deref()
            .ok_or_else(|| {
                AppError::ValidationError("Identity token carries no email".to_string())
            })?;
        validate_email(email)?;
        let email = normalize_email(email);
        let display_name = identity
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let now = Utc::now();
        let record = users::ActiveModel {
            external_id: Set(identity.external_id.clone()),
            email: Set(email),
            display_name: Set(display_name),
            role: Set(UserRole::User),
            is_premium: Set(false),
            premium_expires_at: Set(None),
            profile_completed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let inserted = users::Entity::insert(record)
            .on_conflict(
                OnConflict::column(users::Column::ExternalId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.pool)
            .await?;
        if inserted > 0 {
            log::info!("Created user for identity {}", identity.external_id);
        }

        self.require_user(identity).await
    }

    pub async fn get_profile(&self, identity: &Identity) -> AppResult<UserResponse> {
        Ok(UserResponse::from(self.require_user(identity).await?))
    }

    /// First-time profile setup. Writes role and profile fields only; premium
    /// state comes from the payment webhook.
    pub async fn complete_profile(
        &self,
        identity: &Identity,
        request: CompleteProfileRequest,
    ) -> AppResult<CompleteProfileResponse> {
        if request.role == UserRole::Admin {
            return Err(AppError::ValidationError(
                "The admin role cannot be self-assigned".to_string(),
            ));
        }
        let display_name = validate_display_name(&request.display_name)?;
        let bar_number = clean(request.bar_registration_number);
        if request.role == UserRole::Advocate && bar_number.is_none() {
            return Err(AppError::ValidationError(
                "Advocates must provide a bar registration number".to_string(),
            ));
        }
        let phone = clean(request.phone);
        if let Some(p) = phone.as_deref() {
            validate_phone(p)?;
        }

        #[cfg(not(feature = "payment-bypass"))]
        if request.payment_bypass_token.is_some() {
            return Err(AppError::ValidationError(
                "Payment bypass is not available in this build".to_string(),
            ));
        }

        let existing = self.ensure_user(identity).await?;
        if existing.profile_completed {
            return Err(AppError::ValidationError(
                "Profile already completed, use the profile update endpoint".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;
        // 管理员角色只能由后台设置，这里不会覆盖
        let keep_admin = existing.role == UserRole::Admin;
        let user_id = existing.id;
        let mut am = existing.into_active_model();
        if !keep_admin {
            am.role = Set(request.role);
        }
        am.display_name = Set(display_name);
        am.city = Set(clean(request.city));
        am.phone = Set(phone);
        am.bar_registration_number = Set(bar_number);
        am.profile_completed = Set(true);
        am.updated_at = Set(Utc::now());
        am.update(&txn).await?;

        #[cfg(feature = "payment-bypass")]
        if let Some(token) = request.payment_bypass_token.as_deref() {
            self.bypass.grant(&txn, user_id, token, Utc::now()).await?;
        }

        txn.commit().await?;

        let user = users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let next_step = if user.is_premium || user.role == UserRole::Admin {
            "continue"
        } else {
            "checkout"
        };
        Ok(CompleteProfileResponse {
            user: UserResponse::from(user),
            next_step: next_step.to_string(),
        })
    }

    /// Edits non-entitlement profile fields.
    pub async fn update_profile(
        &self,
        identity: &Identity,
        request: UpdateProfileRequest,
    ) -> AppResult<UserResponse> {
        if request.display_name.is_none()
            && request.city.is_none()
            && request.phone.is_none()
            && request.bar_registration_number.is_none()
        {
            return Err(AppError::ValidationError("No fields to update".to_string()));
        }

        let user = self.require_user(identity).await?;
        let role = user.role;
        let mut am = user.into_active_model();

        if let Some(name) = request.display_name.as_deref() {
            am.display_name = Set(validate_display_name(name)?);
        }
        if request.city.is_some() {
            am.city = Set(clean(request.city));
        }
        if request.phone.is_some() {
            let phone = clean(request.phone);
            if let Some(p) = phone.as_deref() {
                validate_phone(p)?;
            }
            am.phone = Set(phone);
        }
        if request.bar_registration_number.is_some() {
            let bar_number = clean(request.bar_registration_number);
            if role == UserRole::Advocate && bar_number.is_none() {
                return Err(AppError::ValidationError(
                    "Advocates must keep a bar registration number".to_string(),
                ));
            }
            am.bar_registration_number = Set(bar_number);
        }
        am.updated_at = Set(Utc::now());

        let updated = am.update(&self.pool).await?;
        Ok(UserResponse::from(updated))
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_display_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    let len = name.chars().count();
    if !(2..=80).contains(&len) {
        return Err(AppError::ValidationError(
            "Display name length must be between 2 and 80 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_phone(phone: &str) -> AppResult<()> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    if !allowed || !(7..=15).contains(&digits) {
        return Err(AppError::ValidationError("Invalid phone number".to_string()));
    }
    Ok(())
}
