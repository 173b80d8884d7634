use crate::entities::{UserRole, user_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub bar_registration_number: Option<String>,
    pub profile_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user_entity::Model> for UserResponse {
    fn from(user: user_entity::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            is_premium: user.is_premium,
            premium_expires_at: user.premium_expires_at,
            city: user.city,
            phone: user.phone,
            bar_registration_number: user.bar_registration_number,
            profile_completed: user.profile_completed,
            created_at: user.created_at,
        }
    }
}

/// First-time profile setup after authentication.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteProfileRequest {
    #[schema(example = "advocate")]
    pub role: UserRole,
    #[schema(example = "Adv. Meera Nair")]
    pub display_name: String,
    #[schema(example = "Kochi")]
    pub city: Option<String>,
    #[schema(example = "+919812345678")]
    pub phone: Option<String>,
    /// Required when `role` is `advocate`.
    #[schema(example = "K/1234/2015")]
    pub bar_registration_number: Option<String>,
    /// Only honoured by builds with the `payment-bypass` feature.
    #[serde(default)]
    pub payment_bypass_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub bar_registration_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteProfileResponse {
    pub user: UserResponse,
    /// Where the client should go next: `continue` or `checkout`.
    pub next_step: String,
}
