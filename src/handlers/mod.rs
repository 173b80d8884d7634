pub mod auth;
pub mod entitlement;
pub mod payment;
pub mod profile;
pub mod webhook;

pub use auth::auth_config;
pub use entitlement::entitlement_config;
pub use payment::payment_config;
pub use profile::profile_config;
pub use webhook::webhook_config;

use crate::error::AppError;
use crate::utils::Identity;
use actix_web::{HttpMessage, HttpRequest, web};

/// Identity placed in request extensions by `AuthMiddleware`.
pub(crate) fn current_identity(req: &HttpRequest) -> Result<Identity, AppError> {
    req.extensions()
        .get::<Identity>()
        .cloned()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

/// JSON body limits and error mapping shared by every JSON route.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| AppError::ValidationError(format!("Invalid JSON body: {err}")).into())
}
