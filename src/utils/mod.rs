pub mod email;
pub mod jwt;
pub mod signature;

pub use email::*;
pub use jwt::*;
pub use signature::WebhookVerifier;
