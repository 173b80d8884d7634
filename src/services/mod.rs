#[cfg(feature = "payment-bypass")]
pub mod bypass;
pub mod entitlement_service;
pub mod payment_event_service;
pub mod payment_service;
pub mod user_service;

pub use entitlement_service::*;
pub use payment_event_service::*;
pub use payment_service::*;
pub use user_service::*;
