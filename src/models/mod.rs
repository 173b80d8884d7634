pub mod common;
pub mod entitlement;
pub mod payment;
pub mod plan;
pub mod user;
pub mod webhook;

pub use common::*;
pub use entitlement::*;
pub use payment::*;
pub use plan::*;
pub use user::*;
pub use webhook::*;
