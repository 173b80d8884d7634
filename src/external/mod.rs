pub mod provider;
pub mod stripe;

pub use provider::*;
pub use self::stripe::StripeService;
