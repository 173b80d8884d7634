pub mod payments;
pub mod users;

pub use payments as payment_entity;
pub use payments::PaymentStatus;
pub use users as user_entity;
pub use users::UserRole;
