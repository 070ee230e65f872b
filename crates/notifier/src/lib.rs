//! Notification service: turns `user.created` events into welcome emails.

pub mod policy;
pub mod usecase;
pub mod welcome;

pub use policy::{UnsupportedRetryCap, delivery_policy};
pub use usecase::{NotificationDeliveryError, SendWelcomeEmail};
pub use welcome::WelcomeEmail;
