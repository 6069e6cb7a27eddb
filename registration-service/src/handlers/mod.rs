pub mod health;
pub mod registration;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use registration::{list_registrations, register_for_event, subscribe_to_broadcasts};
