use crate::models::{Enrollment, Tier};
use crate::services::{Registration, SubscriptionOutcome, SubscriptionReceipt};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64))]
    pub event_id: String,
    #[validate(length(min = 1, max = 4096))]
    pub device_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(length(min = 1, max = 4096))]
    pub device_id: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub enrollment: Enrollment,
    pub tier: Tier,
    pub subscription: SubscriptionOutcome,
}

impl From<Registration> for RegistrationResponse {
    fn from(registration: Registration) -> Self {
        Self {
            enrollment: registration.enrollment,
            tier: registration.tier,
            subscription: registration.subscription,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegistrationListResponse {
    pub user_id: String,
    pub registrations: Vec<Enrollment>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub topic: String,
}

impl From<SubscriptionReceipt> for SubscribeResponse {
    fn from(receipt: SubscriptionReceipt) -> Self {
        Self {
            topic: receipt.topic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_requires_ids() {
        let valid = RegisterRequest {
            event_id: "13".to_string(),
            device_id: "device-A".to_string(),
        };
        assert!(valid.validate().is_ok());

        let missing_event = RegisterRequest {
            event_id: String::new(),
            device_id: "device-A".to_string(),
        };
        assert!(missing_event.validate().is_err());

        let oversized_event = RegisterRequest {
            event_id: "9".repeat(65),
            device_id: "device-A".to_string(),
        };
        assert!(oversized_event.validate().is_err());
    }
}
