pub mod fcm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fcm::{FcmTopicSubscriber, MockTopicSubscriber};

/// Topic every device may join for festival-wide announcements.
pub const GLOBAL_TOPIC: &str = "ALL";

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Subscription rejected: {0}")]
    Rejected(String),

    #[error("Subscription timed out after {0} ms")]
    TimedOut(u128),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionReceipt {
    pub device_id: String,
    pub topic: String,
}

#[async_trait]
pub trait TopicSubscriber: Send + Sync {
    async fn subscribe(
        &self,
        device_id: &str,
        topic: &str,
    ) -> Result<SubscriptionReceipt, SubscriptionError>;
    async fn health_check(&self) -> Result<(), SubscriptionError>;
    fn is_enabled(&self) -> bool;
}
