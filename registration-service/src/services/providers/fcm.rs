use super::{SubscriptionError, SubscriptionReceipt, TopicSubscriber};
use crate::config::FcmConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

const BATCH_ADD_PATH: &str = "/iid/v1:batchAdd";

/// Subscribes device registration tokens to topics through the FCM
/// Instance ID API.
pub struct FcmTopicSubscriber {
    config: FcmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct BatchAddRequest<'a> {
    to: String,
    registration_tokens: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct BatchAddResponse {
    #[serde(default)]
    results: Vec<BatchAddResult>,
}

#[derive(Debug, Deserialize)]
struct BatchAddResult {
    #[serde(default)]
    error: Option<String>,
}

impl FcmTopicSubscriber {
    pub fn new(config: FcmConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl TopicSubscriber for FcmTopicSubscriber {
    async fn subscribe(
        &self,
        device_id: &str,
        topic: &str,
    ) -> Result<SubscriptionReceipt, SubscriptionError> {
        if !self.config.enabled {
            return Err(SubscriptionError::NotEnabled(
                "FCM topic subscriptions are not enabled".to_string(),
            ));
        }

        let access_token = self.config.access_token.expose_secret();
        if access_token.is_empty() {
            return Err(SubscriptionError::Configuration(
                "FCM access token is not configured".to_string(),
            ));
        }

        let request = BatchAddRequest {
            to: format!("/topics/{}", topic),
            registration_tokens: [device_id],
        };

        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            BATCH_ADD_PATH
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("access_token_auth", "true")
            .json(&request)
            .send()
            .await
            .map_err(|e| SubscriptionError::Connection(format!("Failed to reach FCM: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SubscriptionError::Rejected(format!(
                "FCM returned status {}: {}",
                status, body
            )));
        }

        let body: BatchAddResponse = response.json().await.map_err(|e| {
            SubscriptionError::Rejected(format!("Failed to parse FCM response: {}", e))
        })?;

        if let Some(error) = body.results.into_iter().find_map(|r| r.error) {
            return Err(SubscriptionError::Rejected(error));
        }

        tracing::info!(topic = %topic, "Device subscribed to topic via FCM");

        Ok(SubscriptionReceipt {
            device_id: device_id.to_string(),
            topic: topic.to_string(),
        })
    }

    async fn health_check(&self) -> Result<(), SubscriptionError> {
        if !self.config.enabled {
            return Ok(());
        }

        if self.config.access_token.expose_secret().is_empty() {
            return Err(SubscriptionError::Configuration(
                "FCM access token is not configured".to_string(),
            ));
        }

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Records subscriptions instead of calling FCM. Can be told to fail or to
/// stall, to exercise the advisory path.
#[derive(Default)]
pub struct MockTopicSubscriber {
    failing: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<SubscriptionReceipt>>,
}

impl MockTopicSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every subscription attempted so far, failed ones included.
    pub fn calls(&self) -> Vec<SubscriptionReceipt> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TopicSubscriber for MockTopicSubscriber {
    async fn subscribe(
        &self,
        device_id: &str,
        topic: &str,
    ) -> Result<SubscriptionReceipt, SubscriptionError> {
        let receipt = SubscriptionReceipt {
            device_id: device_id.to_string(),
            topic: topic.to_string(),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(receipt.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing {
            return Err(SubscriptionError::Rejected(
                "mock subscriber configured to fail".to_string(),
            ));
        }

        tracing::info!(topic = %topic, "[MOCK] Device would be subscribed to topic");
        Ok(receipt)
    }

    async fn health_check(&self) -> Result<(), SubscriptionError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
