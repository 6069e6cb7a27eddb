//! Registration use case: eligibility, enrollment, then topic subscription.
//!
//! A run goes `Received -> Classified -> (AffiliationChecked) -> Enrolling ->
//! Enrolled -> (Subscribing) -> Completed`. It can only fail while classifying
//! (ineligible) or enrolling (store error). Once the enrollment is written the
//! run completes, whatever the subscription outcome.

use crate::models::{Enrollment, IneligibleReason, NewEnrollment, Tier};
use crate::services::directory::{AffiliationDirectory, LookupError};
use crate::services::eligibility::EligibilityClassifier;
use crate::services::membership::{MembershipStore, StoreError};
use crate::services::metrics::{REGISTRATIONS_TOTAL, SUBSCRIPTIONS_TOTAL};
use crate::services::providers::{
    SubscriptionError, SubscriptionReceipt, TopicSubscriber, GLOBAL_TOPIC,
};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn, Span};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("requester is not eligible for this event ({0})")]
    Ineligible(IneligibleReason),

    #[error("requester is already registered for this event")]
    DuplicateEnrollment,

    #[error("unknown requester or event")]
    UnknownReference,

    #[error("registration store unavailable: {0}")]
    StoreUnavailable(String),
}

impl RegistrationError {
    fn outcome_label(&self) -> &'static str {
        match self {
            Self::Ineligible(_) => "ineligible",
            Self::DuplicateEnrollment => "duplicate",
            Self::UnknownReference => "unknown_reference",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEnrollment { .. } => Self::DuplicateEnrollment,
            StoreError::UnknownReference => Self::UnknownReference,
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

impl From<LookupError> for RegistrationError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound(_) => Self::UnknownReference,
            LookupError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Ineligible(_) => AppError::Forbidden(anyhow::anyhow!(err)),
            RegistrationError::DuplicateEnrollment => AppError::Conflict(anyhow::anyhow!(err)),
            RegistrationError::UnknownReference => AppError::NotFound(anyhow::anyhow!(err)),
            RegistrationError::StoreUnavailable(_) => AppError::ServiceUnavailable,
        }
    }
}

/// What happened to the best-effort topic subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubscriptionOutcome {
    Subscribed { topic: String },
    Failed { topic: String, reason: String },
}

impl SubscriptionOutcome {
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed { .. })
    }
}

/// Result of a completed registration.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub enrollment: Enrollment,
    pub tier: Tier,
    pub subscription: SubscriptionOutcome,
}

/// Upper bounds on the blocking collaborator calls.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub lookup: Duration,
    pub subscribe: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            lookup: Duration::from_secs(5),
            subscribe: Duration::from_secs(5),
        }
    }
}

/// Stateless between calls; clones share the same collaborators.
#[derive(Clone)]
pub struct EnrollmentOrchestrator {
    classifier: Arc<EligibilityClassifier>,
    directory: Arc<dyn AffiliationDirectory>,
    store: Arc<dyn MembershipStore>,
    subscriber: Arc<dyn TopicSubscriber>,
    timeouts: Timeouts,
}

impl EnrollmentOrchestrator {
    pub fn new(
        classifier: EligibilityClassifier,
        directory: Arc<dyn AffiliationDirectory>,
        store: Arc<dyn MembershipStore>,
        subscriber: Arc<dyn TopicSubscriber>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            classifier: Arc::new(classifier),
            directory,
            store,
            subscriber,
            timeouts,
        }
    }

    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        &self.store
    }

    /// Enroll `requester_id` in `event_id` and subscribe `device_id` to the
    /// event's topic.
    #[instrument(skip(self, device_id), fields(tier = tracing::field::Empty))]
    pub async fn register_for_event(
        &self,
        requester_id: &str,
        event_id: &str,
        device_id: &str,
    ) -> Result<Registration, RegistrationError> {
        let tier = self.classifier.classify(event_id);
        Span::current().record("tier", tier.as_str());

        let result = self.enroll(tier, requester_id, event_id).await;

        let outcome = match &result {
            Ok(_) => "enrolled",
            Err(e) => e.outcome_label(),
        };
        REGISTRATIONS_TOTAL
            .with_label_values(&[tier.as_str(), outcome])
            .inc();

        let enrollment = result?;
        let subscription = self.subscribe_to_event(device_id, event_id).await;

        info!(
            subscribed = subscription.is_subscribed(),
            "Registration completed"
        );

        Ok(Registration {
            enrollment,
            tier,
            subscription,
        })
    }

    /// Subscribe a device to the festival-wide topic.
    #[instrument(skip(self, device_id))]
    pub async fn subscribe_to_broadcasts(
        &self,
        device_id: &str,
    ) -> Result<SubscriptionReceipt, SubscriptionError> {
        let result = self.subscribe(device_id, GLOBAL_TOPIC).await;
        if let Err(e) = &result {
            warn!(error = %e, "Broadcast topic subscription failed");
        }
        result
    }

    /// Eligibility check followed by the single durable write.
    async fn enroll(
        &self,
        tier: Tier,
        requester_id: &str,
        event_id: &str,
    ) -> Result<Enrollment, RegistrationError> {
        self.check_eligibility(tier, requester_id).await?;

        self.store
            .enroll(&NewEnrollment::unpaid(requester_id, event_id))
            .await
            .map_err(|e| {
                match &e {
                    StoreError::Unavailable(msg) => error!(error = %msg, "Enrollment write failed"),
                    other => info!(reason = %other, "Enrollment rejected by store"),
                }
                RegistrationError::from(e)
            })
    }

    async fn check_eligibility(
        &self,
        tier: Tier,
        requester_id: &str,
    ) -> Result<(), RegistrationError> {
        self.classifier
            .check_affiliation(tier, requester_id)
            .map_err(|reason| {
                info!(%reason, "Requester rejected by affiliation check");
                RegistrationError::Ineligible(reason)
            })?;

        if !tier.requires_faculty() {
            return Ok(());
        }

        let is_faculty = tokio::time::timeout(
            self.timeouts.lookup,
            self.directory.is_faculty(requester_id),
        )
        .await
        .map_err(|_| {
            LookupError::Unavailable(format!(
                "lookup timed out after {} ms",
                self.timeouts.lookup.as_millis()
            ))
        })
        .and_then(|lookup| lookup)
        .map_err(|e| {
            warn!(error = %e, "Affiliation lookup failed");
            RegistrationError::from(e)
        })?;

        if !is_faculty {
            info!("Requester rejected by faculty check");
            return Err(RegistrationError::Ineligible(IneligibleReason::NotFaculty));
        }

        Ok(())
    }

    /// Advisory: failures are logged and reported, never propagated.
    async fn subscribe_to_event(&self, device_id: &str, event_id: &str) -> SubscriptionOutcome {
        match self.subscribe(device_id, event_id).await {
            Ok(receipt) => SubscriptionOutcome::Subscribed {
                topic: receipt.topic,
            },
            Err(e) => {
                warn!(error = %e, topic = %event_id, "Topic subscription failed; enrollment kept");
                SubscriptionOutcome::Failed {
                    topic: event_id.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn subscribe(
        &self,
        device_id: &str,
        topic: &str,
    ) -> Result<SubscriptionReceipt, SubscriptionError> {
        let result = tokio::time::timeout(
            self.timeouts.subscribe,
            self.subscriber.subscribe(device_id, topic),
        )
        .await
        .unwrap_or_else(|_| Err(SubscriptionError::TimedOut(self.timeouts.subscribe.as_millis())));

        let status = if result.is_ok() { "subscribed" } else { "failed" };
        SUBSCRIPTIONS_TOTAL.with_label_values(&[status]).inc();

        result
    }
}
