//! Enrollment of a requester in an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored registration. At most one exists per (user_id, event_id).
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: String,
    pub event_id: String,
    pub payment_made: bool,
    pub registration_time: DateTime<Utc>,
}

/// Input for creating an enrollment.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub user_id: String,
    pub event_id: String,
    pub payment_made: bool,
    pub registration_time: DateTime<Utc>,
}

impl NewEnrollment {
    /// Unpaid enrollment stamped with the current time.
    pub fn unpaid(user_id: &str, event_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            payment_made: false,
            registration_time: Utc::now(),
        }
    }
}

impl From<NewEnrollment> for Enrollment {
    fn from(input: NewEnrollment) -> Self {
        Self {
            user_id: input.user_id,
            event_id: input.event_id,
            payment_made: input.payment_made,
            registration_time: input.registration_time,
        }
    }
}
