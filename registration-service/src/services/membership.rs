//! Durable enrollment records.

use crate::models::{Enrollment, NewEnrollment};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("requester '{user_id}' is already enrolled in event '{event_id}'")]
    DuplicateEnrollment { user_id: String, event_id: String },

    #[error("unknown requester or event")]
    UnknownReference,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Insert a new enrollment. Uniqueness and referential integrity are
    /// enforced here, not by callers.
    async fn enroll(&self, input: &NewEnrollment) -> Result<Enrollment, StoreError>;

    /// Enrollments of one requester, newest first.
    async fn enrollments_for(&self, user_id: &str) -> Result<Vec<Enrollment>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Store backed by the `event_registrations` relation.
#[derive(Clone)]
pub struct PgMembershipStore {
    db: Database,
}

impl PgMembershipStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn classify_insert_error(err: sqlx::Error, input: &NewEnrollment) -> StoreError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateEnrollment {
                user_id: input.user_id.clone(),
                event_id: input.event_id.clone(),
            }
        }
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            StoreError::UnknownReference
        }
        _ => StoreError::Unavailable(format!("Failed to create enrollment: {}", err)),
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    #[instrument(skip(self, input), fields(user_id = %input.user_id, event_id = %input.event_id))]
    async fn enroll(&self, input: &NewEnrollment) -> Result<Enrollment, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["enroll"])
            .start_timer();

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO event_registrations (user_id, event_id, payment_made, registration_time)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, event_id, payment_made, registration_time
            "#,
        )
        .bind(&input.user_id)
        .bind(&input.event_id)
        .bind(input.payment_made)
        .bind(input.registration_time)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| classify_insert_error(e, input))?;

        timer.observe_duration();

        info!("Enrollment created");

        Ok(enrollment)
    }

    #[instrument(skip(self))]
    async fn enrollments_for(&self, user_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["enrollments_for"])
            .start_timer();

        let enrollments = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT user_id, event_id, payment_made, registration_time
            FROM event_registrations
            WHERE user_id = $1
            ORDER BY registration_time DESC, event_id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to list enrollments: {}", e)))?;

        timer.observe_duration();

        Ok(enrollments)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db
            .health_check()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[derive(Default)]
struct MemoryState {
    users: HashSet<String>,
    events: HashSet<String>,
    enrollments: BTreeMap<(String, String), Enrollment>,
}

/// In-memory store with the same constraint semantics as the database.
#[derive(Default)]
pub struct InMemoryMembershipStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users<I, S>(self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut state) = self.state.lock() {
            state.users.extend(users.into_iter().map(Into::into));
        }
        self
    }

    pub fn with_events<I, S>(self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut state) = self.state.lock() {
            state.events.extend(events.into_iter().map(Into::into));
        }
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored enrollments.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.enrollments.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, user_id: &str, event_id: &str) -> Option<Enrollment> {
        self.state.lock().ok().and_then(|s| {
            s.enrollments
                .get(&(user_id.to_string(), event_id.to_string()))
                .cloned()
        })
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn enroll(&self, input: &NewEnrollment) -> Result<Enrollment, StoreError> {
        self.check_available()?;

        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        let key = (input.user_id.clone(), input.event_id.clone());
        if state.enrollments.contains_key(&key) {
            return Err(StoreError::DuplicateEnrollment {
                user_id: input.user_id.clone(),
                event_id: input.event_id.clone(),
            });
        }
        if !state.users.contains(&input.user_id) || !state.events.contains(&input.event_id) {
            return Err(StoreError::UnknownReference);
        }

        let enrollment = Enrollment::from(input.clone());
        state.enrollments.insert(key, enrollment.clone());
        Ok(enrollment)
    }

    async fn enrollments_for(&self, user_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        self.check_available()?;

        let state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;

        let mut enrollments: Vec<Enrollment> = state
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| {
            b.registration_time
                .cmp(&a.registration_time)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        Ok(enrollments)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
