//! Affiliation lookup: the requester id's prefix and the directory's
//! affiliation-class attribute.

use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, instrument};

/// Separates the affiliation prefix from the rest of a requester id (`ay-101`).
pub const AFFILIATION_SEPARATOR: char = '-';

/// First segment of a structured requester id.
///
/// Ids without a separator, or with nothing before it, carry no affiliation.
pub fn affiliation_prefix(requester_id: &str) -> Option<&str> {
    let (prefix, _) = requester_id.split_once(AFFILIATION_SEPARATOR)?;
    (!prefix.is_empty()).then_some(prefix)
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("requester '{0}' not found in directory")]
    NotFound(String),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AffiliationDirectory: Send + Sync {
    /// Whether the requester's affiliation class marks them as faculty.
    async fn is_faculty(&self, requester_id: &str) -> Result<bool, LookupError>;
}

/// Directory backed by the `users` relation.
#[derive(Clone)]
pub struct PgAffiliationDirectory {
    db: Database,
    faculty_class: String,
}

impl PgAffiliationDirectory {
    pub fn new(db: Database, faculty_class: impl Into<String>) -> Self {
        Self {
            db,
            faculty_class: faculty_class.into(),
        }
    }
}

#[async_trait]
impl AffiliationDirectory for PgAffiliationDirectory {
    #[instrument(skip(self))]
    async fn is_faculty(&self, requester_id: &str) -> Result<bool, LookupError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["affiliation_class"])
            .start_timer();

        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT college_name FROM users WHERE user_id = $1")
                .bind(requester_id)
                .fetch_optional(self.db.pool())
                .await
                .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        timer.observe_duration();

        let (class,) = row.ok_or_else(|| LookupError::NotFound(requester_id.to_string()))?;
        debug!(affiliation_class = ?class, "Resolved affiliation class");

        Ok(class.as_deref() == Some(self.faculty_class.as_str()))
    }
}

/// In-memory directory for tests and local runs.
pub struct InMemoryDirectory {
    classes: HashMap<String, Option<String>>,
    faculty_class: String,
    unavailable: AtomicBool,
    lookups: AtomicU64,
}

impl InMemoryDirectory {
    pub fn new(faculty_class: impl Into<String>) -> Self {
        Self {
            classes: HashMap::new(),
            faculty_class: faculty_class.into(),
            unavailable: AtomicBool::new(false),
            lookups: AtomicU64::new(0),
        }
    }

    /// Add a requester with the given affiliation class.
    pub fn with_requester(mut self, requester_id: &str, class: Option<&str>) -> Self {
        self.classes
            .insert(requester_id.to_string(), class.map(str::to_string));
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AffiliationDirectory for InMemoryDirectory {
    async fn is_faculty(&self, requester_id: &str) -> Result<bool, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LookupError::Unavailable(
                "in-memory directory marked unavailable".to_string(),
            ));
        }

        let class = self
            .classes
            .get(requester_id)
            .ok_or_else(|| LookupError::NotFound(requester_id.to_string()))?;

        Ok(class.as_deref() == Some(self.faculty_class.as_str()))
    }
}
