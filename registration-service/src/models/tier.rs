//! Event tiers and the reasons a requester can fail them.

use serde::{Deserialize, Serialize};

/// Who may enroll in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Open,
    RestrictedAffiliation,
    FacultyOnly,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::RestrictedAffiliation => "restricted-affiliation",
            Self::FacultyOnly => "faculty-only",
        }
    }

    /// Whether the requester must carry the privileged affiliation prefix.
    pub fn requires_affiliation(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Whether the directory must confirm the requester is faculty.
    pub fn requires_faculty(&self) -> bool {
        matches!(self, Self::FacultyOnly)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IneligibleReason {
    WrongAffiliation,
    NotFaculty,
}

impl IneligibleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WrongAffiliation => "wrong-affiliation",
            Self::NotFaculty => "not-faculty",
        }
    }
}

impl std::fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
