//! Table-driven event tier classification.

use crate::config::EligibilityConfig;
use crate::models::{IneligibleReason, Tier};
use crate::services::directory::affiliation_prefix;
use std::collections::HashMap;

/// Maps event ids to tiers. Ids absent from both tables are open.
#[derive(Debug, Clone)]
pub struct EligibilityClassifier {
    tiers: HashMap<String, Tier>,
    privileged_prefix: String,
}

impl EligibilityClassifier {
    /// Build from validated configuration. Should the tables overlap anyway,
    /// faculty-only wins since it is the stricter tier.
    pub fn new(config: &EligibilityConfig) -> Self {
        let restricted = config
            .restricted_affiliation_events
            .iter()
            .map(|id| (id.clone(), Tier::RestrictedAffiliation));
        let faculty = config
            .faculty_only_events
            .iter()
            .map(|id| (id.clone(), Tier::FacultyOnly));

        Self {
            tiers: restricted.chain(faculty).collect(),
            privileged_prefix: config.privileged_prefix.clone(),
        }
    }

    pub fn classify(&self, event_id: &str) -> Tier {
        self.tiers.get(event_id).copied().unwrap_or(Tier::Open)
    }

    /// The part of the eligibility rule that needs no I/O: restricted and
    /// faculty-only tiers both demand the privileged affiliation prefix.
    /// Faculty status itself is left to the directory.
    pub fn check_affiliation(
        &self,
        tier: Tier,
        requester_id: &str,
    ) -> Result<(), IneligibleReason> {
        if !tier.requires_affiliation() {
            return Ok(());
        }

        match affiliation_prefix(requester_id) {
            Some(prefix) if prefix == self.privileged_prefix => Ok(()),
            _ => Err(IneligibleReason::WrongAffiliation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_list;

    fn classifier() -> EligibilityClassifier {
        EligibilityClassifier::new(&EligibilityConfig {
            faculty_only_events: parse_list("13"),
            restricted_affiliation_events: parse_list("14,15,43"),
            privileged_prefix: "ay".to_string(),
            faculty_class: "faculty".to_string(),
        })
    }

    #[test]
    fn classifies_from_tables() {
        let classifier = classifier();
        assert_eq!(classifier.classify("13"), Tier::FacultyOnly);
        assert_eq!(classifier.classify("14"), Tier::RestrictedAffiliation);
        assert_eq!(classifier.classify("43"), Tier::RestrictedAffiliation);
        assert_eq!(classifier.classify("50"), Tier::Open);
        assert_eq!(classifier.classify(""), Tier::Open);
    }

    #[test]
    fn classification_is_exact_match() {
        let classifier = classifier();
        assert_eq!(classifier.classify("013"), Tier::Open);
        assert_eq!(classifier.classify("13 "), Tier::Open);
    }

    #[test]
    fn overlapping_ids_resolve_to_faculty_only() {
        let classifier = EligibilityClassifier::new(&EligibilityConfig {
            faculty_only_events: parse_list("13"),
            restricted_affiliation_events: parse_list("13,14"),
            privileged_prefix: "ay".to_string(),
            faculty_class: "faculty".to_string(),
        });
        assert_eq!(classifier.classify("13"), Tier::FacultyOnly);
    }

    #[test]
    fn open_events_skip_affiliation_check() {
        let classifier = classifier();
        assert!(classifier.check_affiliation(Tier::Open, "bd-202").is_ok());
        assert!(classifier.check_affiliation(Tier::Open, "noseparator").is_ok());
    }

    #[test]
    fn restricted_tiers_require_privileged_prefix() {
        let classifier = classifier();
        for tier in [Tier::RestrictedAffiliation, Tier::FacultyOnly] {
            assert!(classifier.check_affiliation(tier, "ay-101").is_ok());
            assert_eq!(
                classifier.check_affiliation(tier, "bd-202"),
                Err(IneligibleReason::WrongAffiliation)
            );
            assert_eq!(
                classifier.check_affiliation(tier, "AY-101"),
                Err(IneligibleReason::WrongAffiliation)
            );
        }
    }

    #[test]
    fn malformed_requester_ids_have_no_affiliation() {
        let classifier = classifier();
        assert_eq!(
            classifier.check_affiliation(Tier::RestrictedAffiliation, "ay"),
            Err(IneligibleReason::WrongAffiliation)
        );
        assert_eq!(
            classifier.check_affiliation(Tier::RestrictedAffiliation, "-ay"),
            Err(IneligibleReason::WrongAffiliation)
        );
    }
}
