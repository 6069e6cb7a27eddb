pub mod database;
pub mod directory;
pub mod eligibility;
pub mod enrollment;
pub mod membership;
pub mod metrics;
pub mod providers;

pub use database::Database;
pub use directory::{
    affiliation_prefix, AffiliationDirectory, InMemoryDirectory, LookupError,
    PgAffiliationDirectory,
};
pub use eligibility::EligibilityClassifier;
pub use enrollment::{
    EnrollmentOrchestrator, Registration, RegistrationError, SubscriptionOutcome, Timeouts,
};
pub use membership::{InMemoryMembershipStore, MembershipStore, PgMembershipStore, StoreError};
pub use metrics::{get_metrics, init_metrics};
pub use providers::{
    FcmTopicSubscriber, MockTopicSubscriber, SubscriptionError, SubscriptionReceipt,
    TopicSubscriber, GLOBAL_TOPIC,
};
