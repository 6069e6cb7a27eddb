//! PostgreSQL-backed registration tests.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test -p registration-service -- --ignored

mod common;

use registration_service::config::EligibilityConfig;
use registration_service::models::NewEnrollment;
use registration_service::services::{
    AffiliationDirectory, Database, EligibilityClassifier, EnrollmentOrchestrator, LookupError,
    MembershipStore, MockTopicSubscriber, PgAffiliationDirectory, PgMembershipStore,
    RegistrationError, StoreError, Timeouts,
};
use serial_test::serial;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Ids unique to one test run so tests never see each other's rows.
struct Fixture {
    db: Database,
    faculty_event: String,
    restricted_event: String,
    open_event: String,
    faculty: String,
    staff: String,
    outsider: String,
}

async fn connect() -> Database {
    common::init_tracing();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run PostgreSQL tests");

    let db = Database::new(&database_url, 10, 1)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");
    db
}

async fn fixture() -> Fixture {
    let db = connect().await;
    let run = Uuid::new_v4().simple().to_string();

    let fixture = Fixture {
        faculty_event: format!("f{}", run),
        restricted_event: format!("r{}", run),
        open_event: format!("o{}", run),
        faculty: format!("ay-f{}", run),
        staff: format!("ay-s{}", run),
        outsider: format!("bd-o{}", run),
        db,
    };

    for event in [
        &fixture.faculty_event,
        &fixture.restricted_event,
        &fixture.open_event,
    ] {
        sqlx::query("INSERT INTO events (event_id, name) VALUES ($1, $2)")
            .bind(event)
            .bind("Test Event")
            .execute(fixture.db.pool())
            .await
            .expect("Failed to seed event");
    }

    for (user, college) in [
        (&fixture.faculty, "faculty"),
        (&fixture.staff, "Acharya Institute of Technology"),
        (&fixture.outsider, "faculty"),
    ] {
        sqlx::query("INSERT INTO users (user_id, name, college_name) VALUES ($1, $2, $3)")
            .bind(user)
            .bind("Test User")
            .bind(college)
            .execute(fixture.db.pool())
            .await
            .expect("Failed to seed user");
    }

    fixture
}

impl Fixture {
    fn orchestrator(&self, subscriber: Arc<MockTopicSubscriber>) -> EnrollmentOrchestrator {
        let config = EligibilityConfig {
            faculty_only_events: BTreeSet::from([self.faculty_event.clone()]),
            restricted_affiliation_events: BTreeSet::from([self.restricted_event.clone()]),
            privileged_prefix: "ay".to_string(),
            faculty_class: "faculty".to_string(),
        };

        EnrollmentOrchestrator::new(
            EligibilityClassifier::new(&config),
            Arc::new(PgAffiliationDirectory::new(self.db.clone(), "faculty")),
            Arc::new(PgMembershipStore::new(self.db.clone())),
            subscriber,
            Timeouts::default(),
        )
    }

    async fn row_count(&self, user_id: &str, event_id: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM event_registrations WHERE user_id = $1 AND event_id = $2",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(self.db.pool())
        .await
        .expect("Failed to count registrations");
        count
    }
}

#[tokio::test]
#[ignore] // Requires database
#[serial]
async fn faculty_registration_persists_unpaid_row() {
    let fx = fixture().await;
    let subscriber = Arc::new(MockTopicSubscriber::new());
    let orchestrator = fx.orchestrator(subscriber.clone());

    let registration = orchestrator
        .register_for_event(&fx.faculty, &fx.faculty_event, "device-A")
        .await
        .expect("Faculty registration should succeed");

    assert!(!registration.enrollment.payment_made);
    assert_eq!(fx.row_count(&fx.faculty, &fx.faculty_event).await, 1);
    assert_eq!(subscriber.calls()[0].topic, fx.faculty_event);
}

#[tokio::test]
#[ignore]
#[serial]
async fn ineligible_requesters_leave_no_rows() {
    let fx = fixture().await;
    let subscriber = Arc::new(MockTopicSubscriber::new());
    let orchestrator = fx.orchestrator(subscriber.clone());

    let err = orchestrator
        .register_for_event(&fx.outsider, &fx.restricted_event, "device-B")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::Ineligible(_)));

    let err = orchestrator
        .register_for_event(&fx.staff, &fx.faculty_event, "device-C")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::Ineligible(_)));

    assert_eq!(fx.row_count(&fx.outsider, &fx.restricted_event).await, 0);
    assert_eq!(fx.row_count(&fx.staff, &fx.faculty_event).await, 0);
    assert!(subscriber.calls().is_empty());
}

#[tokio::test]
#[ignore]
#[serial]
async fn duplicate_and_unknown_reference_are_classified() {
    let fx = fixture().await;
    let orchestrator = fx.orchestrator(Arc::new(MockTopicSubscriber::new()));

    orchestrator
        .register_for_event(&fx.outsider, &fx.open_event, "device-B")
        .await
        .expect("Open registration should succeed");

    let err = orchestrator
        .register_for_event(&fx.outsider, &fx.open_event, "device-B")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateEnrollment));
    assert_eq!(fx.row_count(&fx.outsider, &fx.open_event).await, 1);

    let missing_event = format!("missing-{}", Uuid::new_v4().simple());
    let err = orchestrator
        .register_for_event(&fx.outsider, &missing_event, "device-B")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::UnknownReference));
    assert_eq!(fx.row_count(&fx.outsider, &missing_event).await, 0);
}

#[tokio::test]
#[ignore]
#[serial]
async fn subscription_failure_keeps_row() {
    let fx = fixture().await;
    let orchestrator = fx.orchestrator(Arc::new(MockTopicSubscriber::failing()));

    let registration = orchestrator
        .register_for_event(&fx.staff, &fx.open_event, "device-C")
        .await
        .expect("Registration should succeed despite subscription failure");

    assert!(!registration.subscription.is_subscribed());
    assert_eq!(fx.row_count(&fx.staff, &fx.open_event).await, 1);
}

/// Concurrent duplicates: the primary key lets exactly one insert through.
#[tokio::test]
#[ignore]
#[serial]
async fn concurrent_duplicates_resolve_to_one_row() {
    let fx = fixture().await;
    let store = Arc::new(PgMembershipStore::new(fx.db.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let input = NewEnrollment::unpaid(&fx.staff, &fx.open_event);
        handles.push(tokio::spawn(async move { store.enroll(&input).await }));
    }

    let mut successes = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(_) => successes += 1,
            Err(StoreError::DuplicateEnrollment { .. }) => duplicates += 1,
            Err(e) => panic!("Unexpected store error: {}", e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(fx.row_count(&fx.staff, &fx.open_event).await, 1);
}

#[tokio::test]
#[ignore]
#[serial]
async fn directory_reads_affiliation_class() {
    let fx = fixture().await;
    let directory = PgAffiliationDirectory::new(fx.db.clone(), "faculty");

    assert!(directory.is_faculty(&fx.faculty).await.unwrap());
    assert!(!directory.is_faculty(&fx.staff).await.unwrap());
    assert!(matches!(
        directory.is_faculty("ay-nobody").await,
        Err(LookupError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore]
#[serial]
async fn enrollments_for_lists_newest_first() {
    let fx = fixture().await;
    let store = PgMembershipStore::new(fx.db.clone());

    store
        .enroll(&NewEnrollment::unpaid(&fx.faculty, &fx.open_event))
        .await
        .unwrap();
    store
        .enroll(&NewEnrollment::unpaid(&fx.faculty, &fx.faculty_event))
        .await
        .unwrap();

    let listed = store.enrollments_for(&fx.faculty).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].event_id, fx.faculty_event);
    assert!(store.health_check().await.is_ok());
}
