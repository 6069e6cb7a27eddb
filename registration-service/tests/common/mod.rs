//! Common test utilities for registration-service integration tests.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use registration_service::config::{parse_list, EligibilityConfig};
use registration_service::services::{
    EligibilityClassifier, EnrollmentOrchestrator, InMemoryDirectory, InMemoryMembershipStore,
    MockTopicSubscriber, Timeouts,
};
use registration_service::startup::{build_router, AppState};
use std::sync::{Arc, Once};
use tower::ServiceExt;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,registration_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Festival tables used across tests: `13` is faculty-only, `14`/`15` are
/// restricted to the `ay` affiliation, anything else is open.
pub fn eligibility() -> EligibilityConfig {
    EligibilityConfig {
        faculty_only_events: parse_list("13"),
        restricted_affiliation_events: parse_list("14,15"),
        privileged_prefix: "ay".to_string(),
        faculty_class: "faculty".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryMembershipStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub subscriber: Arc<MockTopicSubscriber>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(MockTopicSubscriber::new())
    }

    pub fn spawn_with(subscriber: MockTopicSubscriber) -> Self {
        init_tracing();

        let directory = Arc::new(
            InMemoryDirectory::new("faculty")
                .with_requester("ay-101", Some("faculty"))
                .with_requester("ay-303", Some("Acharya Institute of Technology"))
                .with_requester("bd-202", Some("faculty")),
        );
        let store = Arc::new(
            InMemoryMembershipStore::new()
                .with_users(["ay-101", "ay-303", "bd-202"])
                .with_events(["13", "14", "15", "50"]),
        );
        let subscriber = Arc::new(subscriber);

        let orchestrator = EnrollmentOrchestrator::new(
            EligibilityClassifier::new(&eligibility()),
            directory.clone(),
            store.clone(),
            subscriber.clone(),
            Timeouts::default(),
        );

        TestApp {
            router: build_router(AppState { orchestrator }),
            store,
            directory,
            subscriber,
        }
    }

    pub async fn register(&self, user_id: &str, event_id: &str, device_id: &str) -> Response<Body> {
        let body = serde_json::json!({ "event_id": event_id, "device_id": device_id });
        self.send(
            Request::post("/events/user/register")
                .header("content-type", "application/json")
                .header("X-User-ID", user_id)
                .body(Body::from(body.to_string()))
                .expect("Failed to build request"),
        )
        .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}
