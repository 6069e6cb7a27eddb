//! Application startup and lifecycle management.

use crate::config::RegistrationConfig;
use crate::handlers;
use crate::services::{
    Database, EligibilityClassifier, EnrollmentOrchestrator, FcmTopicSubscriber,
    PgAffiliationDirectory, PgMembershipStore, Timeouts, TopicSubscriber,
};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{http_trace_layer, metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: EnrollmentOrchestrator,
}

/// All routes with the request-id, tracing and metrics layers applied.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/events/user/register", post(handlers::register_for_event))
        .route(
            "/events/user/registrations",
            get(handlers::list_registrations),
        )
        .route("/events/subgen", post(handlers::subscribe_to_broadcasts))
        .layer(from_fn(metrics_middleware))
        .layer(http_trace_layer())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect to PostgreSQL, apply migrations, wire the registration engine
    /// and bind the HTTP listener (port 0 picks a free port).
    pub async fn build(config: RegistrationConfig) -> Result<Self, AppError> {
        config.validate()?;

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let subscriber = FcmTopicSubscriber::new(config.fcm.clone());
        if subscriber.is_enabled() {
            subscriber.health_check().await.map_err(|e| {
                tracing::error!("FCM subscriber misconfigured: {}", e);
                AppError::ConfigError(anyhow::anyhow!(e))
            })?;
            tracing::info!("FCM topic subscriber initialized");
        } else {
            tracing::warn!("FCM disabled - registrations will not subscribe devices to topics");
        }

        tracing::info!(
            faculty_only = config.eligibility.faculty_only_events.len(),
            restricted = config.eligibility.restricted_affiliation_events.len(),
            privileged_prefix = %config.eligibility.privileged_prefix,
            "Eligibility tables loaded"
        );

        let orchestrator = EnrollmentOrchestrator::new(
            EligibilityClassifier::new(&config.eligibility),
            Arc::new(PgAffiliationDirectory::new(
                db.clone(),
                config.eligibility.faculty_class.clone(),
            )),
            Arc::new(PgMembershipStore::new(db.clone())),
            Arc::new(subscriber),
            Timeouts {
                lookup: config.directory.lookup_timeout(),
                subscribe: config.fcm.timeout(),
            },
        );

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Registration service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state: AppState { orchestrator },
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
