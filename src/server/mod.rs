//! HTTP server: routing, shared state and graceful shutdown.
//!
//! Routes:
//! - `POST /emails` Resend-style ingestion
//! - `GET|DELETE /emails`, `GET|DELETE /api/emails` mailbox listing and clearing
//! - `GET /events`, `GET /api/events` live Server-Sent Events stream
//! - `GET /health`, `GET /api/health` capacity and count
//! - `POST /v2/email/outbound-emails` SES v2 ingestion
//! - `POST /` SES v1 form-encoded ingestion

mod events;
mod handlers;
mod health;

pub use events::SubscriptionGuard;
pub use health::{probe_health, HealthResponse};

use crate::config::Config;
use crate::error::Result;
use crate::store::CaptureStore;
use crate::subscriptions::{BroadcastHub, SubscriptionConfig};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CaptureStore>,
    /// Settings for each `/events` subscriber.
    pub subscription: SubscriptionConfig,
    /// Interval between SSE keepalive comments.
    pub keepalive: Duration,
}

impl AppState {
    /// State around an existing store with default stream settings.
    pub fn new(store: Arc<CaptureStore>) -> Self {
        Self {
            store,
            subscription: SubscriptionConfig::default(),
            keepalive: Duration::from_secs(30),
        }
    }

    /// Build a fresh store and hub from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            store: Arc::new(CaptureStore::new(
                config.store_config(),
                Arc::new(BroadcastHub::new()),
            )),
            subscription: config.subscription_config(),
            keepalive: config.keepalive(),
        }
    }
}

/// Creates the router with all routes and request tracing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::ses_v1_email))
        .route(
            "/emails",
            post(handlers::create_email)
                .get(handlers::list_emails)
                .delete(handlers::clear_emails),
        )
        .route(
            "/api/emails",
            get(handlers::list_emails_envelope).delete(handlers::clear_emails),
        )
        .route("/events", get(events::stream_events))
        .route("/api/events", get(events::stream_events))
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::health_check))
        .route("/v2/email/outbound-emails", post(handlers::ses_v2_email))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
///
/// On shutdown every live subscriber is released so open event streams
/// end and in-flight requests can drain.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let store = Arc::clone(&state.store);
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
            store.hub().unsubscribe_all();
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
