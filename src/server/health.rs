//! Health endpoint and the matching container probe.

use super::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Health check response structure.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Emails currently stored.
    pub emails: usize,
    /// Configured capacity.
    pub max_emails: usize,
    pub timestamp: DateTime<Utc>,
}

/// `GET /health` and `GET /api/health`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        emails: state.store.count(),
        max_emails: state.store.capacity(),
        timestamp: Utc::now(),
    })
}

/// Probe a running instance's health endpoint.
///
/// Returns `true` only for a 200 response.
pub async fn probe_health(url: &str) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            debug!(error = %e, "Cannot build HTTP client");
            return false;
        }
    };

    match client.get(url).send().await {
        Ok(response) => response.status() == reqwest::StatusCode::OK,
        Err(e) => {
            debug!(error = %e, url, "Health probe failed");
            false
        }
    }
}
