//! Liveness endpoint for the operator surface.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::time::Instant;

/// Process start time, captured when the router is built.
#[derive(Debug, Clone, Copy)]
pub struct HealthState {
    started_at: Instant,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    uptime_secs: u64,
}

/// Health check endpoint
///
/// Returns 200 OK with process uptime. Liveness only; job state and
/// browser health are observable through logs, not here.
pub async fn health_handler(
    State(state): State<HealthState>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            uptime_secs: state.started_at.elapsed().as_secs(),
        }),
    )
}

/// Build the router serving `GET /health`.
pub fn router() -> Router {
    let state = HealthState {
        started_at: Instant::now(),
    };
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok_with_uptime() {
        let state = HealthState {
            started_at: Instant::now(),
        };
        let (code, Json(body)) = health_handler(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert!(body.uptime_secs < 5);
    }
}
