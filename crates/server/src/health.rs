use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

pub const LIVENESS_MESSAGE: &str = "Quote Search API is running.";

#[derive(Clone)]
pub struct HealthState {
    strategy: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub upstream_strategy: &'static str,
    pub checked_at: String,
}

pub fn router(strategy: &'static str) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health))
        .with_state(HealthState { strategy })
}

pub async fn liveness() -> &'static str {
    LIVENESS_MESSAGE
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: "quotesearch-server",
        upstream_strategy: state.strategy,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use crate::health::{health, liveness, HealthState, LIVENESS_MESSAGE};

    #[tokio::test]
    async fn liveness_returns_banner() {
        assert_eq!(liveness().await, LIVENESS_MESSAGE);
    }

    #[tokio::test]
    async fn health_reports_active_strategy() {
        let (status, Json(payload)) = health(State(HealthState { strategy: "paged" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.upstream_strategy, "paged");
        assert!(!payload.checked_at.is_empty());
    }
}
