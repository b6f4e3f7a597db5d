//! `POST /api/search-quotes`: validates the email, runs the configured
//! retrieval strategy once and maps its outcome onto an HTTP status.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use quotesearch_core::email::email_domain;
use quotesearch_core::{is_valid_email, QuoteRecord, RetrievalError, RetrievalStrategy};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

pub const SEARCH_PATH: &str = "/api/search-quotes";

#[derive(Clone)]
pub struct SearchState {
    strategy: Arc<dyn RetrievalStrategy>,
}

impl SearchState {
    pub fn new(strategy: Arc<dyn RetrievalStrategy>) -> Self {
        Self { strategy }
    }
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    #[serde(rename = "Data")]
    data: Vec<QuoteRecord>,
}

#[derive(Debug, Serialize)]
struct SearchError {
    error: String,
}

pub fn router(strategy: Arc<dyn RetrievalStrategy>) -> Router {
    Router::new()
        .route(
            SEARCH_PATH,
            post(search_quotes).options(preflight).fallback(method_not_allowed),
        )
        .with_state(SearchState::new(strategy))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed. Use POST.")
}

pub async fn search_quotes(
    State(state): State<SearchState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    let email = match requested_email(payload) {
        Some(email) => email,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid or missing email in request body.",
            )
        }
    };

    match state.strategy.fetch_all_matching(&email).await {
        Ok(matches) => {
            info!(
                event_name = "api.search_quotes.completed",
                correlation_id = %correlation_id,
                strategy = state.strategy.name(),
                email_domain = email_domain(&email),
                pages_fetched = matches.pages_fetched,
                matched = matches.records.len(),
                "quote search completed"
            );
            (StatusCode::OK, Json(SearchResponse { data: matches.records })).into_response()
        }
        Err(error) => {
            warn!(
                event_name = "api.search_quotes.failed",
                correlation_id = %correlation_id,
                strategy = state.strategy.name(),
                failure_kind = ?error.kind(),
                error = %error,
                "quote search failed"
            );
            failure_response(&error)
        }
    }
}

fn requested_email(payload: Result<Json<Value>, JsonRejection>) -> Option<String> {
    let Json(body) = payload.ok()?;
    let email = body.get("email")?.as_str()?;
    is_valid_email(email).then(|| email.to_string())
}

/// Maps a retrieval failure onto the status and message returned to the caller.
pub fn failure_response(error: &RetrievalError) -> Response {
    match error {
        RetrievalError::Unreachable { .. } => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "No response from the quotes API.")
        }
        RetrievalError::UpstreamStatus { status } => error_response(
            StatusCode::BAD_GATEWAY,
            &format!("Quotes API responded with status {status}."),
        ),
        RetrievalError::MalformedBody { .. } => {
            error_response(StatusCode::BAD_GATEWAY, "Unexpected API response structure.")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(SearchError { error: message.to_string() })).into_response()
}
