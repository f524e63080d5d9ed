//! HTTP server exposing the audit query endpoint.

use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

use crate::aggregate;
use crate::config::Config;
use crate::github::GitHubClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Config,
}

/// Build the HTTP router for the audit service.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.query_timeout_secs);

    Router::new()
        .route("/query", post(query_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

/// Request body for the audit query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    /// GitHub personal access token to audit with.
    #[serde(default)]
    api_token: Option<String>,
}

/// Run a full audit for the supplied token.
async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> (StatusCode, Json<Value>) {
    let token = request
        .api_token
        .filter(|t| !t.is_empty())
        .or_else(|| state.config.github_token.clone());

    let Some(token) = token else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "apiToken is required" })),
        );
    };

    let client = match GitHubClient::with_base_url(&token, &state.config.github_api_url) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "Failed to build GitHub client");
            return internal_error();
        }
    };

    match aggregate::run_audit(&client, &state.config).await {
        Ok(repositories) => {
            info!(count = repositories.len(), "Audit query complete");
            (
                StatusCode::OK,
                Json(json!({ "repositories": repositories })),
            )
        }
        Err(err) => {
            error!(error = %err, "Audit query failed");
            internal_error()
        }
    }
}

fn internal_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Error processing repository information" })),
    )
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "audit",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness check endpoint.
async fn readiness_check() -> Json<Value> {
    Json(json!({
        "status": "ready",
        "service": "audit",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
