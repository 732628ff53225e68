//! HTTP route handlers for the collaborator surface.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use parley_core::{Exchange, Request, Response as ExchangeResponse};
use parley_engine::{EngineError, PartyInput, Standard};
use serde::Deserialize;
use tracing::error;

use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let standard = state.orchestrator.standard();
    let response = serde_json::json!({
        "status": "ok",
        "standard": standard.name(),
        "version": standard.version(),
        "session": state.orchestrator.session_id(),
    });
    (StatusCode::OK, Json(response))
}

/// GET /party/{name}/prompt
pub(crate) async fn handle_prompt(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    if !state.knows_party(&name) {
        return unknown_party(&name);
    }
    match state.orchestrator.pending_prompts(&name).await {
        Ok(prompts) => (StatusCode::OK, Json(prompts)).into_response(),
        Err(e) => engine_error(e),
    }
}

/// POST /party/{name}/input
pub(crate) async fn handle_input(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(parsed): Json<serde_json::Value>,
) -> Response {
    if !state.knows_party(&name) {
        return unknown_party(&name);
    }
    let input: PartyInput = match serde_json::from_value(parsed) {
        Ok(input) => input,
        Err(e) => {
            return json_error(StatusCode::BAD_REQUEST, &format!("invalid party input: {}", e))
                .into_response()
        }
    };
    match state.orchestrator.handle_party_input(&input).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "accepted", "actionId": input.action_id})),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}

/// A captured exchange as posted by the traffic proxy. The sandbox assigns
/// the id.
#[derive(Debug, Deserialize)]
struct ExchangeSubmission {
    request: Request,
    response: ExchangeResponse,
}

/// POST /exchanges
pub(crate) async fn handle_exchange(
    State(state): State<Arc<AppState>>,
    Json(parsed): Json<serde_json::Value>,
) -> Response {
    let submission: ExchangeSubmission = match serde_json::from_value(parsed) {
        Ok(submission) => submission,
        Err(e) => {
            return json_error(StatusCode::BAD_REQUEST, &format!("invalid exchange: {}", e))
                .into_response()
        }
    };
    let exchange = Exchange::new(submission.request, submission.response);
    match state.orchestrator.handle_exchange(&exchange).await {
        Ok(matched) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "exchangeId": exchange.id,
                "matchedActionId": matched,
            })),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}

/// POST /reset
pub(crate) async fn handle_reset(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.reset().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "reset"}))).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /status
pub(crate) async fn handle_status(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => engine_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportQuery {
    format: Option<String>,
    #[serde(default)]
    printable: bool,
}

/// GET /report?format=html|json
pub(crate) async fn handle_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let report = match state.orchestrator.generate_report().await {
        Ok(report) => report,
        Err(e) => return engine_error(e),
    };
    match query.format.as_deref().unwrap_or("html") {
        "html" if query.printable => Html(report.printable_html()).into_response(),
        "html" => Html(report.html).into_response(),
        "json" => (StatusCode::OK, Json(report.json)).into_response(),
        other => json_error(
            StatusCode::BAD_REQUEST,
            &format!("unknown report format '{}': expected 'html' or 'json'", other),
        )
        .into_response(),
    }
}

fn unknown_party(name: &str) -> Response {
    json_error(
        StatusCode::NOT_FOUND,
        &format!("party '{}' not found", name),
    )
    .into_response()
}

/// Map an engine failure to a status code. Server-side failures are logged.
fn engine_error(e: EngineError) -> Response {
    let status = match &e {
        EngineError::UnknownAction { .. } => StatusCode::CONFLICT,
        _ if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => {
            error!(error = %e, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, &e.to_string()).into_response()
}
