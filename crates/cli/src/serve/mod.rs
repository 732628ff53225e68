//! `parley serve` -- HTTP sandbox for one session of the sample standard.
//!
//! Endpoints:
//! - GET  /health                 - Server status
//! - GET  /party/{name}/prompt    - Pending prompts of a party
//! - POST /party/{name}/input     - Input for a pending action
//! - POST /exchanges              - A captured request/response pair
//! - POST /reset                  - Start every scenario over
//! - GET  /status                 - Scenarios and batches left
//! - GET  /report?format=html|json[&printable=true]
//!
//! Errors are JSON `{"error": ...}`.

mod handlers;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parley_engine::Orchestrator;
use parley_sample::SampleStandard;
use parley_storage::MemoryStore;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use self::handlers::{
    handle_exchange, handle_health, handle_input, handle_not_found, handle_prompt, handle_report,
    handle_reset, handle_status,
};
use self::state::AppState;
use crate::commands::load_config;
use crate::keys::publisher_verifier;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const DEFAULT_PORT: u16 = 8080;

pub(crate) struct ServeOptions {
    pub(crate) port: Option<u16>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) publisher_key: Option<String>,
}

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// The router over `state`.
fn router(state: Arc<AppState>) -> Router {
    // CORS: permissive for local test tooling.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/party/{name}/prompt", get(handle_prompt))
        .route("/party/{name}/input", post(handle_input))
        .route("/exchanges", post(handle_exchange))
        .route("/reset", post(handle_reset))
        .route("/status", get(handle_status))
        .route("/report", get(handle_report))
        .fallback(handle_not_found)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the sandbox server.
///
/// The port comes from `--port`, then `PARLEY_PORT`, then 8080.
pub(crate) async fn start_server(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let verifier = publisher_verifier(options.publisher_key.as_deref())?;
    let standard = Arc::new(SampleStandard::new(verifier)?);
    let config = load_config(options.config.as_deref(), &standard)?;
    let orchestrator = Orchestrator::from_config(&config, standard, Arc::new(MemoryStore::new()))?;
    for party in &config.parties {
        if party.notification_url.is_none() {
            warn!(party = %party.name, "no notification url; the party has to poll for prompts");
        }
    }

    let port = match options.port {
        Some(port) => port,
        None => match std::env::var("PARLEY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|e| format!("invalid PARLEY_PORT '{}': {}", value, e))?,
            Err(_) => DEFAULT_PORT,
        },
    };

    let app = router(Arc::new(AppState::new(orchestrator)));
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(session = %config.session, "parley sandbox listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::default_config;
    use crate::keys::RejectAllVerifier;

    fn state() -> Arc<AppState> {
        let standard = Arc::new(SampleStandard::new(Arc::new(RejectAllVerifier)).unwrap());
        let orchestrator =
            Orchestrator::from_config(&default_config(), standard, Arc::new(MemoryStore::new()))
                .unwrap();
        Arc::new(AppState::new(orchestrator))
    }

    #[test]
    fn default_parties_are_known() {
        let state = state();
        assert!(state.knows_party("publisher"));
        assert!(state.knows_party("subscriber"));
        assert!(!state.knows_party("nobody"));
    }

    #[test]
    fn router_builds() {
        let _ = router(state());
    }
}
