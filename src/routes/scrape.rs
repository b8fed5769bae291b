use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{info, warn};

use crate::config::get_config;
use crate::AppState;

/// Kicks off an acquisition cycle and returns immediately. The cycle runs
/// on its own task under the configured deadline; progress and the final
/// counts surface in the logs, not in this response.
#[utoipa::path(
    post,
    path = "/api/scrape/run",
    responses(
        (status = 202, description = "Acquisition cycle started")
    )
)]
#[axum::debug_handler]
pub async fn run_acquisition(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.acquisition_service.clone();
    let deadline = get_config().cycle_deadline();
    tokio::spawn(async move {
        match tokio::time::timeout(deadline, service.run_cycle()).await {
            Ok(summary) => info!(
                discovered = summary.discovered,
                new = summary.new,
                existing = summary.existing,
                failed_sources = summary.failed_sources,
                errors = summary.errors,
                "triggered acquisition cycle finished"
            ),
            Err(_) => warn!(
                deadline_secs = deadline.as_secs(),
                "acquisition cycle exceeded its deadline and was cancelled"
            ),
        }
    });
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}

#[utoipa::path(
    post,
    path = "/api/scrape/sweep",
    responses(
        (status = 202, description = "Staleness sweep started")
    )
)]
#[axum::debug_handler]
pub async fn run_sweep(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.sweep_service.clone();
    let deadline = get_config().cycle_deadline();
    tokio::spawn(async move {
        match tokio::time::timeout(deadline, service.sweep()).await {
            Ok(summary) => info!(
                checked = summary.checked,
                live = summary.live,
                removed = summary.removed,
                skipped = summary.skipped,
                errors = summary.errors,
                "triggered staleness sweep finished"
            ),
            Err(_) => warn!(
                deadline_secs = deadline.as_secs(),
                "staleness sweep exceeded its deadline and was cancelled"
            ),
        }
    });
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}
