//! Reminder dispatch trigger and status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::types::{ApiContext, LastScanResponse};
use crate::core_state::ScanOutcome;
use crate::reminders::DispatchSummary;

/// `POST /api/reminders/dispatch`: run one scan now.
///
/// Always answers with a summary: 200 when the scan ran (even if some
/// users failed), 500 when users could not be loaded, 409 with the last
/// known summary when a scan is already running.
pub async fn dispatch(State(ctx): State<ApiContext>) -> (StatusCode, Json<DispatchSummary>) {
    match ctx.core.run_dispatch().await {
        ScanOutcome::Completed(summary) if summary.success => (StatusCode::OK, Json(summary)),
        ScanOutcome::Completed(summary) => (StatusCode::INTERNAL_SERVER_ERROR, Json(summary)),
        ScanOutcome::AlreadyRunning => {
            let mut summary = ctx.core.last_summary().unwrap_or_default();
            summary.success = false;
            summary.error = Some("A reminder scan is already running".into());
            (StatusCode::CONFLICT, Json(summary))
        }
    }
}

/// `GET /api/reminders/last`: most recent summary, if any.
pub async fn last(State(ctx): State<ApiContext>) -> Json<LastScanResponse> {
    Json(LastScanResponse {
        running: ctx.core.is_scan_running(),
        summary: ctx.core.last_summary(),
    })
}
