//! Predictive forecast API endpoints

use axum::{extract::State, Json};

use crate::error::{AppError, Result};
use crate::models::ForecastScan;
use crate::scan::{self, ScanReport};
use crate::state::AppState;

/// GET /api/v1/forecast
///
/// Returns the most recent persisted scan, including insufficient-data
/// and failed ones; callers inspect `ok` and `error`.
pub async fn latest_forecast(State(state): State<AppState>) -> Result<Json<ForecastScan>> {
    let scan = state
        .store
        .latest_scan()
        .await?
        .ok_or_else(|| AppError::NotFound("no scans recorded yet".to_string()))?;

    Ok(Json(scan))
}

/// POST /api/v1/forecast/scan
///
/// Runs the full scan pipeline immediately and returns its report.
/// Same-day alerts are suppressed by the idempotence key, so running
/// this repeatedly is safe.
pub async fn run_scan_now(State(state): State<AppState>) -> Result<Json<ScanReport>> {
    let report = scan::run_scan(&state.store, &state.slos, &state.capacity, &state.rules).await?;

    state.metrics.inc_scans();
    if !report.outcome.ok {
        state.metrics.inc_scan_failures();
    }
    state.metrics.inc_alerts_created(report.alerts_created as u64);
    state.metrics.inc_alerts_skipped(report.alerts_skipped as u64);

    Ok(Json(report))
}
