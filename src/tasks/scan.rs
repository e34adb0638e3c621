//! Predictive scan background task

use crate::scan;
use crate::state::AppState;
use std::time::Duration;
use tracing::{error, info};

/// Background task that periodically runs the full scan pipeline:
/// forecast, candidate alerts, rule evaluation, incident correlation.
///
/// Same-day alerts are suppressed by the idempotence key, so the
/// interval can be tightened without changing alert volume.
pub async fn scan_task(state: AppState, interval_secs: u64) {
    // Let the flush task land initial events first
    tokio::time::sleep(Duration::from_secs(30)).await;

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    info!(interval_secs = interval_secs, "Scan task started");

    loop {
        interval.tick().await;

        match scan::run_scan(&state.store, &state.slos, &state.capacity, &state.rules).await {
            Ok(report) => {
                state.metrics.inc_scans();
                if !report.outcome.ok {
                    state.metrics.inc_scan_failures();
                }
                state.metrics.inc_alerts_created(report.alerts_created as u64);
                state.metrics.inc_alerts_skipped(report.alerts_skipped as u64);
            }
            Err(e) => {
                state.metrics.inc_scans();
                state.metrics.inc_scan_failures();
                error!(error = %e, "Scan run failed");
            }
        }
    }
}
