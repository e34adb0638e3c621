//! Prometheus metrics endpoint

use axum::response::IntoResponse;
use std::sync::atomic::{AtomicU64, Ordering};

/// Application metrics for Prometheus
#[derive(Default)]
pub struct Metrics {
    /// Total raw events ingested
    pub events_ingested_total: AtomicU64,
    /// Total raw events dropped (buffer full)
    pub events_dropped_total: AtomicU64,
    /// Total alerts created
    pub alerts_created_total: AtomicU64,
    /// Total alert creations suppressed by the per-day idempotence key
    pub alerts_skipped_total: AtomicU64,
    /// Total scans run
    pub scans_total: AtomicU64,
    /// Scans whose forecast computation failed
    pub scan_failures_total: AtomicU64,
    /// Current buffer depth
    buffer_depth: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_ingested(&self, count: u64) {
        self.events_ingested_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self, count: u64) {
        self.events_dropped_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_alerts_created(&self, count: u64) {
        self.alerts_created_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_alerts_skipped(&self, count: u64) {
        self.alerts_skipped_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_scans(&self) {
        self.scans_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_scan_failures(&self) {
        self.scan_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_buffer_depth(&self, depth: u64) {
        self.buffer_depth.store(depth, Ordering::Relaxed);
    }
}

/// GET /metrics
///
/// Returns Prometheus-format metrics
pub async fn prometheus_metrics(
    axum::extract::State(state): axum::extract::State<crate::state::AppState>,
) -> impl IntoResponse {
    let m = &state.metrics;
    let buffer_len = state.event_buffer.len() as u64;

    // Update buffer depth
    m.set_buffer_depth(buffer_len);

    let output = format!(
        r#"# HELP opspulse_events_ingested_total Total number of raw events ingested
# TYPE opspulse_events_ingested_total counter
opspulse_events_ingested_total {}

# HELP opspulse_events_dropped_total Total number of raw events dropped due to buffer full
# TYPE opspulse_events_dropped_total counter
opspulse_events_dropped_total {}

# HELP opspulse_alerts_created_total Total number of alerts created
# TYPE opspulse_alerts_created_total counter
opspulse_alerts_created_total {}

# HELP opspulse_alerts_skipped_total Total number of alert creations suppressed as same-day duplicates
# TYPE opspulse_alerts_skipped_total counter
opspulse_alerts_skipped_total {}

# HELP opspulse_scans_total Total number of predictive scans run
# TYPE opspulse_scans_total counter
opspulse_scans_total {}

# HELP opspulse_scan_failures_total Total number of scans with failed forecast computation
# TYPE opspulse_scan_failures_total counter
opspulse_scan_failures_total {}

# HELP opspulse_buffer_depth Current number of events in buffer
# TYPE opspulse_buffer_depth gauge
opspulse_buffer_depth {}

# HELP opspulse_info Build information
# TYPE opspulse_info gauge
opspulse_info{{version="{}"}} 1
"#,
        m.events_ingested_total.load(Ordering::Relaxed),
        m.events_dropped_total.load(Ordering::Relaxed),
        m.alerts_created_total.load(Ordering::Relaxed),
        m.alerts_skipped_total.load(Ordering::Relaxed),
        m.scans_total.load(Ordering::Relaxed),
        m.scan_failures_total.load(Ordering::Relaxed),
        buffer_len,
        env!("CARGO_PKG_VERSION"),
    );

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
