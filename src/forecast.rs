//! Predictive capacity forecaster
//!
//! Ordinary least-squares trend over a rolling window of capacity
//! snapshots, projected three days forward. Regression smooths noise
//! across the window instead of reacting to a single snapshot-to-snapshot
//! jump.

use crate::models::{CapacitySettings, CapacitySnapshot, ForecastRisk, PredictiveForecast};
use serde::Serialize;

/// Minimum snapshots required before the trend is meaningful
pub const MIN_SNAPSHOTS: usize = 3;

/// Days projected forward
const HORIZON_DAYS: f64 = 3.0;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Result envelope for one forecast computation.
///
/// Insufficient data is an expected steady-state condition early in
/// collection, so it is `ok = true` with the error field set. Only a
/// failed computation reports `ok = false`. Both carry an empty
/// forecast; a partial forecast is never returned.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub ok: bool,
    pub error: Option<String>,
    pub forecast: PredictiveForecast,
    pub snapshot_count: u32,
}

/// Build a forecast from chronologically ordered snapshots.
pub fn build_forecast(snapshots: &[CapacitySnapshot], settings: &CapacitySettings) -> ScanOutcome {
    let count = snapshots.len() as u32;

    if snapshots.len() < MIN_SNAPSHOTS {
        return ScanOutcome {
            ok: true,
            error: Some(format!(
                "insufficient data: {} snapshots, need at least {}",
                snapshots.len(),
                MIN_SNAPSHOTS
            )),
            forecast: PredictiveForecast::empty(),
            snapshot_count: count,
        };
    }

    match compute(snapshots, settings) {
        Ok(forecast) => ScanOutcome {
            ok: true,
            error: None,
            forecast,
            snapshot_count: count,
        },
        Err(e) => ScanOutcome {
            ok: false,
            error: Some(e),
            forecast: PredictiveForecast::empty(),
            snapshot_count: count,
        },
    }
}

fn compute(
    snapshots: &[CapacitySnapshot],
    settings: &CapacitySettings,
) -> Result<PredictiveForecast, String> {
    if settings.max_hours <= 0.0 {
        return Err("max_hours must be positive".to_string());
    }

    let xs: Vec<f64> = snapshots
        .iter()
        .map(|s| s.created_at.timestamp_millis() as f64)
        .collect();
    let hours: Vec<f64> = snapshots.iter().map(|s| s.total_hours).collect();
    let mrr: Vec<f64> = snapshots.iter().map(|s| s.total_mrr).collect();

    // Per-millisecond slopes scaled to per-day units
    let trend_hours_per_day = ols_slope(&xs, &hours) * MS_PER_DAY;
    let trend_mrr_per_day = ols_slope(&xs, &mrr) * MS_PER_DAY;

    let current = snapshots.last().ok_or("no current snapshot")?;
    let current_utilization = current.total_hours / settings.max_hours * 100.0;

    // Trends cannot drive hours or revenue negative
    let projected_3day_hours = (current.total_hours + trend_hours_per_day * HORIZON_DAYS).max(0.0);
    let projected_3day_mrr = (current.total_mrr + trend_mrr_per_day * HORIZON_DAYS).max(0.0);
    let projected_3day_utilization = projected_3day_hours / settings.max_hours * 100.0;

    let days_until_capacity = if trend_hours_per_day > 0.0 {
        Some(((settings.max_hours - current.total_hours) / trend_hours_per_day).max(0.0))
    } else {
        None
    };

    let confidence_score = confidence(snapshots.len(), trend_hours_per_day, trend_mrr_per_day);

    let forecast = PredictiveForecast {
        current_utilization,
        trend_hours_per_day,
        trend_mrr_per_day,
        projected_3day_utilization,
        projected_3day_hours,
        projected_3day_mrr,
        risk_level: classify_risk(projected_3day_utilization),
        days_until_capacity,
        confidence_score,
    };

    // Never hand back a partially valid forecast
    if !is_finite(&forecast) {
        return Err("non-finite value in forecast computation".to_string());
    }

    Ok(forecast)
}

/// OLS slope of y against x. Zero when x has no variance.
///
/// Sums are taken over mean-centered x values: the raw x inputs are
/// epoch milliseconds (~1.8e12), and the textbook `n*sum_xy - sum_x*sum_y`
/// form cancels catastrophically at that magnitude.
fn ols_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_x: f64 = xs.iter().sum::<f64>() / n;
    let mean_y: f64 = ys.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut denom = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        num += dx * (y - mean_y);
        denom += dx * dx;
    }

    if denom == 0.0 {
        return 0.0;
    }
    num / denom
}

/// Risk classification on projected utilization
pub fn classify_risk(projected_utilization: f64) -> ForecastRisk {
    if projected_utilization >= 100.0 {
        ForecastRisk::Critical
    } else if projected_utilization >= 90.0 {
        ForecastRisk::High
    } else if projected_utilization >= 75.0 {
        ForecastRisk::Medium
    } else {
        ForecastRisk::Low
    }
}

/// Confidence score in [0, 1]: more history raises the base, a stable
/// hours trend and agreeing hours/MRR trends each add a bonus.
fn confidence(snapshot_count: usize, trend_hours_per_day: f64, trend_mrr_per_day: f64) -> f64 {
    let mut score = (snapshot_count as f64 / 10.0).min(0.7);
    if trend_hours_per_day.abs() < 5.0 {
        score += 0.2;
    }
    if trend_hours_per_day * trend_mrr_per_day > 0.0 {
        score += 0.1;
    }
    score.min(1.0)
}

fn is_finite(f: &PredictiveForecast) -> bool {
    [
        f.current_utilization,
        f.trend_hours_per_day,
        f.trend_mrr_per_day,
        f.projected_3day_utilization,
        f.projected_3day_hours,
        f.projected_3day_mrr,
        f.confidence_score,
    ]
    .iter()
    .all(|v| v.is_finite())
        && f.days_until_capacity.map_or(true, |d| d.is_finite())
}
