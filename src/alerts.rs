//! Candidate alert construction and idempotent creation
//!
//! Alerts are created at most once per triggering condition per UTC
//! calendar day; the idempotence key is alert type + source +
//! forecast_type + date. A suppressed duplicate is a deliberate
//! outcome, reported as skipped rather than as an error, regardless of
//! how often scans run.

use crate::error::Result;
use crate::forecast::ScanOutcome;
use crate::models::{Alert, AlertSeverity, ForecastRisk, SloBurn, SloStatus};
use crate::store::OpsStore;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

/// Days-until-capacity threshold below which an alert is raised
const CAPACITY_RUNWAY_DAYS: f64 = 7.0;

/// Minimum confidence before trend-based alerts fire
const MIN_ALERT_CONFIDENCE: f64 = 0.5;

/// Outcome of one idempotent creation attempt
#[derive(Debug, Clone)]
pub enum AlertCreation {
    Created(Alert),
    /// An alert with the same idempotence key already exists today
    Skipped,
}

/// An alert that has been decided but not yet created
#[derive(Debug, Clone)]
pub struct CandidateAlert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub source: String,
    pub meta: serde_json::Value,
}

impl CandidateAlert {
    fn forecast_type(&self) -> Option<&str> {
        self.meta.get("forecast_type").and_then(|v| v.as_str())
    }

    fn into_alert(self) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            alert_type: self.alert_type,
            severity: self.severity,
            message: self.message,
            source: self.source,
            meta: self.meta,
            created_at: Utc::now(),
        }
    }
}

/// Create the alert unless one with the same key exists for today.
///
/// Check-then-insert without a lock: concurrent scans can race and
/// both create, which is accepted at this alert volume.
pub async fn create_alert_if_new(
    store: &dyn OpsStore,
    candidate: CandidateAlert,
) -> Result<AlertCreation> {
    let today = Utc::now().date_naive();

    let existing = store
        .find_alert_for_day(
            &candidate.alert_type,
            &candidate.source,
            candidate.forecast_type(),
            today,
        )
        .await?;

    if let Some(existing) = existing {
        debug!(
            alert_type = %candidate.alert_type,
            existing_id = %existing.id,
            "Alert already created today, skipping"
        );
        return Ok(AlertCreation::Skipped);
    }

    let alert = candidate.into_alert();
    store.insert_alert(&alert).await?;
    info!(
        alert_id = %alert.id,
        alert_type = %alert.alert_type,
        source = %alert.source,
        "Alert created"
    );
    Ok(AlertCreation::Created(alert))
}

/// Derive candidate alerts from a forecast scan outcome.
pub fn candidates_for_forecast(outcome: &ScanOutcome) -> Vec<CandidateAlert> {
    let mut candidates = Vec::new();

    if !outcome.ok || outcome.error.is_some() {
        return candidates;
    }
    let forecast = &outcome.forecast;

    if forecast.risk_level >= ForecastRisk::High {
        let severity = if forecast.risk_level == ForecastRisk::Critical {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        candidates.push(CandidateAlert {
            alert_type: "predictive_capacity".to_string(),
            severity,
            message: format!(
                "Projected utilization {:.1}% in 3 days (currently {:.1}%)",
                forecast.projected_3day_utilization, forecast.current_utilization
            ),
            source: "capacity".to_string(),
            meta: json!({
                "forecast_type": "utilization",
                "projected_3day_utilization": forecast.projected_3day_utilization,
                "risk_level": forecast.risk_level,
                "confidence_score": forecast.confidence_score,
            }),
        });
    }

    if let Some(days) = forecast.days_until_capacity {
        if days <= CAPACITY_RUNWAY_DAYS && forecast.confidence_score >= MIN_ALERT_CONFIDENCE {
            let severity = if days <= 3.0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            candidates.push(CandidateAlert {
                alert_type: "predictive_capacity".to_string(),
                severity,
                message: format!("Capacity exhausted in an estimated {:.1} days", days),
                source: "capacity".to_string(),
                meta: json!({
                    "forecast_type": "days_until_capacity",
                    "days_until_capacity": days,
                    "trend_hours_per_day": forecast.trend_hours_per_day,
                    "confidence_score": forecast.confidence_score,
                }),
            });
        }
    }

    if forecast.trend_mrr_per_day < 0.0 && forecast.confidence_score >= MIN_ALERT_CONFIDENCE {
        candidates.push(CandidateAlert {
            alert_type: "predictive_capacity".to_string(),
            severity: AlertSeverity::Info,
            message: format!(
                "MRR trending down {:.2}/day over the scan window",
                forecast.trend_mrr_per_day.abs()
            ),
            source: "capacity".to_string(),
            meta: json!({
                "forecast_type": "mrr_decline",
                "trend_mrr_per_day": forecast.trend_mrr_per_day,
                "confidence_score": forecast.confidence_score,
            }),
        });
    }

    candidates
}

/// Derive a candidate alert from an SLO burn. Only a violating SLO
/// produces one; the at-risk band exists to avoid exactly this noise.
pub fn candidate_for_burn(burn: &SloBurn) -> Option<CandidateAlert> {
    if burn.status != SloStatus::Violating {
        return None;
    }

    Some(CandidateAlert {
        alert_type: "slo_violation".to_string(),
        severity: AlertSeverity::Error,
        message: format!(
            "SLO {} violating: {:.2}% achieved against {:.2}% target over {}",
            burn.slo_id, burn.achieved_percent, burn.target_percent, burn.window
        ),
        source: burn.service.clone(),
        meta: json!({
            "slo_id": burn.slo_id,
            "achieved_percent": burn.achieved_percent,
            "target_percent": burn.target_percent,
            "error_budget_consumed_percent": burn.error_budget_consumed_percent,
            "window": burn.window,
        }),
    })
}
