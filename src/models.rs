//! Core domain models for OpsPulse

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a raw operational event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The operation succeeded
    Success,
    /// The operation failed
    Failure,
    /// The operation timed out
    Timeout,
}

/// A single raw operational event (webhook outcome, request, job run)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Unique identifier for this event
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Service that produced this event
    pub service: String,
    /// Event outcome
    pub outcome: EventOutcome,
    /// Error detail if the outcome was not success
    #[serde(default)]
    pub message: Option<String>,
    /// When the event occurred
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
    /// Optional metadata tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RawEvent {
    /// Create a new RawEvent with a generated ID
    pub fn new(service: impl Into<String>, outcome: EventOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: service.into(),
            outcome,
            message: None,
            occurred_at: Utc::now(),
            tags: Vec::new(),
        }
    }
}

/// Event counts over an SLO window, as read from the store
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EventCounts {
    pub total_events: u64,
    pub bad_events: u64,
}

/// Rolling time window for an SLO, fixed at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SloWindow {
    Days7,
    Days30,
}

impl SloWindow {
    /// The window as a concrete duration
    pub fn as_duration(&self) -> Duration {
        match self {
            SloWindow::Days7 => Duration::days(7),
            SloWindow::Days30 => Duration::days(30),
        }
    }

    /// Short human label, e.g. "7d"
    pub fn label(&self) -> &'static str {
        match self {
            SloWindow::Days7 => "7d",
            SloWindow::Days30 => "30d",
        }
    }
}

/// Which event outcomes count against the error budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadEventRule {
    /// Only hard failures are bad
    Failures,
    /// Failures and timeouts are both bad
    FailuresOrTimeouts,
}

impl BadEventRule {
    pub fn matches(&self, outcome: EventOutcome) -> bool {
        match self {
            BadEventRule::Failures => outcome == EventOutcome::Failure,
            BadEventRule::FailuresOrTimeouts => {
                matches!(outcome, EventOutcome::Failure | EventOutcome::Timeout)
            }
        }
    }
}

/// Static SLO definition, not mutated at runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloDefinition {
    pub id: String,
    pub service: String,
    /// Target percentage of good events, 0-100
    pub target_percent: f64,
    pub window: SloWindow,
    pub bad_events: BadEventRule,
}

/// Health classification of an SLO over its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SloStatus {
    Healthy,
    AtRisk,
    Violating,
}

/// Computed burn state for one SLO. Always recomputed, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SloBurn {
    pub slo_id: String,
    pub service: String,
    pub window: &'static str,
    pub achieved_percent: f64,
    pub target_percent: f64,
    pub error_budget_consumed_percent: f64,
    pub status: SloStatus,
    /// Raw counts so callers can tell "no traffic" apart from "perfect"
    pub total_events: u64,
    pub bad_events: u64,
}

/// Point-in-time capacity measurement, written by an external scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub id: Uuid,
    pub date: NaiveDate,
    pub total_hours: f64,
    pub total_mrr: f64,
    pub project_count: i64,
    pub utilization_percent: f64,
    pub risk_label: String,
    pub created_at: DateTime<Utc>,
}

/// Capacity limits and thresholds the forecaster projects against
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapacitySettings {
    pub max_hours: f64,
    pub max_projects: i64,
    /// Utilization percent above which capacity is a warning
    pub warning_threshold: f64,
    /// Utilization percent above which capacity is critical
    pub critical_threshold: f64,
    pub mrr_target: f64,
}

impl Default for CapacitySettings {
    fn default() -> Self {
        Self {
            max_hours: 160.0,
            max_projects: 10,
            warning_threshold: 75.0,
            critical_threshold: 90.0,
            mrr_target: 10_000.0,
        }
    }
}

/// Risk classification for a projected utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastRisk {
    Low,
    Medium,
    High,
    Critical,
}

/// Output of one predictive forecast computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveForecast {
    pub current_utilization: f64,
    pub trend_hours_per_day: f64,
    pub trend_mrr_per_day: f64,
    pub projected_3day_utilization: f64,
    pub projected_3day_hours: f64,
    pub projected_3day_mrr: f64,
    pub risk_level: ForecastRisk,
    /// Only set while the hours trend is strictly positive
    pub days_until_capacity: Option<f64>,
    /// 0.0 to 1.0
    pub confidence_score: f64,
}

impl PredictiveForecast {
    /// Zeroed forecast used for insufficient-data and failed scans
    pub fn empty() -> Self {
        Self {
            current_utilization: 0.0,
            trend_hours_per_day: 0.0,
            trend_mrr_per_day: 0.0,
            projected_3day_utilization: 0.0,
            projected_3day_hours: 0.0,
            projected_3day_mrr: 0.0,
            risk_level: ForecastRisk::Low,
            days_until_capacity: None,
            confidence_score: 0.0,
        }
    }
}

/// Persisted record of one forecast scan, append-only audit history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastScan {
    pub id: Uuid,
    /// False only when the computation itself failed
    pub ok: bool,
    /// Set for insufficient-data and failure outcomes
    pub error: Option<String>,
    pub forecast: PredictiveForecast,
    pub snapshot_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Severity of an alert as produced by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// An alert produced by the scan pipeline, immutable after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub source: String,
    /// Free-form attributes; `forecast_type` participates in the
    /// per-day idempotence key
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// The forecast_type meta attribute, if present
    pub fn forecast_type(&self) -> Option<&str> {
        self.meta.get("forecast_type").and_then(|v| v.as_str())
    }
}

/// Incident lifecycle status; resolved is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Monitoring,
    Resolved,
}

impl IncidentStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, IncidentStatus::Resolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    Alert,
    Action,
    Note,
    Auto,
}

/// One entry in an incident timeline, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: TimelineEventType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl TimelineEvent {
    pub fn now(event_type: TimelineEventType, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            message: message.into(),
            meta: None,
        }
    }
}

/// An incident correlating one or more alerts for a single source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub status: IncidentStatus,
    pub severity: IncidentSeverity,
    pub source: String,
    pub related_alert_ids: Vec<Uuid>,
    pub timeline: Vec<TimelineEvent>,
    pub runbook_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Predefined remediation steps, matched to incidents by source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runbook {
    pub id: Uuid,
    pub name: String,
    pub source: String,
    pub steps: Vec<String>,
    pub active: bool,
}

/// Overall capacity classification in the digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityStatus {
    Healthy,
    Warning,
    Critical,
}

/// Capacity section of the ops digest
#[derive(Debug, Clone, Serialize)]
pub struct CapacitySummary {
    pub utilization_percent: f64,
    pub projected_3day_utilization: f64,
    pub risk_level: ForecastRisk,
    pub status: CapacityStatus,
    pub scanned_at: DateTime<Utc>,
}

/// Incident line in the ops digest
#[derive(Debug, Clone, Serialize)]
pub struct DigestIncident {
    pub id: Uuid,
    pub title: String,
    pub status: IncidentStatus,
    pub severity: IncidentSeverity,
    pub source: String,
    pub age_hours: f64,
}

/// Consolidated periodic rollup for humans
#[derive(Debug, Clone, Serialize)]
pub struct OpsDigest {
    pub generated_at: DateTime<Utc>,
    pub slo: Vec<SloBurn>,
    pub incidents: Vec<DigestIncident>,
    pub capacity: Option<CapacitySummary>,
}

/// Request payload for ingesting raw events
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub events: Vec<RawEvent>,
}

/// Response payload for ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    /// Number of events accepted into the buffer
    pub ingested: usize,
    /// Number of events dropped (buffer full)
    pub dropped: usize,
}
