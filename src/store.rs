//! Store abstraction and backends
//!
//! The computational core talks to a small repository trait covering
//! exactly the reads and writes it needs, so it carries no dependency
//! on any particular store API. `PgStore` is the production backend
//! (PostgreSQL via SQLx); `MemoryStore` backs tests and local runs.

use crate::error::{AppError, Result};
use crate::models::{
    Alert, AlertSeverity, BadEventRule, CapacitySnapshot, EventCounts, EventOutcome, ForecastScan,
    Incident, IncidentSeverity, IncidentStatus, RawEvent, Runbook,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Repository interface for everything the pipeline persists or reads.
///
/// All methods are single round-trips; retries and timeouts are the
/// backend's concern.
#[async_trait]
pub trait OpsStore: Send + Sync {
    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<()>;

    // --- raw events ---
    async fn insert_events(&self, events: &[RawEvent]) -> Result<usize>;

    /// Count total and bad events for a service since `since`
    async fn count_events(
        &self,
        service: &str,
        since: DateTime<Utc>,
        rule: BadEventRule,
    ) -> Result<EventCounts>;

    // --- capacity snapshots ---
    async fn insert_snapshot(&self, snapshot: &CapacitySnapshot) -> Result<()>;

    /// Most recent `n` snapshots, newest first
    async fn list_recent_snapshots(&self, n: i64) -> Result<Vec<CapacitySnapshot>>;

    // --- alerts ---
    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    /// Find an alert of the given type and source (and forecast_type,
    /// when set) created on the given UTC calendar day. Backs the
    /// per-day idempotence key; source keeps alerts for distinct
    /// services from suppressing each other.
    async fn find_alert_for_day(
        &self,
        alert_type: &str,
        source: &str,
        forecast_type: Option<&str>,
        day: NaiveDate,
    ) -> Result<Option<Alert>>;

    async fn list_recent_alerts(&self, limit: i64) -> Result<Vec<Alert>>;

    // --- incidents ---
    async fn insert_incident(&self, incident: &Incident) -> Result<()>;

    async fn update_incident(&self, incident: &Incident) -> Result<()>;

    async fn get_incident(&self, id: Uuid) -> Result<Option<Incident>>;

    /// Most recently created non-resolved incident for a source
    async fn find_open_incident(&self, source: &str) -> Result<Option<Incident>>;

    /// Non-resolved incidents, newest first
    async fn list_open_incidents(&self, limit: i64) -> Result<Vec<Incident>>;

    // --- runbooks ---
    async fn find_runbook(&self, source: &str) -> Result<Option<Runbook>>;

    async fn insert_runbook(&self, runbook: &Runbook) -> Result<()>;

    // --- forecast scans ---
    async fn insert_scan(&self, scan: &ForecastScan) -> Result<()>;

    async fn latest_scan(&self) -> Result<Option<ForecastScan>>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(connection_string)
            .await
            .map_err(|e| AppError::StoreError(format!("Failed to connect: {}", e)))?;

        info!("Store connection pool established");
        Ok(Self { pool })
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_incident(row: &sqlx::postgres::PgRow) -> Result<Incident> {
        let related: serde_json::Value = row.get("related_alert_ids");
        let timeline: serde_json::Value = row.get("timeline");
        Ok(Incident {
            id: row.get("id"),
            title: row.get("title"),
            status: incident_status_from_str(row.get("status")),
            severity: incident_severity_from_str(row.get("severity")),
            source: row.get("source"),
            related_alert_ids: serde_json::from_value(related)?,
            timeline: serde_json::from_value(timeline)?,
            runbook_id: row.get("runbook_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_alert(row: &sqlx::postgres::PgRow) -> Alert {
        Alert {
            id: row.get("id"),
            alert_type: row.get("alert_type"),
            severity: alert_severity_from_str(row.get("severity")),
            message: row.get("message"),
            source: row.get("source"),
            meta: row.get("meta"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_scan(row: &sqlx::postgres::PgRow) -> Result<ForecastScan> {
        let forecast: serde_json::Value = row.get("forecast");
        Ok(ForecastScan {
            id: row.get("id"),
            ok: row.get("ok"),
            error: row.get("error"),
            forecast: serde_json::from_value(forecast)?,
            snapshot_count: row.get::<i32, _>("snapshot_count") as u32,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl OpsStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn insert_events(&self, events: &[RawEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for event in events {
            let res = sqlx::query(
                r#"
                INSERT INTO raw_events (id, service, outcome, message, occurred_at, tags)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(event.id)
            .bind(&event.service)
            .bind(outcome_to_str(event.outcome))
            .bind(&event.message)
            .bind(event.occurred_at)
            .bind(&event.tags)
            .execute(&mut *tx)
            .await;

            match res {
                Ok(_) => inserted += 1,
                Err(e) => {
                    tracing::error!(error = %e, event_id = %event.id, "Failed to insert event");
                }
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn count_events(
        &self,
        service: &str,
        since: DateTime<Utc>,
        rule: BadEventRule,
    ) -> Result<EventCounts> {
        let bad_outcomes: Vec<String> = match rule {
            BadEventRule::Failures => vec!["failure".to_string()],
            BadEventRule::FailuresOrTimeouts => {
                vec!["failure".to_string(), "timeout".to_string()]
            }
        };

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE outcome = ANY($3)) AS bad
            FROM raw_events
            WHERE service = $1 AND occurred_at >= $2
            "#,
        )
        .bind(service)
        .bind(since)
        .bind(&bad_outcomes)
        .fetch_one(&self.pool)
        .await?;

        Ok(EventCounts {
            total_events: row.get::<i64, _>("total") as u64,
            bad_events: row.get::<i64, _>("bad") as u64,
        })
    }

    async fn insert_snapshot(&self, snapshot: &CapacitySnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO capacity_snapshots (
                id, date, total_hours, total_mrr, project_count,
                utilization_percent, risk_label, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.date)
        .bind(snapshot.total_hours)
        .bind(snapshot.total_mrr)
        .bind(snapshot.project_count)
        .bind(snapshot.utilization_percent)
        .bind(&snapshot.risk_label)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent_snapshots(&self, n: i64) -> Result<Vec<CapacitySnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT id, date, total_hours, total_mrr, project_count,
                   utilization_percent, risk_label, created_at
            FROM capacity_snapshots
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CapacitySnapshot {
                id: row.get("id"),
                date: row.get("date"),
                total_hours: row.get("total_hours"),
                total_mrr: row.get("total_mrr"),
                project_count: row.get("project_count"),
                utilization_percent: row.get("utilization_percent"),
                risk_label: row.get("risk_label"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, alert_type, severity, message, source, meta, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(alert.id)
        .bind(&alert.alert_type)
        .bind(alert_severity_to_str(alert.severity))
        .bind(&alert.message)
        .bind(&alert.source)
        .bind(&alert.meta)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_alert_for_day(
        &self,
        alert_type: &str,
        source: &str,
        forecast_type: Option<&str>,
        day: NaiveDate,
    ) -> Result<Option<Alert>> {
        let day_start = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::InternalError("invalid day".into()))?
            .and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        let row = sqlx::query(
            r#"
            SELECT id, alert_type, severity, message, source, meta, created_at
            FROM alerts
            WHERE alert_type = $1
              AND source = $2
              AND COALESCE(meta->>'forecast_type', '') = $3
              AND created_at >= $4 AND created_at < $5
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(alert_type)
        .bind(source)
        .bind(forecast_type.unwrap_or(""))
        .bind(day_start)
        .bind(day_end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Self::row_to_alert(&r)))
    }

    async fn list_recent_alerts(&self, limit: i64) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, alert_type, severity, message, source, meta, created_at
            FROM alerts
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_alert).collect())
    }

    async fn insert_incident(&self, incident: &Incident) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO incidents (
                id, title, status, severity, source,
                related_alert_ids, timeline, runbook_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(incident.id)
        .bind(&incident.title)
        .bind(incident_status_to_str(incident.status))
        .bind(incident_severity_to_str(incident.severity))
        .bind(&incident.source)
        .bind(serde_json::to_value(&incident.related_alert_ids)?)
        .bind(serde_json::to_value(&incident.timeline)?)
        .bind(incident.runbook_id)
        .bind(incident.created_at)
        .bind(incident.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_incident(&self, incident: &Incident) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE incidents SET
                title = $2, status = $3, severity = $4,
                related_alert_ids = $5, timeline = $6,
                runbook_id = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(incident.id)
        .bind(&incident.title)
        .bind(incident_status_to_str(incident.status))
        .bind(incident_severity_to_str(incident.severity))
        .bind(serde_json::to_value(&incident.related_alert_ids)?)
        .bind(serde_json::to_value(&incident.timeline)?)
        .bind(incident.runbook_id)
        .bind(incident.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_incident(&self, id: Uuid) -> Result<Option<Incident>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, status, severity, source,
                   related_alert_ids, timeline, runbook_id, created_at, updated_at
            FROM incidents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::row_to_incident(&r)).transpose()
    }

    async fn find_open_incident(&self, source: &str) -> Result<Option<Incident>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, status, severity, source,
                   related_alert_ids, timeline, runbook_id, created_at, updated_at
            FROM incidents
            WHERE source = $1 AND status != 'resolved'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::row_to_incident(&r)).transpose()
    }

    async fn list_open_incidents(&self, limit: i64) -> Result<Vec<Incident>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, status, severity, source,
                   related_alert_ids, timeline, runbook_id, created_at, updated_at
            FROM incidents
            WHERE status != 'resolved'
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_incident).collect()
    }

    async fn find_runbook(&self, source: &str) -> Result<Option<Runbook>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, source, steps, active
            FROM runbooks
            WHERE source = $1 AND active = TRUE
            LIMIT 1
            "#,
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Runbook {
            id: r.get("id"),
            name: r.get("name"),
            source: r.get("source"),
            steps: r.get("steps"),
            active: r.get("active"),
        }))
    }

    async fn insert_runbook(&self, runbook: &Runbook) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO runbooks (id, name, source, steps, active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(runbook.id)
        .bind(&runbook.name)
        .bind(&runbook.source)
        .bind(&runbook.steps)
        .bind(runbook.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_scan(&self, scan: &ForecastScan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO forecast_scans (id, ok, error, forecast, snapshot_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(scan.id)
        .bind(scan.ok)
        .bind(&scan.error)
        .bind(serde_json::to_value(&scan.forecast)?)
        .bind(scan.snapshot_count as i32)
        .bind(scan.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_scan(&self) -> Result<Option<ForecastScan>> {
        let row = sqlx::query(
            r#"
            SELECT id, ok, error, forecast, snapshot_count, created_at
            FROM forecast_scans
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::row_to_scan(&r)).transpose()
    }
}

/// In-memory store for tests and local development
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    events: Vec<RawEvent>,
    snapshots: Vec<CapacitySnapshot>,
    alerts: Vec<Alert>,
    incidents: Vec<Incident>,
    runbooks: Vec<Runbook>,
    scans: Vec<ForecastScan>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OpsStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_events(&self, events: &[RawEvent]) -> Result<usize> {
        let mut inner = self.inner.write();
        inner.events.extend_from_slice(events);
        Ok(events.len())
    }

    async fn count_events(
        &self,
        service: &str,
        since: DateTime<Utc>,
        rule: BadEventRule,
    ) -> Result<EventCounts> {
        let inner = self.inner.read();
        let mut counts = EventCounts::default();
        for event in inner
            .events
            .iter()
            .filter(|e| e.service == service && e.occurred_at >= since)
        {
            counts.total_events += 1;
            if rule.matches(event.outcome) {
                counts.bad_events += 1;
            }
        }
        Ok(counts)
    }

    async fn insert_snapshot(&self, snapshot: &CapacitySnapshot) -> Result<()> {
        self.inner.write().snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn list_recent_snapshots(&self, n: i64) -> Result<Vec<CapacitySnapshot>> {
        let inner = self.inner.read();
        let mut snapshots = inner.snapshots.clone();
        snapshots.sort_by_key(|s| std::cmp::Reverse(s.created_at));
        snapshots.truncate(n as usize);
        Ok(snapshots)
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        self.inner.write().alerts.push(alert.clone());
        Ok(())
    }

    async fn find_alert_for_day(
        &self,
        alert_type: &str,
        source: &str,
        forecast_type: Option<&str>,
        day: NaiveDate,
    ) -> Result<Option<Alert>> {
        let inner = self.inner.read();
        Ok(inner
            .alerts
            .iter()
            .filter(|a| {
                a.alert_type == alert_type
                    && a.source == source
                    && a.forecast_type() == forecast_type
                    && a.created_at.date_naive() == day
            })
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn list_recent_alerts(&self, limit: i64) -> Result<Vec<Alert>> {
        let inner = self.inner.read();
        let mut alerts = inner.alerts.clone();
        alerts.sort_by_key(|a| std::cmp::Reverse(a.created_at));
        alerts.truncate(limit as usize);
        Ok(alerts)
    }

    async fn insert_incident(&self, incident: &Incident) -> Result<()> {
        self.inner.write().incidents.push(incident.clone());
        Ok(())
    }

    async fn update_incident(&self, incident: &Incident) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.incidents.iter_mut().find(|i| i.id == incident.id) {
            *existing = incident.clone();
        }
        Ok(())
    }

    async fn get_incident(&self, id: Uuid) -> Result<Option<Incident>> {
        let inner = self.inner.read();
        Ok(inner.incidents.iter().find(|i| i.id == id).cloned())
    }

    async fn find_open_incident(&self, source: &str) -> Result<Option<Incident>> {
        let inner = self.inner.read();
        Ok(inner
            .incidents
            .iter()
            .filter(|i| i.source == source && !i.status.is_resolved())
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn list_open_incidents(&self, limit: i64) -> Result<Vec<Incident>> {
        let inner = self.inner.read();
        let mut incidents: Vec<_> = inner
            .incidents
            .iter()
            .filter(|i| !i.status.is_resolved())
            .cloned()
            .collect();
        incidents.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        incidents.truncate(limit as usize);
        Ok(incidents)
    }

    async fn find_runbook(&self, source: &str) -> Result<Option<Runbook>> {
        let inner = self.inner.read();
        Ok(inner
            .runbooks
            .iter()
            .find(|r| r.source == source && r.active)
            .cloned())
    }

    async fn insert_runbook(&self, runbook: &Runbook) -> Result<()> {
        self.inner.write().runbooks.push(runbook.clone());
        Ok(())
    }

    async fn insert_scan(&self, scan: &ForecastScan) -> Result<()> {
        self.inner.write().scans.push(scan.clone());
        Ok(())
    }

    async fn latest_scan(&self) -> Result<Option<ForecastScan>> {
        let inner = self.inner.read();
        Ok(inner.scans.iter().max_by_key(|s| s.created_at).cloned())
    }
}

/// Convert EventOutcome to its store string
fn outcome_to_str(outcome: EventOutcome) -> &'static str {
    match outcome {
        EventOutcome::Success => "success",
        EventOutcome::Failure => "failure",
        EventOutcome::Timeout => "timeout",
    }
}

fn alert_severity_to_str(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Info => "info",
        AlertSeverity::Warning => "warning",
        AlertSeverity::Error => "error",
        AlertSeverity::Critical => "critical",
    }
}

fn alert_severity_from_str(s: &str) -> AlertSeverity {
    match s {
        "warning" => AlertSeverity::Warning,
        "error" => AlertSeverity::Error,
        "critical" => AlertSeverity::Critical,
        _ => AlertSeverity::Info,
    }
}

fn incident_status_to_str(status: IncidentStatus) -> &'static str {
    match status {
        IncidentStatus::Open => "open",
        IncidentStatus::Investigating => "investigating",
        IncidentStatus::Monitoring => "monitoring",
        IncidentStatus::Resolved => "resolved",
    }
}

fn incident_status_from_str(s: &str) -> IncidentStatus {
    match s {
        "investigating" => IncidentStatus::Investigating,
        "monitoring" => IncidentStatus::Monitoring,
        "resolved" => IncidentStatus::Resolved,
        _ => IncidentStatus::Open,
    }
}

fn incident_severity_to_str(severity: IncidentSeverity) -> &'static str {
    match severity {
        IncidentSeverity::Info => "info",
        IncidentSeverity::Warning => "warning",
        IncidentSeverity::Critical => "critical",
    }
}

fn incident_severity_from_str(s: &str) -> IncidentSeverity {
    match s {
        "warning" => IncidentSeverity::Warning,
        "critical" => IncidentSeverity::Critical,
        _ => IncidentSeverity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertSeverity;
    use serde_json::json;

    fn alert_on(day: &str, alert_type: &str, source: &str, forecast_type: Option<&str>) -> Alert {
        let created_at: DateTime<Utc> = format!("{}T10:00:00Z", day).parse().unwrap();
        let meta = match forecast_type {
            Some(ft) => json!({ "forecast_type": ft }),
            None => json!({}),
        };
        Alert {
            id: Uuid::new_v4(),
            alert_type: alert_type.to_string(),
            severity: AlertSeverity::Warning,
            message: "test".to_string(),
            source: source.to_string(),
            meta,
            created_at,
        }
    }

    #[tokio::test]
    async fn find_alert_for_day_matches_type_and_forecast_type() {
        let store = MemoryStore::new();
        store
            .insert_alert(&alert_on(
                "2026-08-20",
                "predictive_capacity",
                "capacity",
                Some("utilization"),
            ))
            .await
            .unwrap();

        let day: NaiveDate = "2026-08-20".parse().unwrap();
        let hit = store
            .find_alert_for_day("predictive_capacity", "capacity", Some("utilization"), day)
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = store
            .find_alert_for_day("predictive_capacity", "capacity", Some("mrr_trend"), day)
            .await
            .unwrap();
        assert!(miss.is_none());

        let other_day: NaiveDate = "2026-08-21".parse().unwrap();
        let miss = store
            .find_alert_for_day("predictive_capacity", "capacity", Some("utilization"), other_day)
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn find_alert_for_day_discriminates_by_source() {
        let store = MemoryStore::new();
        store
            .insert_alert(&alert_on("2026-08-20", "slo_violation", "api", None))
            .await
            .unwrap();

        let day: NaiveDate = "2026-08-20".parse().unwrap();
        let hit = store
            .find_alert_for_day("slo_violation", "api", None, day)
            .await
            .unwrap();
        assert!(hit.is_some());

        // Same type and day for a different service is a different key
        let miss = store
            .find_alert_for_day("slo_violation", "mailer", None, day)
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn open_incident_lookup_ignores_resolved() {
        let store = MemoryStore::new();
        let mut incident = Incident {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            status: IncidentStatus::Resolved,
            severity: IncidentSeverity::Warning,
            source: "stripe-webhooks".to_string(),
            related_alert_ids: vec![],
            timeline: vec![],
            runbook_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.insert_incident(&incident).await.unwrap();
        assert!(store
            .find_open_incident("stripe-webhooks")
            .await
            .unwrap()
            .is_none());

        incident.id = Uuid::new_v4();
        incident.status = IncidentStatus::Monitoring;
        store.insert_incident(&incident).await.unwrap();
        assert!(store
            .find_open_incident("stripe-webhooks")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn event_counting_applies_bad_event_rule() {
        let store = MemoryStore::new();
        let events = vec![
            RawEvent::new("api", EventOutcome::Success),
            RawEvent::new("api", EventOutcome::Failure),
            RawEvent::new("api", EventOutcome::Timeout),
            RawEvent::new("other", EventOutcome::Failure),
        ];
        store.insert_events(&events).await.unwrap();

        let since = Utc::now() - chrono::Duration::days(1);
        let counts = store
            .count_events("api", since, BadEventRule::Failures)
            .await
            .unwrap();
        assert_eq!(counts.total_events, 3);
        assert_eq!(counts.bad_events, 1);

        let counts = store
            .count_events("api", since, BadEventRule::FailuresOrTimeouts)
            .await
            .unwrap();
        assert_eq!(counts.bad_events, 2);
    }
}
