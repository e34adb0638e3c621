//! One end-to-end scan of the reliability pipeline
//!
//! snapshots -> forecast -> persisted scan record -> candidate alerts
//! (day-idempotent) -> rule engine -> incident correlation. Invoked by
//! the background scan task and the on-demand scan endpoint. Stateless:
//! everything lives in the store.

use crate::alerts::{self, AlertCreation, CandidateAlert};
use crate::error::Result;
use crate::forecast::{self, ScanOutcome};
use crate::incidents::IncidentCorrelator;
use crate::models::{
    CapacitySettings, ForecastScan, SloDefinition, TimelineEvent, TimelineEventType,
};
use crate::rules::RuleEngine;
use crate::slo;
use crate::store::OpsStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Snapshots read per scan, newest first from the store
const SNAPSHOT_HISTORY: i64 = 30;

/// Summary of one scan run
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub outcome: ScanOutcome,
    pub alerts_created: usize,
    /// Duplicate-suppressed creations; an idempotence outcome, not a
    /// failure
    pub alerts_skipped: usize,
    pub incidents_touched: usize,
}

/// Run the full pipeline once.
///
/// The scan record is persisted even when the forecast computation
/// fails, for post-mortem audit. Best-effort side paths log and
/// continue; only a snapshot read failure aborts the scan.
pub async fn run_scan(
    store: &Arc<dyn OpsStore>,
    slos: &[SloDefinition],
    settings: &CapacitySettings,
    rules: &RuleEngine,
) -> Result<ScanReport> {
    let mut snapshots = store.list_recent_snapshots(SNAPSHOT_HISTORY).await?;
    // Store returns newest first; the forecaster wants chronological
    snapshots.reverse();

    let outcome = forecast::build_forecast(&snapshots, settings);

    let scan = ForecastScan {
        id: Uuid::new_v4(),
        ok: outcome.ok,
        error: outcome.error.clone(),
        forecast: outcome.forecast.clone(),
        snapshot_count: outcome.snapshot_count,
        created_at: Utc::now(),
    };
    if let Err(e) = store.insert_scan(&scan).await {
        error!(error = %e, scan_id = %scan.id, "Failed to persist scan record");
    }

    if let Some(err) = &outcome.error {
        if outcome.ok {
            info!(scan_id = %scan.id, error = %err, "Scan completed without forecast");
        } else {
            error!(scan_id = %scan.id, error = %err, "Forecast computation failed");
        }
    }

    let mut candidates = alerts::candidates_for_forecast(&outcome);
    candidates.extend(slo_candidates(store, slos).await);

    let mut report = ScanReport {
        scan_id: scan.id,
        outcome,
        alerts_created: 0,
        alerts_skipped: 0,
        incidents_touched: 0,
    };

    let correlator = IncidentCorrelator::new(store.clone());
    for candidate in candidates {
        match alerts::create_alert_if_new(store.as_ref(), candidate).await {
            Ok(AlertCreation::Created(alert)) => {
                report.alerts_created += 1;

                let actions = rules.actions_for(&alert);
                info!(
                    alert_id = %alert.id,
                    actions = ?actions,
                    "Actions decided for alert"
                );

                match correlator.correlate_alert(&alert).await {
                    Ok(incident) => {
                        report.incidents_touched += 1;
                        if !actions.is_empty() {
                            record_actions(&correlator, incident.id, &actions).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, alert_id = %alert.id, "Incident correlation failed");
                    }
                }
            }
            Ok(AlertCreation::Skipped) => {
                report.alerts_skipped += 1;
            }
            Err(e) => {
                error!(error = %e, "Alert creation failed");
            }
        }
    }

    info!(
        scan_id = %report.scan_id,
        created = report.alerts_created,
        skipped = report.alerts_skipped,
        incidents = report.incidents_touched,
        "Scan finished"
    );

    Ok(report)
}

/// Compute burns for every configured SLO and collect violation
/// candidates. Per-SLO failures are logged and skipped.
async fn slo_candidates(store: &Arc<dyn OpsStore>, slos: &[SloDefinition]) -> Vec<CandidateAlert> {
    let now = Utc::now();
    let mut candidates = Vec::new();

    for def in slos {
        let since = now - def.window.as_duration();
        match store.count_events(&def.service, since, def.bad_events).await {
            Ok(counts) => {
                let burn = slo::compute_burn(def, counts);
                if let Some(candidate) = alerts::candidate_for_burn(&burn) {
                    candidates.push(candidate);
                }
            }
            Err(e) => {
                warn!(error = %e, slo_id = %def.id, "SLO event count failed during scan");
            }
        }
    }

    candidates
}

/// Record the decided action set on the incident timeline, best-effort.
async fn record_actions(
    correlator: &IncidentCorrelator,
    incident_id: Uuid,
    actions: &std::collections::BTreeSet<crate::rules::Action>,
) {
    let labels: Vec<String> = actions
        .iter()
        .map(|a| serde_json::to_value(a).map(|v| v.as_str().unwrap_or_default().to_string()))
        .collect::<std::result::Result<_, _>>()
        .unwrap_or_default();

    let event = TimelineEvent {
        timestamp: Utc::now(),
        event_type: TimelineEventType::Action,
        message: format!("Actions decided: {}", labels.join(", ")),
        meta: Some(serde_json::json!({ "actions": labels })),
    };

    if let Err(e) = correlator.append_incident_event(incident_id, event).await {
        warn!(error = %e, incident_id = %incident_id, "Failed to record actions on timeline");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BadEventRule, CapacitySnapshot, EventOutcome, RawEvent, SloWindow,
    };
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn snapshot(day: i64, hours: f64, mrr: f64) -> CapacitySnapshot {
        let created_at =
            Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap() + Duration::days(day);
        CapacitySnapshot {
            id: Uuid::new_v4(),
            date: created_at.date_naive(),
            total_hours: hours,
            total_mrr: mrr,
            project_count: 5,
            utilization_percent: 0.0,
            risk_label: "low".to_string(),
            created_at,
        }
    }

    fn slos() -> Vec<SloDefinition> {
        vec![SloDefinition {
            id: "api-availability".to_string(),
            service: "api".to_string(),
            target_percent: 99.5,
            window: SloWindow::Days7,
            bad_events: BadEventRule::Failures,
        }]
    }

    fn settings() -> CapacitySettings {
        CapacitySettings {
            max_hours: 200.0,
            ..CapacitySettings::default()
        }
    }

    async fn seed_hot_store(store: &Arc<dyn OpsStore>) {
        // Hours climbing toward the 200h limit, agreeing MRR trend
        for d in 0..7 {
            store
                .insert_snapshot(&snapshot(d, 140.0 + 10.0 * d as f64, 5000.0 + 20.0 * d as f64))
                .await
                .unwrap();
        }
        // 30 failures out of 100 events: violating against 99.5
        let mut events = Vec::new();
        for i in 0..100 {
            let outcome = if i < 30 {
                EventOutcome::Failure
            } else {
                EventOutcome::Success
            };
            events.push(RawEvent::new("api", outcome));
        }
        store.insert_events(&events).await.unwrap();
    }

    #[tokio::test]
    async fn scan_creates_alerts_and_incidents() {
        let store: Arc<dyn OpsStore> = Arc::new(MemoryStore::new());
        seed_hot_store(&store).await;
        let rules = RuleEngine::default();

        let report = run_scan(&store, &slos(), &settings(), &rules).await.unwrap();

        assert!(report.outcome.ok);
        // utilization + days_until_capacity + slo violation
        assert_eq!(report.alerts_created, 3);
        assert_eq!(report.alerts_skipped, 0);
        assert!(report.incidents_touched >= 2);

        // capacity alerts share a source and therefore an incident
        let open = store.list_open_incidents(10).await.unwrap();
        assert_eq!(open.len(), 2);

        // scan record persisted
        assert!(store.latest_scan().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_scan_same_day_is_idempotent() {
        let store: Arc<dyn OpsStore> = Arc::new(MemoryStore::new());
        seed_hot_store(&store).await;
        let rules = RuleEngine::default();

        let first = run_scan(&store, &slos(), &settings(), &rules).await.unwrap();
        let second = run_scan(&store, &slos(), &settings(), &rules).await.unwrap();

        assert_eq!(first.alerts_created, 3);
        assert_eq!(second.alerts_created, 0);
        assert_eq!(second.alerts_skipped, 3);

        // no duplicate incidents either
        let open = store.list_open_incidents(10).await.unwrap();
        assert_eq!(open.len(), 2);
    }

    #[tokio::test]
    async fn scan_with_no_snapshots_still_persists_a_record() {
        let store: Arc<dyn OpsStore> = Arc::new(MemoryStore::new());
        let rules = RuleEngine::default();

        let report = run_scan(&store, &slos(), &settings(), &rules).await.unwrap();

        assert!(report.outcome.ok);
        assert!(report.outcome.error.is_some());
        assert_eq!(report.alerts_created, 0);

        let scan = store.latest_scan().await.unwrap().unwrap();
        assert!(scan.error.is_some());
        assert_eq!(scan.snapshot_count, 0);
    }

    #[tokio::test]
    async fn action_set_recorded_on_incident_timeline() {
        let store: Arc<dyn OpsStore> = Arc::new(MemoryStore::new());
        seed_hot_store(&store).await;
        let rules = RuleEngine::default();

        run_scan(&store, &slos(), &settings(), &rules).await.unwrap();

        let open = store.list_open_incidents(10).await.unwrap();
        let slo_incident = open.iter().find(|i| i.source == "api").unwrap();
        assert!(slo_incident
            .timeline
            .iter()
            .any(|e| e.event_type == TimelineEventType::Action
                && e.message.contains("notify-team")));
    }
}
