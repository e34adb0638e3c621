//! Incident correlation
//!
//! Groups alerts into incidents by source. The correlator only ever
//! opens incidents on its own; investigating, monitoring, and resolved
//! are reached through external transitions. At most one non-resolved
//! incident exists per source, via a check-then-act lookup (duplicate
//! creation under true concurrency is accepted at this alert volume).

use crate::error::{AppError, Result};
use crate::models::{
    Alert, AlertSeverity, Incident, IncidentSeverity, IncidentStatus, TimelineEvent,
    TimelineEventType,
};
use crate::store::OpsStore;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Most-recent timeline entries kept per incident; older entries are
/// evicted first. Bounds storage, not correctness-critical.
pub const TIMELINE_CAP: usize = 50;

/// Creates and updates incidents against the store
pub struct IncidentCorrelator {
    store: Arc<dyn OpsStore>,
}

impl IncidentCorrelator {
    pub fn new(store: Arc<dyn OpsStore>) -> Self {
        Self { store }
    }

    /// Route an alert to its incident: append to the open incident for
    /// the alert's source, or open a new one when none exists.
    pub async fn correlate_alert(&self, alert: &Alert) -> Result<Incident> {
        match self.find_open_incident_by_source(&alert.source).await? {
            Some(incident) => self.append_alert(incident, alert).await,
            None => self.create_incident_from_alert(alert).await,
        }
    }

    /// Most recently created non-resolved incident for a source
    pub async fn find_open_incident_by_source(&self, source: &str) -> Result<Option<Incident>> {
        self.store.find_open_incident(source).await
    }

    /// Open a new incident seeded from an alert. Runbook attachment is
    /// attempted afterwards, best-effort: its failure never fails
    /// incident creation.
    pub async fn create_incident_from_alert(&self, alert: &Alert) -> Result<Incident> {
        let severity = map_severity(alert.severity);
        let now = Utc::now();

        let incident = Incident {
            id: Uuid::new_v4(),
            title: incident_title(alert, severity),
            status: IncidentStatus::Open,
            severity,
            source: alert.source.clone(),
            related_alert_ids: vec![alert.id],
            timeline: vec![alert_event(alert)],
            runbook_id: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_incident(&incident).await?;
        info!(
            incident_id = %incident.id,
            source = %incident.source,
            severity = ?incident.severity,
            "Incident opened"
        );

        self.attach_runbook_if_exists(incident.id, &incident.source)
            .await;

        // Reflect a successful attachment in the returned incident
        if let Ok(Some(updated)) = self.store.get_incident(incident.id).await {
            return Ok(updated);
        }
        Ok(incident)
    }

    async fn append_alert(&self, mut incident: Incident, alert: &Alert) -> Result<Incident> {
        if !incident.related_alert_ids.contains(&alert.id) {
            incident.related_alert_ids.push(alert.id);
        }
        push_capped(&mut incident.timeline, alert_event(alert));
        incident.updated_at = Utc::now();

        self.store.update_incident(&incident).await?;
        debug!(
            incident_id = %incident.id,
            alert_id = %alert.id,
            "Alert appended to open incident"
        );
        Ok(incident)
    }

    /// Append a timeline event. A missing incident is logged and
    /// ignored; this runs from best-effort background paths.
    pub async fn append_incident_event(&self, incident_id: Uuid, event: TimelineEvent) -> Result<()> {
        let Some(mut incident) = self.store.get_incident(incident_id).await? else {
            warn!(incident_id = %incident_id, "Cannot append event: incident not found");
            return Ok(());
        };

        push_capped(&mut incident.timeline, event);
        incident.updated_at = Utc::now();
        self.store.update_incident(&incident).await
    }

    /// Attach the active runbook for a source, at most once per
    /// incident, recorded via a timeline note. No-op when absent or on
    /// any error.
    pub async fn attach_runbook_if_exists(&self, incident_id: Uuid, source: &str) {
        let runbook = match self.store.find_runbook(source).await {
            Ok(Some(runbook)) => runbook,
            Ok(None) => {
                debug!(source = %source, "No active runbook for source");
                return;
            }
            Err(e) => {
                warn!(error = %e, source = %source, "Runbook lookup failed");
                return;
            }
        };

        let incident = match self.store.get_incident(incident_id).await {
            Ok(Some(incident)) => incident,
            Ok(None) => {
                warn!(incident_id = %incident_id, "Cannot attach runbook: incident not found");
                return;
            }
            Err(e) => {
                warn!(error = %e, incident_id = %incident_id, "Incident fetch failed");
                return;
            }
        };

        if incident.runbook_id.is_some() {
            return;
        }

        let mut incident = incident;
        incident.runbook_id = Some(runbook.id);
        push_capped(
            &mut incident.timeline,
            TimelineEvent {
                timestamp: Utc::now(),
                event_type: TimelineEventType::Note,
                message: format!("Runbook '{}' attached", runbook.name),
                meta: Some(json!({ "runbook_id": runbook.id })),
            },
        );
        incident.updated_at = Utc::now();

        if let Err(e) = self.store.update_incident(&incident).await {
            warn!(error = %e, incident_id = %incident.id, "Runbook attachment write failed");
        }
    }

    /// Externally triggered status transition. Resolved is terminal.
    pub async fn transition_status(
        &self,
        incident_id: Uuid,
        status: IncidentStatus,
    ) -> Result<Incident> {
        let mut incident = self
            .store
            .get_incident(incident_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("incident {}", incident_id)))?;

        if incident.status.is_resolved() {
            return Err(AppError::InvalidRequest(
                "incident is resolved; resolved is terminal".to_string(),
            ));
        }

        incident.status = status;
        push_capped(
            &mut incident.timeline,
            TimelineEvent::now(
                TimelineEventType::Auto,
                format!("Status changed to {}", status_label(status)),
            ),
        );
        incident.updated_at = Utc::now();

        self.store.update_incident(&incident).await?;
        info!(incident_id = %incident.id, status = ?incident.status, "Incident status changed");
        Ok(incident)
    }
}

/// Append and evict oldest entries beyond the cap
fn push_capped(timeline: &mut Vec<TimelineEvent>, event: TimelineEvent) {
    timeline.push(event);
    if timeline.len() > TIMELINE_CAP {
        let excess = timeline.len() - TIMELINE_CAP;
        timeline.drain(0..excess);
    }
}

fn alert_event(alert: &Alert) -> TimelineEvent {
    TimelineEvent {
        timestamp: Utc::now(),
        event_type: TimelineEventType::Alert,
        message: alert.message.clone(),
        meta: Some(json!({ "alert_id": alert.id, "alert_type": alert.alert_type })),
    }
}

fn map_severity(severity: AlertSeverity) -> IncidentSeverity {
    match severity {
        AlertSeverity::Critical | AlertSeverity::Error => IncidentSeverity::Critical,
        AlertSeverity::Warning => IncidentSeverity::Warning,
        AlertSeverity::Info => IncidentSeverity::Info,
    }
}

fn incident_title(alert: &Alert, severity: IncidentSeverity) -> String {
    format!(
        "{} on {} ({})",
        alert.alert_type.replace('_', " "),
        alert.source,
        severity_label(severity)
    )
}

fn severity_label(severity: IncidentSeverity) -> &'static str {
    match severity {
        IncidentSeverity::Info => "info",
        IncidentSeverity::Warning => "warning",
        IncidentSeverity::Critical => "critical",
    }
}

fn status_label(status: IncidentStatus) -> &'static str {
    match status {
        IncidentStatus::Open => "open",
        IncidentStatus::Investigating => "investigating",
        IncidentStatus::Monitoring => "monitoring",
        IncidentStatus::Resolved => "resolved",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Runbook;
    use crate::store::MemoryStore;

    fn alert(source: &str, severity: AlertSeverity) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            alert_type: "slo_violation".to_string(),
            severity,
            message: "SLO violating".to_string(),
            source: source.to_string(),
            meta: json!({}),
            created_at: Utc::now(),
        }
    }

    fn correlator() -> (Arc<MemoryStore>, IncidentCorrelator) {
        let store = Arc::new(MemoryStore::new());
        let correlator = IncidentCorrelator::new(store.clone());
        (store, correlator)
    }

    #[tokio::test]
    async fn same_source_alerts_share_one_incident() {
        let (store, correlator) = correlator();

        let first = correlator
            .correlate_alert(&alert("stripe-webhooks", AlertSeverity::Error))
            .await
            .unwrap();
        let second = correlator
            .correlate_alert(&alert("stripe-webhooks", AlertSeverity::Error))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.timeline.len(), 2);
        assert_eq!(second.related_alert_ids.len(), 2);
        assert_eq!(store.list_open_incidents(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn different_sources_open_separate_incidents() {
        let (store, correlator) = correlator();

        correlator
            .correlate_alert(&alert("stripe-webhooks", AlertSeverity::Warning))
            .await
            .unwrap();
        correlator
            .correlate_alert(&alert("mailer", AlertSeverity::Warning))
            .await
            .unwrap();

        assert_eq!(store.list_open_incidents(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn severity_mapping() {
        let (_, correlator) = correlator();

        let critical = correlator
            .create_incident_from_alert(&alert("a", AlertSeverity::Critical))
            .await
            .unwrap();
        assert_eq!(critical.severity, IncidentSeverity::Critical);

        let error = correlator
            .create_incident_from_alert(&alert("b", AlertSeverity::Error))
            .await
            .unwrap();
        assert_eq!(error.severity, IncidentSeverity::Critical);

        let warning = correlator
            .create_incident_from_alert(&alert("c", AlertSeverity::Warning))
            .await
            .unwrap();
        assert_eq!(warning.severity, IncidentSeverity::Warning);

        let info = correlator
            .create_incident_from_alert(&alert("d", AlertSeverity::Info))
            .await
            .unwrap();
        assert_eq!(info.severity, IncidentSeverity::Info);
    }

    #[tokio::test]
    async fn timeline_caps_at_fifty_entries() {
        let (store, correlator) = correlator();

        let incident = correlator
            .create_incident_from_alert(&alert("api", AlertSeverity::Warning))
            .await
            .unwrap();

        for i in 0..50 {
            correlator
                .append_incident_event(
                    incident.id,
                    TimelineEvent::now(TimelineEventType::Note, format!("note {}", i)),
                )
                .await
                .unwrap();
        }

        let stored = store.get_incident(incident.id).await.unwrap().unwrap();
        assert_eq!(stored.timeline.len(), TIMELINE_CAP);
        // The seeded alert entry was the oldest and is evicted
        assert_eq!(stored.timeline[0].message, "note 0");
        assert_eq!(stored.timeline[49].message, "note 49");
    }

    #[tokio::test]
    async fn append_to_missing_incident_is_ignored() {
        let (_, correlator) = correlator();
        correlator
            .append_incident_event(
                Uuid::new_v4(),
                TimelineEvent::now(TimelineEventType::Note, "orphan"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn runbook_attached_once_with_note() {
        let (store, correlator) = correlator();
        let runbook = Runbook {
            id: Uuid::new_v4(),
            name: "Webhook replay".to_string(),
            source: "stripe-webhooks".to_string(),
            steps: vec!["check dashboard".to_string(), "replay failed".to_string()],
            active: true,
        };
        store.insert_runbook(&runbook).await.unwrap();

        let incident = correlator
            .correlate_alert(&alert("stripe-webhooks", AlertSeverity::Error))
            .await
            .unwrap();

        assert_eq!(incident.runbook_id, Some(runbook.id));
        assert_eq!(incident.timeline.len(), 2);
        assert!(incident.timeline[1].message.contains("Webhook replay"));

        // A second alert does not re-attach
        let incident = correlator
            .correlate_alert(&alert("stripe-webhooks", AlertSeverity::Error))
            .await
            .unwrap();
        let notes = incident
            .timeline
            .iter()
            .filter(|e| e.event_type == TimelineEventType::Note)
            .count();
        assert_eq!(notes, 1);
    }

    #[tokio::test]
    async fn inactive_runbook_is_not_attached() {
        let (store, correlator) = correlator();
        store
            .insert_runbook(&Runbook {
                id: Uuid::new_v4(),
                name: "Stale".to_string(),
                source: "api".to_string(),
                steps: vec![],
                active: false,
            })
            .await
            .unwrap();

        let incident = correlator
            .correlate_alert(&alert("api", AlertSeverity::Warning))
            .await
            .unwrap();
        assert!(incident.runbook_id.is_none());
    }

    #[tokio::test]
    async fn resolved_is_terminal_and_frees_the_source() {
        let (store, correlator) = correlator();

        let incident = correlator
            .correlate_alert(&alert("api", AlertSeverity::Warning))
            .await
            .unwrap();

        correlator
            .transition_status(incident.id, IncidentStatus::Investigating)
            .await
            .unwrap();
        correlator
            .transition_status(incident.id, IncidentStatus::Resolved)
            .await
            .unwrap();

        let err = correlator
            .transition_status(incident.id, IncidentStatus::Open)
            .await;
        assert!(err.is_err());

        // A new alert for the source opens a fresh incident
        let fresh = correlator
            .correlate_alert(&alert("api", AlertSeverity::Warning))
            .await
            .unwrap();
        assert_ne!(fresh.id, incident.id);
        assert_eq!(store.list_open_incidents(10).await.unwrap().len(), 1);
    }
}
