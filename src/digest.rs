//! Ops digest aggregation
//!
//! Composes SLO burns, open incidents, and the latest capacity scan
//! into one rollup. Each section is fetched independently and a failure
//! degrades only that section to empty/absent; an incident-store outage
//! must not prevent SLO reporting.

use crate::models::{
    CapacityStatus, CapacitySummary, DigestIncident, ForecastRisk, OpsDigest, SloBurn,
    SloDefinition,
};
use crate::slo;
use crate::store::OpsStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, warn};

/// Open incidents shown in the digest
const DIGEST_INCIDENT_LIMIT: i64 = 10;

/// Builds consolidated digests from the store
pub struct DigestBuilder {
    store: Arc<dyn OpsStore>,
    slos: Arc<Vec<SloDefinition>>,
}

impl DigestBuilder {
    pub fn new(store: Arc<dyn OpsStore>, slos: Arc<Vec<SloDefinition>>) -> Self {
        Self { store, slos }
    }

    /// Build the digest. Never fails; sections degrade independently.
    pub async fn build(&self) -> OpsDigest {
        let now = Utc::now();

        OpsDigest {
            generated_at: now,
            slo: self.slo_section().await,
            incidents: self.incident_section().await,
            capacity: self.capacity_section().await,
        }
    }

    async fn slo_section(&self) -> Vec<SloBurn> {
        let now = Utc::now();
        let mut burns = Vec::with_capacity(self.slos.len());

        for def in self.slos.iter() {
            let since = now - def.window.as_duration();
            match self.store.count_events(&def.service, since, def.bad_events).await {
                Ok(counts) => burns.push(slo::compute_burn(def, counts)),
                Err(e) => {
                    error!(error = %e, slo_id = %def.id, "SLO event count failed, omitting from digest");
                }
            }
        }

        burns
    }

    async fn incident_section(&self) -> Vec<DigestIncident> {
        let now = Utc::now();

        match self.store.list_open_incidents(DIGEST_INCIDENT_LIMIT).await {
            Ok(incidents) => incidents
                .into_iter()
                .map(|i| DigestIncident {
                    age_hours: (now - i.created_at).num_minutes() as f64 / 60.0,
                    id: i.id,
                    title: i.title,
                    status: i.status,
                    severity: i.severity,
                    source: i.source,
                })
                .collect(),
            Err(e) => {
                error!(error = %e, "Incident fetch failed, digest incidents section empty");
                Vec::new()
            }
        }
    }

    async fn capacity_section(&self) -> Option<CapacitySummary> {
        let scan = match self.store.latest_scan().await {
            Ok(Some(scan)) => scan,
            Ok(None) => return None,
            Err(e) => {
                error!(error = %e, "Scan fetch failed, digest capacity section absent");
                return None;
            }
        };

        // Failed and insufficient-data scans carry an empty forecast;
        // showing it as healthy would be misleading
        if !scan.ok || scan.error.is_some() {
            warn!(scan_id = %scan.id, "Latest scan has no usable forecast");
            return None;
        }

        let f = &scan.forecast;
        Some(CapacitySummary {
            utilization_percent: f.current_utilization,
            projected_3day_utilization: f.projected_3day_utilization,
            risk_level: f.risk_level,
            status: capacity_status(f.current_utilization, f.risk_level),
            scanned_at: scan.created_at,
        })
    }
}

/// Overall capacity classification from current utilization and risk
fn capacity_status(utilization: f64, risk: ForecastRisk) -> CapacityStatus {
    if utilization > 90.0 || risk >= ForecastRisk::High {
        CapacityStatus::Critical
    } else if utilization > 75.0 || risk == ForecastRisk::Medium {
        CapacityStatus::Warning
    } else {
        CapacityStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::models::{
        Alert, AlertSeverity, BadEventRule, CapacitySnapshot, EventCounts, EventOutcome,
        ForecastScan, Incident, PredictiveForecast, RawEvent, Runbook, SloWindow,
    };
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};
    use uuid::Uuid;

    fn slos() -> Arc<Vec<SloDefinition>> {
        Arc::new(vec![SloDefinition {
            id: "api-availability".to_string(),
            service: "api".to_string(),
            target_percent: 99.5,
            window: SloWindow::Days7,
            bad_events: BadEventRule::Failures,
        }])
    }

    fn good_scan(utilization: f64, risk: ForecastRisk) -> ForecastScan {
        ForecastScan {
            id: Uuid::new_v4(),
            ok: true,
            error: None,
            forecast: PredictiveForecast {
                current_utilization: utilization,
                risk_level: risk,
                ..PredictiveForecast::empty()
            },
            snapshot_count: 5,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn digest_composes_all_sections() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_events(&[
                RawEvent::new("api", EventOutcome::Success),
                RawEvent::new("api", EventOutcome::Failure),
            ])
            .await
            .unwrap();
        store.insert_scan(&good_scan(80.0, ForecastRisk::Medium)).await.unwrap();

        let correlator = crate::incidents::IncidentCorrelator::new(store.clone());
        correlator
            .create_incident_from_alert(&Alert {
                id: Uuid::new_v4(),
                alert_type: "slo_violation".to_string(),
                severity: AlertSeverity::Error,
                message: "m".to_string(),
                source: "api".to_string(),
                meta: serde_json::json!({}),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let digest = DigestBuilder::new(store, slos()).build().await;

        assert_eq!(digest.slo.len(), 1);
        assert_eq!(digest.slo[0].total_events, 2);
        assert_eq!(digest.incidents.len(), 1);
        let capacity = digest.capacity.unwrap();
        assert_eq!(capacity.status, CapacityStatus::Warning);
    }

    #[tokio::test]
    async fn unusable_scan_leaves_capacity_absent() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_scan(&ForecastScan {
                id: Uuid::new_v4(),
                ok: true,
                error: Some("insufficient data".to_string()),
                forecast: PredictiveForecast::empty(),
                snapshot_count: 1,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let digest = DigestBuilder::new(store, slos()).build().await;
        assert!(digest.capacity.is_none());
    }

    #[test]
    fn capacity_status_thresholds() {
        assert_eq!(
            capacity_status(95.0, ForecastRisk::Low),
            CapacityStatus::Critical
        );
        assert_eq!(
            capacity_status(50.0, ForecastRisk::High),
            CapacityStatus::Critical
        );
        assert_eq!(
            capacity_status(50.0, ForecastRisk::Critical),
            CapacityStatus::Critical
        );
        assert_eq!(
            capacity_status(80.0, ForecastRisk::Low),
            CapacityStatus::Warning
        );
        assert_eq!(
            capacity_status(50.0, ForecastRisk::Medium),
            CapacityStatus::Warning
        );
        assert_eq!(
            capacity_status(50.0, ForecastRisk::Low),
            CapacityStatus::Healthy
        );
    }

    /// Store whose incident reads fail; everything else delegates
    struct BrokenIncidentStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl OpsStore for BrokenIncidentStore {
        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }

        async fn insert_events(&self, events: &[RawEvent]) -> Result<usize> {
            self.inner.insert_events(events).await
        }

        async fn count_events(
            &self,
            service: &str,
            since: DateTime<Utc>,
            rule: BadEventRule,
        ) -> Result<EventCounts> {
            self.inner.count_events(service, since, rule).await
        }

        async fn insert_snapshot(&self, snapshot: &CapacitySnapshot) -> Result<()> {
            self.inner.insert_snapshot(snapshot).await
        }

        async fn list_recent_snapshots(&self, n: i64) -> Result<Vec<CapacitySnapshot>> {
            self.inner.list_recent_snapshots(n).await
        }

        async fn insert_alert(&self, alert: &Alert) -> Result<()> {
            self.inner.insert_alert(alert).await
        }

        async fn find_alert_for_day(
            &self,
            alert_type: &str,
            source: &str,
            forecast_type: Option<&str>,
            day: NaiveDate,
        ) -> Result<Option<Alert>> {
            self.inner
                .find_alert_for_day(alert_type, source, forecast_type, day)
                .await
        }

        async fn list_recent_alerts(&self, limit: i64) -> Result<Vec<Alert>> {
            self.inner.list_recent_alerts(limit).await
        }

        async fn insert_incident(&self, incident: &Incident) -> Result<()> {
            self.inner.insert_incident(incident).await
        }

        async fn update_incident(&self, incident: &Incident) -> Result<()> {
            self.inner.update_incident(incident).await
        }

        async fn get_incident(&self, id: Uuid) -> Result<Option<Incident>> {
            self.inner.get_incident(id).await
        }

        async fn find_open_incident(&self, source: &str) -> Result<Option<Incident>> {
            self.inner.find_open_incident(source).await
        }

        async fn list_open_incidents(&self, _limit: i64) -> Result<Vec<Incident>> {
            Err(AppError::StoreError("incident store unavailable".to_string()))
        }

        async fn find_runbook(&self, source: &str) -> Result<Option<Runbook>> {
            self.inner.find_runbook(source).await
        }

        async fn insert_runbook(&self, runbook: &Runbook) -> Result<()> {
            self.inner.insert_runbook(runbook).await
        }

        async fn insert_scan(&self, scan: &ForecastScan) -> Result<()> {
            self.inner.insert_scan(scan).await
        }

        async fn latest_scan(&self) -> Result<Option<ForecastScan>> {
            self.inner.latest_scan().await
        }
    }

    #[tokio::test]
    async fn incident_store_outage_degrades_only_that_section() {
        let store = Arc::new(BrokenIncidentStore {
            inner: MemoryStore::new(),
        });
        store
            .insert_events(&[RawEvent::new("api", EventOutcome::Success)])
            .await
            .unwrap();
        store.insert_scan(&good_scan(40.0, ForecastRisk::Low)).await.unwrap();

        let digest = DigestBuilder::new(store, slos()).build().await;

        assert_eq!(digest.slo.len(), 1);
        assert!(digest.incidents.is_empty());
        let capacity = digest.capacity.unwrap();
        assert_eq!(capacity.status, CapacityStatus::Healthy);
    }
}
