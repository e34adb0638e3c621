//! Ingestion endpoints for raw events and capacity snapshots

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CapacitySnapshot, IngestRequest, IngestResponse};
use crate::state::AppState;

/// POST /api/v1/events/ingest
///
/// Ingests a batch of raw operational events into the buffer.
/// Returns 202 Accepted with counts of ingested and dropped events.
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let total = payload.events.len();
    let mut ingested = 0;
    let mut dropped = 0;

    for event in payload.events {
        match state.event_buffer.try_push(event) {
            Ok(()) => ingested += 1,
            Err(_dropped_event) => {
                dropped += 1;
            }
        }
    }

    state.metrics.inc_ingested(ingested as u64);
    state.metrics.inc_dropped(dropped as u64);

    if dropped > 0 {
        warn!(
            total = total,
            ingested = ingested,
            dropped = dropped,
            "Buffer full, some events dropped"
        );
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse { ingested, dropped }),
    ))
}

/// Request body for recording a capacity snapshot
#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub date: chrono::NaiveDate,
    pub total_hours: f64,
    pub total_mrr: f64,
    pub project_count: i64,
    pub risk_label: Option<String>,
}

/// POST /api/v1/snapshots
///
/// Records a capacity snapshot pushed by the external scheduler.
pub async fn record_snapshot(
    State(state): State<AppState>,
    Json(payload): Json<SnapshotRequest>,
) -> Result<(StatusCode, Json<CapacitySnapshot>)> {
    let utilization_percent = if state.capacity.max_hours > 0.0 {
        payload.total_hours / state.capacity.max_hours * 100.0
    } else {
        0.0
    };

    let snapshot = CapacitySnapshot {
        id: Uuid::new_v4(),
        date: payload.date,
        total_hours: payload.total_hours,
        total_mrr: payload.total_mrr,
        project_count: payload.project_count,
        utilization_percent,
        risk_label: payload.risk_label.unwrap_or_else(|| "unknown".to_string()),
        created_at: Utc::now(),
    };

    state.store.insert_snapshot(&snapshot).await?;
    info!(
        snapshot_id = %snapshot.id,
        date = %snapshot.date,
        total_hours = snapshot.total_hours,
        "Capacity snapshot recorded"
    );

    Ok((StatusCode::CREATED, Json(snapshot)))
}
