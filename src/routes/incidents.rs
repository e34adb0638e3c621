//! Incident API endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::incidents::IncidentCorrelator;
use crate::models::{Incident, IncidentStatus, TimelineEvent, TimelineEventType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of incidents to return (default: 20, max: 100)
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub count: usize,
    pub incidents: Vec<Incident>,
}

/// GET /api/v1/incidents
///
/// Returns open (non-resolved) incidents, newest first.
pub async fn list_incidents(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    let limit = params.limit.unwrap_or(20).min(100);
    let incidents = state.store.list_open_incidents(limit).await?;

    Ok(Json(ListResponse {
        count: incidents.len(),
        incidents,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: IncidentStatus,
}

/// POST /api/v1/incidents/:id/status
///
/// Externally triggered status transition. Resolved is terminal;
/// transitioning a resolved incident is a 400.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Incident>> {
    let correlator = IncidentCorrelator::new(state.store.clone());
    let incident = correlator.transition_status(id, payload.status).await?;
    Ok(Json(incident))
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub message: String,
    /// "note" (default) or "action"
    pub event_type: Option<TimelineEventType>,
}

/// POST /api/v1/incidents/:id/events
///
/// Appends an operator note or action record to the incident timeline.
pub async fn append_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NoteRequest>,
) -> Result<Json<Incident>> {
    let correlator = IncidentCorrelator::new(state.store.clone());
    let event = TimelineEvent::now(
        payload.event_type.unwrap_or(TimelineEventType::Note),
        payload.message,
    );
    correlator.append_incident_event(id, event).await?;

    let incident = state
        .store
        .get_incident(id)
        .await?
        .ok_or_else(|| crate::error::AppError::NotFound(format!("incident {}", id)))?;
    Ok(Json(incident))
}
