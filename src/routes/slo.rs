//! SLO burn-rate API endpoint

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::error::Result;
use crate::models::SloBurn;
use crate::slo;
use crate::state::AppState;

/// Response for the burns endpoint
#[derive(Debug, Serialize)]
pub struct BurnsResponse {
    pub computed_at: DateTime<Utc>,
    pub burns: Vec<SloBurn>,
}

/// GET /api/v1/slo/burns
///
/// Computes burn state for every configured SLO, fresh from event
/// counts. A count failure omits that SLO from the response rather
/// than failing the request.
pub async fn get_burns(State(state): State<AppState>) -> Result<Json<BurnsResponse>> {
    let now = Utc::now();
    let mut burns = Vec::with_capacity(state.slos.len());

    for def in state.slos.iter() {
        let since = now - def.window.as_duration();
        match state
            .store
            .count_events(&def.service, since, def.bad_events)
            .await
        {
            Ok(counts) => burns.push(slo::compute_burn(def, counts)),
            Err(e) => {
                error!(error = %e, slo_id = %def.id, "SLO event count failed");
            }
        }
    }

    Ok(Json(BurnsResponse {
        computed_at: now,
        burns,
    }))
}
