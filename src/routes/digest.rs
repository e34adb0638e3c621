//! Ops digest API endpoint

use axum::{extract::State, Json};

use crate::digest::DigestBuilder;
use crate::models::OpsDigest;
use crate::state::AppState;

/// GET /api/v1/digest
///
/// Builds the consolidated ops digest. Sections degrade independently
/// on store failures, so this endpoint itself never errors on them.
pub async fn get_digest(State(state): State<AppState>) -> Json<OpsDigest> {
    let builder = DigestBuilder::new(state.store.clone(), state.slos.clone());
    Json(builder.build().await)
}
