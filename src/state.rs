//! Application state shared across handlers

use crate::buffer::EventBuffer;
use crate::models::{CapacitySettings, SloDefinition};
use crate::routes::metrics::Metrics;
use crate::rules::RuleEngine;
use crate::store::OpsStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Store backend
    pub store: Arc<dyn OpsStore>,
    /// Lock-free buffer for raw event ingestion
    pub event_buffer: EventBuffer,
    /// Static SLO definitions for this deployment
    pub slos: Arc<Vec<SloDefinition>>,
    /// Capacity limits the forecaster projects against
    pub capacity: CapacitySettings,
    /// Alert rule engine
    pub rules: Arc<RuleEngine>,
    /// Application metrics for Prometheus
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        store: Arc<dyn OpsStore>,
        buffer_capacity: usize,
        slos: Vec<SloDefinition>,
        capacity: CapacitySettings,
        rules: RuleEngine,
    ) -> Self {
        Self {
            store,
            event_buffer: EventBuffer::new(buffer_capacity),
            slos: Arc::new(slos),
            capacity,
            rules: Arc::new(rules),
            metrics: Arc::new(Metrics::new()),
        }
    }
}
