//! HTTP route handlers

pub mod digest;
pub mod forecast;
pub mod health;
pub mod incidents;
pub mod ingest;
pub mod metrics;
pub mod slo;
