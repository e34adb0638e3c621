//! OpsPulse library exports

pub mod alerts;
pub mod buffer;
pub mod config;
pub mod digest;
pub mod error;
pub mod forecast;
pub mod incidents;
pub mod models;
pub mod routes;
pub mod rules;
pub mod scan;
pub mod slo;
pub mod state;
pub mod store;
pub mod tasks;
