//! Background tasks

pub mod flush;
pub mod scan;
