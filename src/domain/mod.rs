//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the fixed set of observation streams and the raw `Observation` record
//! - per-source daily series (`DailySeries`)
//! - engine configuration (`EngineConfig` and its sections)
//! - forecast outputs (`ForecastResult`, `ForecastReport`, diagnostics)

pub mod config;
pub mod forecast;
pub mod observation;

pub use config::*;
pub use forecast::*;
pub use observation::*;
