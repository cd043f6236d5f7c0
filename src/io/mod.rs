//! Input/output helpers.
//!
//! - CSV ingest of observation-store exports (`ingest`)
//! - forecast exports (JSON/CSV) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
