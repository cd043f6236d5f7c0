//! `pump-forecast` library crate.
//!
//! The binary (`pf`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the engine can be embedded by the service that owns the observation store
//! - code stays easy to navigate as the project grows
//!
//! Data flows through the modules in this order:
//! `data` -> `panel` -> `features` -> `fit` -> `forecast` -> `report`/`io`.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod fit;
pub mod forecast;
pub mod io;
pub mod math;
pub mod models;
pub mod panel;
pub mod report;
