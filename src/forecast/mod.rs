//! Forecasting from a fitted model (or the naive fallback).
//!
//! - `horizon`: which days to simulate
//! - `simulate`: point path, bootstrap ensemble and per-day bands
//! - `threshold`: anchor-day summary and exceedance probabilities
//! - `naive`: last value plus decayed trend

pub mod horizon;
pub mod naive;
pub mod simulate;
pub mod threshold;

pub use horizon::*;
pub use naive::*;
pub use simulate::*;
pub use threshold::*;
