//! Model fitting.
//!
//! Responsibilities:
//!
//! - collect recency-weighted training rows from the panel
//! - fit the ridge regression for a feature set
//! - gate the event-pulse features on a chronological hold-out

pub mod fitter;
pub mod selection;

pub use fitter::*;
pub use selection::*;
