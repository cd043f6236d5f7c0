//! Observation sources: the store abstraction and the synthetic generator.

pub mod sample;
pub mod store;

pub use sample::*;
pub use store::*;
