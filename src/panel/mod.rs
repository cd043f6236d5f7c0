//! Panel construction.
//!
//! Responsibilities:
//!
//! - reduce raw observations to daily series per source (`normalize`)
//! - join them onto one contiguous calendar with fill rules (`assemble`)
//! - derive pulse features from weekly events (`pulse`)
//! - robustly smooth driver inputs (`smooth`)

pub mod assemble;
pub mod normalize;
pub mod pulse;
pub mod smooth;

pub use assemble::*;
pub use normalize::*;
pub use pulse::*;
pub use smooth::*;
