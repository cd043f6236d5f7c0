//! Feature construction from the assembled panel.

pub mod builder;

pub use builder::*;
