//! Foundation module - Core utilities and types
//!
//! Logging setup and the small set of math types the renderer consumes.

pub mod logging;
pub mod math;
