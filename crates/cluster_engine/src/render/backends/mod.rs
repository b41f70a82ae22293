//! Graphics backend implementations
//!
//! Vulkan 1.3 is the only backend.

pub mod vulkan;
