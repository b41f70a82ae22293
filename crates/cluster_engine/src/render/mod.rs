//! Rendering: scene data, frame pacing, pass sequencing and the Vulkan backend
//!
//! [`RenderContext`] is the entry point. Everything below it is reachable for
//! callers that want to drive a custom backend or inspect the recorded work.

pub mod api;
pub mod backends;
pub mod context;
pub mod fatal;
pub mod frame;
pub mod presenter;
pub mod scene;
pub mod sequencer;

#[cfg(test)]
mod tests;

pub use backends::vulkan::{VulkanError, VulkanResult};
pub use context::RenderContext;
pub use presenter::FrameReport;
