//! Vulkan 1.3 backend
//!
//! Organized like the rest of the backend tree:
//! - `initialization`: window, instance, device
//! - `state`: swapchain, semaphores, frame slots
//! - `resources`: buffers, images, descriptor sets
//! - `rendering`: shaders, pipelines, command recording
//! - `renderer`: [`VulkanBackend`], which implements the frame loop traits

pub mod initialization;
pub mod renderer;
pub mod rendering;
pub mod resources;
pub mod state;

pub use initialization::{VulkanContext, VulkanError, VulkanResult, Window, WindowError};
pub use renderer::VulkanBackend;
