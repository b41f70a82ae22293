//! Vulkan bootstrap: window, instance, device

pub mod context;
pub mod window;

pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance, VulkanResult};
pub use window::{Window, WindowError};
