//! Vulkan state management: swapchain, semaphores and frame slots

pub mod frame_slots;
pub mod swapchain;
pub mod sync;

pub use frame_slots::{FrameSlot, FrameSlots};
pub use swapchain::Swapchain;
pub use sync::{Semaphore, TimelineSemaphore};
