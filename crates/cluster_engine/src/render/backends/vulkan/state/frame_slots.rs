//! Per-slot and per-image synchronization objects
//!
//! Each ring slot owns a command buffer, a timeline semaphore counting its
//! completed frames and the binary semaphore its image acquisition signals.
//! Present waits are keyed by swapchain image instead: a binary semaphore may
//! only be re-signaled once the presentation that consumed it is done, and an
//! image is only handed back after that.

use ash::{vk, Device};

use crate::render::backends::vulkan::rendering::CommandPool;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::frame::{CompletionTimeline, SlotId, FRAMES_IN_FLIGHT};

use super::sync::{Semaphore, TimelineSemaphore};

/// Objects owned by one ring slot
pub struct FrameSlot {
    /// Counts this slot's completed submissions
    pub timeline: TimelineSemaphore,
    /// Signaled when the slot's swapchain image is ready
    pub image_acquired: Semaphore,
    /// Re-recorded every time the slot comes around
    pub command_buffer: vk::CommandBuffer,
}

/// The ring's slots plus per-image present semaphores
pub struct FrameSlots {
    slots: [FrameSlot; FRAMES_IN_FLIGHT],
    render_finished: Vec<Semaphore>,
}

impl FrameSlots {
    /// Create a new set of slots for a swapchain with `image_count` images
    pub fn new(device: &Device, command_pool: &CommandPool, image_count: usize) -> VulkanResult<Self> {
        let command_buffers = command_pool.allocate_command_buffers(FRAMES_IN_FLIGHT as u32)?;

        let mut slots = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for command_buffer in command_buffers {
            slots.push(FrameSlot {
                timeline: TimelineSemaphore::new(device.clone(), 0)?,
                image_acquired: Semaphore::new(device.clone())?,
                command_buffer,
            });
        }
        let slots: [FrameSlot; FRAMES_IN_FLIGHT] = slots.try_into().map_err(|_| VulkanError::InvalidOperation {
            reason: "Command pool returned the wrong number of command buffers".to_string(),
        })?;

        let render_finished = (0..image_count)
            .map(|_| Semaphore::new(device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!(
            "Created {} frame slots and {} present semaphores",
            FRAMES_IN_FLIGHT,
            render_finished.len()
        );
        Ok(Self { slots, render_finished })
    }

    /// Objects for `slot`
    pub fn slot(&self, slot: SlotId) -> &FrameSlot {
        &self.slots[slot.index()]
    }

    /// Semaphore presentation of `image_index` waits on
    pub fn render_finished(&self, image_index: u32) -> VulkanResult<&Semaphore> {
        self.render_finished
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("Swapchain image {image_index} out of range"),
            })
    }
}

impl CompletionTimeline for FrameSlots {
    fn completed_value(&self, slot: SlotId) -> VulkanResult<u64> {
        self.slot(slot).timeline.value()
    }

    fn wait_for_value(&self, slot: SlotId, value: u64, timeout_ns: u64) -> VulkanResult<()> {
        self.slot(slot).timeline.wait(value, timeout_ns)
    }
}
