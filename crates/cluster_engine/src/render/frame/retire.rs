//! Deferred destruction of GPU resources still referenced by frames in flight
//!
//! A retired resource remembers the completion value every slot had pending
//! when it was replaced. Once each slot has reached that value no submitted
//! frame can touch it, and dropping it releases the GPU memory.

use super::ring::{CompletionTimeline, SlotId, FRAMES_IN_FLIGHT};
use crate::render::backends::vulkan::VulkanResult;

struct Retired<T> {
    resource: T,
    wait_values: [u64; FRAMES_IN_FLIGHT],
}

/// Resources waiting for in-flight frames to finish
pub struct RetirementQueue<T> {
    entries: Vec<Retired<T>>,
}

impl<T> Default for RetirementQueue<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> RetirementQueue<T> {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `resource` until every slot reaches its value in `pending`
    pub fn retire(&mut self, resource: T, pending: [u64; FRAMES_IN_FLIGHT]) {
        self.entries.push(Retired { resource, wait_values: pending });
    }

    /// Drop every resource whose frames have completed; returns how many
    pub fn collect<C>(&mut self, timeline: &C) -> VulkanResult<usize>
    where
        C: CompletionTimeline + ?Sized,
    {
        if self.entries.is_empty() {
            return Ok(0);
        }

        let mut completed = [0; FRAMES_IN_FLIGHT];
        for (i, value) in completed.iter_mut().enumerate() {
            *value = timeline.completed_value(SlotId::new(i))?;
        }

        let before = self.entries.len();
        self.entries.retain(|entry| {
            entry
                .wait_values
                .iter()
                .zip(completed)
                .any(|(&wait, done)| wait > done)
        });
        let released = before - self.entries.len();
        if released > 0 {
            log::debug!("Released {} retired resource(s), {} still pending", released, self.entries.len());
        }
        Ok(released)
    }

    /// Drop everything; only valid once the device is idle
    pub fn drain_all(&mut self) -> usize {
        let released = self.entries.len();
        self.entries.clear();
        released
    }

    /// Resources still waiting
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
