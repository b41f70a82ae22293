//! Presentation loop
//!
//! One call to [`Presenter::draw_frame`] walks the frame through
//! `ACQUIRE → RECORD → SUBMIT → PRESENT`:
//!
//! - **Acquire**: take the next ring slot, wait if its previous frame is
//!   still running, then acquire a swapchain image.
//! - **Record**: reset the slot's command buffer and record the pass sequence.
//! - **Submit**: wait for the acquired image and the previous frame, signal
//!   the slot's next completion value.
//! - **Present**: queue the image for display once the submission finishes.
//!
//! Any error ends the frame immediately and is returned to the caller.

use crate::render::api::{FrameBackend, PresentStatus, Submission};
use crate::render::backends::vulkan::VulkanResult;
use crate::render::frame::{FrameRing, SlotId, WaitOutcome};
use crate::render::sequencer::{CommandEncoder, FrameInputs, FrameSequencer, PassSet};

/// What happened during one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Zero-based frame number
    pub frame: u64,
    /// Ring slot used
    pub slot: SlotId,
    /// Swapchain image rendered
    pub image_index: u32,
    /// How the slot wait resolved
    pub wait: WaitOutcome,
    /// Completion value the submission signals
    pub completion_value: u64,
    /// Passes recorded
    pub passes: PassSet,
    /// Presentation result
    pub present: PresentStatus,
}

/// Drives frames through the ring
#[derive(Debug)]
pub struct Presenter {
    ring: FrameRing,
    sequencer: FrameSequencer,
    timeout_ns: u64,
    suboptimal_reported: bool,
}

impl Presenter {
    /// Presenter with a fresh ring
    pub fn new(sequencer: FrameSequencer, timeout_ns: u64) -> Self {
        Self {
            ring: FrameRing::new(),
            sequencer,
            timeout_ns,
            suboptimal_reported: false,
        }
    }

    /// The frame ring
    pub const fn ring(&self) -> &FrameRing {
        &self.ring
    }

    /// Render and present one frame
    pub fn draw_frame<B>(&mut self, backend: &mut B, inputs: &FrameInputs<'_>) -> VulkanResult<FrameReport>
    where
        B: FrameBackend + ?Sized,
    {
        let frame = self.ring.frame_counter();

        // Acquire
        let slot = self.ring.acquire_slot();
        let wait = self.ring.wait_if_busy(&*backend, slot, self.timeout_ns)?;
        let image_index = backend.acquire_image(slot, self.timeout_ns)?;
        log::trace!("Frame {}: slot {} image {} ({:?})", frame, slot.index(), image_index, wait);

        // Record
        let sequencer = self.sequencer;
        let mut passes = PassSet::empty();
        backend.record_commands(slot, image_index, &mut |encoder: &mut dyn CommandEncoder| {
            passes = sequencer.record(encoder, inputs)?;
            Ok(())
        })?;

        // Submit
        let submission = Submission {
            slot,
            image_index,
            signal_value: self.ring.next_value(slot),
            wait_previous: self.ring.previous_submission(slot),
        };
        backend.submit(&submission)?;
        self.ring.mark_submitted(slot, submission.signal_value)?;

        // Present
        let present = backend.present(slot, image_index)?;
        if present == PresentStatus::Suboptimal && !self.suboptimal_reported {
            log::warn!("Swapchain is suboptimal for the surface; continuing");
            self.suboptimal_reported = true;
        }

        Ok(FrameReport {
            frame,
            slot,
            image_index,
            wait,
            completion_value: submission.signal_value,
            passes,
            present,
        })
    }

    /// Block until every submitted frame has completed
    pub fn wait_in_flight<B>(&self, backend: &B) -> VulkanResult<()>
    where
        B: FrameBackend + ?Sized,
    {
        self.ring.wait_all(backend, self.timeout_ns)
    }
}
