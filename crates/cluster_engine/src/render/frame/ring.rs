//! Frame resource ring
//!
//! `FRAMES_IN_FLIGHT` slots are handed out round-robin. Each slot owns a
//! monotonically increasing completion value: submitting frame work signals
//! the next value, and the slot is only reused once the GPU has reached the
//! value of its previous submission.

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Number of frame slots
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Index of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    /// Slot for index `i`; panics if `i` is not below [`FRAMES_IN_FLIGHT`]
    pub fn new(i: usize) -> Self {
        assert!(i < FRAMES_IN_FLIGHT, "slot {i} out of range");
        Self(i)
    }

    /// Array index of this slot
    pub const fn index(self) -> usize {
        self.0
    }

    /// Slot used by the frame before this one
    pub const fn previous(self) -> Self {
        Self((self.0 + FRAMES_IN_FLIGHT - 1) % FRAMES_IN_FLIGHT)
    }
}

/// GPU-side completion values of the frame slots
///
/// Implemented with one timeline semaphore per slot on Vulkan.
pub trait CompletionTimeline {
    /// Highest value the GPU has signaled for `slot`
    fn completed_value(&self, slot: SlotId) -> VulkanResult<u64>;

    /// Block until `slot` reaches `value`
    ///
    /// Returns [`VulkanError::Timeout`] if `timeout_ns` elapses first.
    fn wait_for_value(&self, slot: SlotId, value: u64, timeout_ns: u64) -> VulkanResult<()>;
}

/// How `wait_if_busy` resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The slot was never submitted
    NeverSubmitted,
    /// The previous submission had already completed
    AlreadyComplete,
    /// The CPU blocked until the previous submission completed
    Waited {
        /// Completion value that was waited for
        value: u64,
    },
}

/// The previous frame's submission, which the next one orders itself after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSubmission {
    /// Slot the frame ran in
    pub slot: SlotId,
    /// Value that slot signals when the frame completes
    pub value: u64,
}

/// Round-robin frame slots with per-slot completion tracking
#[derive(Debug, Default)]
pub struct FrameRing {
    frame_counter: u64,
    pending: [u64; FRAMES_IN_FLIGHT],
}

impl FrameRing {
    /// Ring with no frames issued
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames handed out so far
    pub const fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Advance the frame counter and return the slot for the new frame
    pub fn acquire_slot(&mut self) -> SlotId {
        let slot = SlotId((self.frame_counter % FRAMES_IN_FLIGHT as u64) as usize);
        self.frame_counter += 1;
        slot
    }

    /// Block until `slot`'s previous submission has completed
    ///
    /// A slot that was never submitted returns immediately. Timing out is an
    /// error; the caller decides whether that is fatal.
    pub fn wait_if_busy<T>(&self, timeline: &T, slot: SlotId, timeout_ns: u64) -> VulkanResult<WaitOutcome>
    where
        T: CompletionTimeline + ?Sized,
    {
        let pending = self.pending[slot.0];
        if pending == 0 {
            return Ok(WaitOutcome::NeverSubmitted);
        }
        if timeline.completed_value(slot)? >= pending {
            return Ok(WaitOutcome::AlreadyComplete);
        }
        log::trace!("Slot {} busy, waiting for value {}", slot.0, pending);
        timeline.wait_for_value(slot, pending, timeout_ns)?;
        Ok(WaitOutcome::Waited { value: pending })
    }

    /// Value the next submission on `slot` will signal
    pub const fn next_value(&self, slot: SlotId) -> u64 {
        self.pending[slot.0] + 1
    }

    /// Record that `slot` was submitted and will signal `completion_value`
    pub fn mark_submitted(&mut self, slot: SlotId, completion_value: u64) -> VulkanResult<()> {
        if completion_value <= self.pending[slot.0] {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "slot {} completion value must increase ({} <= {})",
                    slot.0, completion_value, self.pending[slot.0]
                ),
            });
        }
        self.pending[slot.0] = completion_value;
        Ok(())
    }

    /// Value `slot` signals when its latest submission completes (0 if never submitted)
    pub const fn pending_value(&self, slot: SlotId) -> u64 {
        self.pending[slot.0]
    }

    /// Latest submitted value of every slot
    pub const fn pending_values(&self) -> [u64; FRAMES_IN_FLIGHT] {
        self.pending
    }

    /// Latest submission of the slot before `slot`, if it ever ran
    pub const fn previous_submission(&self, slot: SlotId) -> Option<PendingSubmission> {
        let previous = slot.previous();
        let value = self.pending[previous.0];
        if value == 0 || previous.0 == slot.0 {
            None
        } else {
            Some(PendingSubmission { slot: previous, value })
        }
    }

    /// Block until every slot's latest submission has completed
    pub fn wait_all<T>(&self, timeline: &T, timeout_ns: u64) -> VulkanResult<()>
    where
        T: CompletionTimeline + ?Sized,
    {
        for i in 0..FRAMES_IN_FLIGHT {
            self.wait_if_busy(timeline, SlotId(i), timeout_ns)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Timeline that completes work only when waited on, or when told to.
    #[derive(Default)]
    struct ManualTimeline {
        completed: RefCell<[u64; FRAMES_IN_FLIGHT]>,
        waits: RefCell<Vec<(usize, u64)>>,
        hang: bool,
    }

    impl CompletionTimeline for ManualTimeline {
        fn completed_value(&self, slot: SlotId) -> VulkanResult<u64> {
            Ok(self.completed.borrow()[slot.index()])
        }

        fn wait_for_value(&self, slot: SlotId, value: u64, timeout_ns: u64) -> VulkanResult<()> {
            self.waits.borrow_mut().push((slot.index(), value));
            if self.hang {
                return Err(VulkanError::Timeout { op: "vkWaitSemaphores", timeout_ns });
            }
            self.completed.borrow_mut()[slot.index()] = value;
            Ok(())
        }
    }

    #[test]
    fn test_slots_rotate_modulo_ring_size() {
        let mut ring = FrameRing::new();
        let slots: Vec<usize> = (0..5).map(|_| ring.acquire_slot().index()).collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(ring.frame_counter(), 5);
    }

    #[test]
    fn test_fresh_slot_never_blocks() {
        let ring = FrameRing::new();
        let timeline = ManualTimeline { hang: true, ..Default::default() };
        let outcome = ring.wait_if_busy(&timeline, SlotId::new(0), 1).unwrap();
        assert_eq!(outcome, WaitOutcome::NeverSubmitted);
        assert!(timeline.waits.borrow().is_empty());
    }

    #[test]
    fn test_reused_slot_waits_for_previous_value() {
        let mut ring = FrameRing::new();
        let timeline = ManualTimeline::default();

        let slot = ring.acquire_slot();
        ring.mark_submitted(slot, ring.next_value(slot)).unwrap();
        let other = ring.acquire_slot();
        ring.mark_submitted(other, ring.next_value(other)).unwrap();

        let reused = ring.acquire_slot();
        assert_eq!(reused, slot);
        let outcome = ring.wait_if_busy(&timeline, reused, 10).unwrap();
        assert_eq!(outcome, WaitOutcome::Waited { value: 1 });
        assert_eq!(*timeline.waits.borrow(), vec![(0, 1)]);
        assert_eq!(ring.next_value(reused), 2);
    }

    #[test]
    fn test_completed_slot_skips_wait() {
        let mut ring = FrameRing::new();
        let timeline = ManualTimeline::default();
        let slot = ring.acquire_slot();
        ring.mark_submitted(slot, 1).unwrap();
        timeline.completed.borrow_mut()[0] = 1;

        assert_eq!(ring.wait_if_busy(&timeline, slot, 10).unwrap(), WaitOutcome::AlreadyComplete);
        assert!(timeline.waits.borrow().is_empty());
    }

    #[test]
    fn test_timeout_surfaces_as_error() {
        let mut ring = FrameRing::new();
        ring.mark_submitted(SlotId::new(1), 3).unwrap();
        let timeline = ManualTimeline { hang: true, ..Default::default() };
        let err = ring.wait_if_busy(&timeline, SlotId::new(1), 500).unwrap_err();
        assert!(matches!(err, VulkanError::Timeout { timeout_ns: 500, .. }));
    }

    #[test]
    fn test_completion_values_must_increase() {
        let mut ring = FrameRing::new();
        let slot = SlotId::new(0);
        ring.mark_submitted(slot, 2).unwrap();
        assert!(ring.mark_submitted(slot, 2).is_err());
        assert!(ring.mark_submitted(slot, 1).is_err());
        assert_eq!(ring.pending_value(slot), 2);
    }

    #[test]
    fn test_previous_submission_tracks_other_slot() {
        let mut ring = FrameRing::new();
        assert_eq!(ring.previous_submission(SlotId::new(1)), None);
        ring.mark_submitted(SlotId::new(0), 1).unwrap();
        assert_eq!(
            ring.previous_submission(SlotId::new(1)),
            Some(PendingSubmission { slot: SlotId::new(0), value: 1 })
        );
        assert_eq!(ring.previous_submission(SlotId::new(0)), None);
    }
}
