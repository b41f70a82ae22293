//! Frame pacing: the slot ring and deferred resource retirement

pub mod retire;
pub mod ring;

pub use retire::RetirementQueue;
pub use ring::{CompletionTimeline, FrameRing, PendingSubmission, SlotId, WaitOutcome, FRAMES_IN_FLIGHT};
