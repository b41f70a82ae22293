//! Backend abstraction traits for the frame loop
//!
//! The presentation loop and `RenderContext` only talk to the GPU through
//! these traits. The Vulkan backend implements them over real queues and
//! semaphores; tests implement them with a recording mock.

use crate::render::backends::vulkan::VulkanResult;
use crate::render::frame::{CompletionTimeline, PendingSubmission, SlotId, FRAMES_IN_FLIGHT};
use crate::render::scene::{LightRecord, ObjectRecord, SceneGeometry, SceneLayout};
use crate::render::sequencer::CommandEncoder;

/// Everything one queue submission needs to know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    /// Slot whose command buffer is submitted
    pub slot: SlotId,
    /// Swapchain image the commands render into
    pub image_index: u32,
    /// Value the slot's timeline is signaled to on completion
    pub signal_value: u64,
    /// Previous frame's work, which this submission must wait for on the GPU
    pub wait_previous: Option<PendingSubmission>,
}

/// How presentation went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// Presented and the swapchain matches the surface
    Optimal,
    /// Presented, but the swapchain no longer matches the surface exactly
    Suboptimal,
}

/// Callback that records one frame into an encoder
pub type RecordFn<'a> = dyn FnMut(&mut dyn CommandEncoder) -> VulkanResult<()> + 'a;

/// Scene data to place in a freshly allocated scene buffer
#[derive(Debug, Clone, Copy)]
pub struct SceneUpload<'a> {
    /// Vertex and index data
    pub geometry: &'a SceneGeometry,
    /// Object records
    pub objects: &'a [ObjectRecord],
    /// Light records; the rest of the light region stays zeroed
    pub lights: &'a [LightRecord],
}

/// GPU side of the acquire → record → submit → present loop
pub trait FrameBackend: CompletionTimeline {
    /// Acquire the next swapchain image, signaling `slot`'s image-acquired semaphore
    fn acquire_image(&mut self, slot: SlotId, timeout_ns: u64) -> VulkanResult<u32>;

    /// Reset `slot`'s command buffer and hand an encoder for it to `record`
    fn record_commands(&mut self, slot: SlotId, image_index: u32, record: &mut RecordFn<'_>) -> VulkanResult<()>;

    /// Submit `slot`'s command buffer
    fn submit(&mut self, submission: &Submission) -> VulkanResult<()>;

    /// Present `image_index` once `slot`'s submission has rendered it
    fn present(&mut self, slot: SlotId, image_index: u32) -> VulkanResult<PresentStatus>;

    /// Wait until the device has no work left
    fn wait_idle(&mut self) -> VulkanResult<()>;
}

/// Ownership of the scene buffer
pub trait SceneStorage {
    /// Allocate a buffer for `layout`, fill it, and make it current
    ///
    /// The previous buffer is retired until every slot reaches its value in
    /// `in_flight`.
    fn upload_scene(
        &mut self,
        layout: &SceneLayout,
        scene: SceneUpload<'_>,
        in_flight: [u64; FRAMES_IN_FLIGHT],
    ) -> VulkanResult<()>;

    /// Overwrite light slots starting at `first` in the current buffer
    ///
    /// Frames in flight may keep reading the slots below `first`; callers
    /// must make sure none of them reads a slot at or past it.
    fn write_lights(&mut self, layout: &SceneLayout, first: usize, lights: &[LightRecord]) -> VulkanResult<()>;

    /// Release retired buffers whose frames have completed
    fn collect_retired(&mut self) -> VulkanResult<usize>;

    /// Release every retired buffer; the device must be idle
    fn release_retired(&mut self) -> usize;
}
