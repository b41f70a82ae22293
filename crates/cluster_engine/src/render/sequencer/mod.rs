//! Command sequencer
//!
//! Records one frame of GPU work in a fixed order: light clustering, object
//! culling, meshlet visibility, depth prepass and shading, with the
//! barriers that make each pass's writes visible to the next reader.
//!
//! Recording goes through [`CommandEncoder`], so the order and barrier
//! placement can be checked without a GPU.

pub mod barriers;
pub mod frame;

use bitflags::bitflags;

pub use barriers::{BufferBarrier, ImageBarrier, ImageTarget, StageAccess};
pub use frame::{FrameInputs, FrameSequencer, SequencerSettings};

use crate::render::backends::vulkan::VulkanResult;
use crate::render::scene::{PushConstants, Region};

/// The five GPU programs of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Assigns lights to cluster volume cells (compute)
    Cluster,
    /// Frustum-culls objects and emits indirect draws (compute)
    CullObjects,
    /// Rasterizes candidate meshlets and collects the visible ones
    MeshletVisibility,
    /// Depth-only draw of the visible meshlets
    DepthPrepass,
    /// Final shading of the visible meshlets
    Shading,
}

impl Pass {
    /// Every pass, in frame order
    pub const ALL: [Self; 5] = [
        Self::Cluster,
        Self::CullObjects,
        Self::MeshletVisibility,
        Self::DepthPrepass,
        Self::Shading,
    ];

    /// True for the compute passes
    pub const fn is_compute(self) -> bool {
        matches!(self, Self::Cluster | Self::CullObjects)
    }

    /// Name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::CullObjects => "cull_objects",
            Self::MeshletVisibility => "meshlet_visibility",
            Self::DepthPrepass => "depth_prepass",
            Self::Shading => "shading",
        }
    }

    /// Flag for this pass
    pub const fn flag(self) -> PassSet {
        match self {
            Self::Cluster => PassSet::CLUSTER,
            Self::CullObjects => PassSet::CULL_OBJECTS,
            Self::MeshletVisibility => PassSet::MESHLET_VISIBILITY,
            Self::DepthPrepass => PassSet::DEPTH_PREPASS,
            Self::Shading => PassSet::SHADING,
        }
    }
}

bitflags! {
    /// Set of passes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PassSet: u8 {
        /// [`Pass::Cluster`]
        const CLUSTER = 1 << 0;
        /// [`Pass::CullObjects`]
        const CULL_OBJECTS = 1 << 1;
        /// [`Pass::MeshletVisibility`]
        const MESHLET_VISIBILITY = 1 << 2;
        /// [`Pass::DepthPrepass`]
        const DEPTH_PREPASS = 1 << 3;
        /// [`Pass::Shading`]
        const SHADING = 1 << 4;
    }
}

impl PassSet {
    /// Passes in this set, in frame order
    pub fn passes(self) -> impl Iterator<Item = Pass> {
        Pass::ALL.into_iter().filter(move |pass| self.contains(pass.flag()))
    }
}

/// What happens to an attachment when rendering begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentLoad {
    /// Clear to the pass's clear value
    Clear,
    /// Keep the previous contents
    Load,
}

/// Attachments used by one dynamic-rendering scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargets {
    /// Swapchain color attachment, if the pass writes color
    pub color: Option<AttachmentLoad>,
    /// Depth attachment
    pub depth: AttachmentLoad,
}

/// Sink for one frame's commands
///
/// Implemented over a Vulkan command buffer by the backend and by a
/// recording mock in tests.
pub trait CommandEncoder {
    /// Start recording
    fn begin(&mut self) -> VulkanResult<()>;

    /// One pipeline barrier covering the given buffer ranges and images
    fn pipeline_barrier(&mut self, buffers: &[BufferBarrier], images: &[ImageBarrier]);

    /// Bind the shared descriptor set and push constants for both bind points
    fn bind_scene(&mut self, push: &PushConstants);

    /// Bind `range` of the scene buffer as the `u32` index buffer
    fn bind_index_buffer(&mut self, range: Region);

    /// Bind `pass`'s compute pipeline and dispatch
    fn dispatch(&mut self, pass: Pass, workgroups: [u32; 3]);

    /// Begin a dynamic-rendering scope
    fn begin_rendering(&mut self, targets: RenderTargets);

    /// Bind `pass`'s graphics pipeline and issue an indexed indirect-count draw
    fn draw_indexed_indirect_count(&mut self, pass: Pass, commands: Region, count: Region, max_draws: u32);

    /// End the current dynamic-rendering scope
    fn end_rendering(&mut self);

    /// Finish recording
    fn end(&mut self) -> VulkanResult<()>;
}
