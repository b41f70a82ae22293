//! Barrier descriptions for the frame sequence
//!
//! Every hazard between two passes gets one pre-built barrier set here, with
//! the narrowest stage/access pair on each side. Buffer barriers are always
//! scoped to a byte range of the scene buffer, never the whole allocation.

use ash::vk;

use crate::render::scene::{Region, RegionKind, SceneLayout};

/// Pipeline stage plus the memory access performed there
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageAccess {
    /// Pipeline stages
    pub stage: vk::PipelineStageFlags2,
    /// Memory accesses in those stages
    pub access: vk::AccessFlags2,
}

impl StageAccess {
    /// Stage/access pair
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self { stage, access }
    }

    /// Compute shader storage writes
    pub fn compute_write() -> Self {
        Self::new(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE)
    }

    /// Indirect command fetch
    pub fn indirect_read() -> Self {
        Self::new(vk::PipelineStageFlags2::DRAW_INDIRECT, vk::AccessFlags2::INDIRECT_COMMAND_READ)
    }

    /// Fragment shader storage writes
    pub fn fragment_write() -> Self {
        Self::new(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE)
    }

    /// Fragment shader storage reads
    pub fn fragment_read() -> Self {
        Self::new(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ)
    }

    /// Fragment shader atomics (read-modify-write)
    pub fn fragment_atomic() -> Self {
        Self::new(
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
        )
    }

    /// Indirect fetch plus vertex shader storage reads of the same records
    pub fn indirect_and_vertex_read() -> Self {
        Self::new(
            vk::PipelineStageFlags2::DRAW_INDIRECT | vk::PipelineStageFlags2::VERTEX_SHADER,
            vk::AccessFlags2::INDIRECT_COMMAND_READ | vk::AccessFlags2::SHADER_STORAGE_READ,
        )
    }

    /// Depth attachment writes
    pub fn depth_write() -> Self {
        Self::new(
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
    }

    /// Depth attachment reads and writes
    pub fn depth_read_write() -> Self {
        Self::new(
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
    }

    /// Color attachment writes
    pub fn color_write() -> Self {
        Self::new(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        )
    }

    /// Execution-only dependency on `stage`
    pub fn stage_only(stage: vk::PipelineStageFlags2) -> Self {
        Self::new(stage, vk::AccessFlags2::NONE)
    }
}

/// Dependency on a byte range of the scene buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    /// Region the range belongs to
    pub region: RegionKind,
    /// Bytes covered
    pub range: Region,
    /// Writer side
    pub src: StageAccess,
    /// Reader side
    pub dst: StageAccess,
}

impl BufferBarrier {
    /// Compute write → indirect fetch for a region written by culling
    pub fn compute_write_to_indirect_read(layout: &SceneLayout, region: RegionKind) -> Self {
        Self {
            region,
            range: layout.region(region),
            src: StageAccess::compute_write(),
            dst: StageAccess::indirect_read(),
        }
    }

    /// Culling's counter reset → the visibility pass's fragment atomics
    pub fn visible_counter_reset(layout: &SceneLayout) -> Self {
        Self {
            region: RegionKind::VisibleMeshlets,
            range: layout.visible_meshlet_counter(),
            src: StageAccess::compute_write(),
            dst: StageAccess::fragment_atomic(),
        }
    }

    /// Visibility pass output → indirect fetch and vertex reads of later draws
    pub fn visible_meshlets_to_draws(layout: &SceneLayout) -> Self {
        Self {
            region: RegionKind::VisibleMeshlets,
            range: layout.region(RegionKind::VisibleMeshlets),
            src: StageAccess::fragment_write(),
            dst: StageAccess::indirect_and_vertex_read(),
        }
    }

    /// True if the barrier covers `kind` bytes and orders `src` before `dst`
    pub fn orders(&self, kind: RegionKind, src: vk::PipelineStageFlags2, dst: vk::PipelineStageFlags2) -> bool {
        self.region == kind && self.src.stage.contains(src) && self.dst.stage.contains(dst)
    }
}

/// Images the frame transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTarget {
    /// The acquired swapchain image
    Swapchain,
    /// Shared depth attachment
    Depth,
    /// 3D light-cluster storage image
    ClusterVolume,
}

/// Layout transition and/or memory dependency on one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    /// Image affected
    pub target: ImageTarget,
    /// Layout before the barrier
    pub old_layout: vk::ImageLayout,
    /// Layout after the barrier
    pub new_layout: vk::ImageLayout,
    /// Writer side
    pub src: StageAccess,
    /// Reader side
    pub dst: StageAccess,
}

impl ImageBarrier {
    /// Fresh swapchain image → color attachment
    pub fn swapchain_to_color_attachment() -> Self {
        Self {
            target: ImageTarget::Swapchain,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src: StageAccess::stage_only(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
            dst: StageAccess::color_write(),
        }
    }

    /// Rendered swapchain image → presentation
    pub fn swapchain_to_present() -> Self {
        Self {
            target: ImageTarget::Swapchain,
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            src: StageAccess::color_write(),
            dst: StageAccess::stage_only(vk::PipelineStageFlags2::NONE),
        }
    }

    /// Discard last frame's depth and make it a depth attachment
    pub fn depth_init() -> Self {
        Self {
            target: ImageTarget::Depth,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            src: StageAccess::stage_only(
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            ),
            dst: StageAccess::depth_read_write(),
        }
    }

    /// Depth written by one rendering scope, used by the next
    pub fn depth_between_passes() -> Self {
        Self {
            target: ImageTarget::Depth,
            old_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            src: StageAccess::depth_write(),
            dst: StageAccess::depth_read_write(),
        }
    }

    /// Discard last frame's clusters and make the volume writable by compute
    pub fn cluster_volume_init() -> Self {
        Self {
            target: ImageTarget::ClusterVolume,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::GENERAL,
            src: StageAccess::stage_only(vk::PipelineStageFlags2::COMPUTE_SHADER),
            dst: StageAccess::compute_write(),
        }
    }

    /// Clustering output → shading reads
    pub fn cluster_volume_to_shading() -> Self {
        Self {
            target: ImageTarget::ClusterVolume,
            old_layout: vk::ImageLayout::GENERAL,
            new_layout: vk::ImageLayout::GENERAL,
            src: StageAccess::compute_write(),
            dst: StageAccess::fragment_read(),
        }
    }
}

/// Move non-empty barriers to the front; returns how many there are
///
/// Zero-sized buffer ranges are not valid in a barrier, and an empty region
/// has no hazard to order.
pub fn retain_non_empty(barriers: &mut [BufferBarrier]) -> usize {
    let mut kept = 0;
    for i in 0..barriers.len() {
        if !barriers[i].range.is_empty() {
            barriers.swap(kept, i);
            kept += 1;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::SceneCounts;

    #[test]
    fn test_empty_ranges_are_dropped_in_order() {
        let layout = SceneLayout::compute(SceneCounts::default());
        let mut barriers = [
            BufferBarrier::compute_write_to_indirect_read(&layout, RegionKind::IndirectDraws),
            BufferBarrier::compute_write_to_indirect_read(&layout, RegionKind::DrawCount),
            BufferBarrier::visible_counter_reset(&layout),
        ];
        let kept = retain_non_empty(&mut barriers);
        assert_eq!(kept, 2);
        assert_eq!(barriers[0].region, RegionKind::DrawCount);
        assert_eq!(barriers[1].region, RegionKind::VisibleMeshlets);
    }

    #[test]
    fn test_counter_barrier_covers_only_the_counter() {
        let layout = SceneLayout::compute(SceneCounts { objects: 2, meshlets: 9, light_capacity: 1, geometry_bytes: 0 });
        let barrier = BufferBarrier::visible_counter_reset(&layout);
        assert_eq!(barrier.range.size, 4);
        assert_eq!(barrier.range.offset, layout.region(RegionKind::VisibleMeshlets).offset);
    }

    #[test]
    fn test_orders_checks_both_sides() {
        let layout = SceneLayout::compute(SceneCounts { objects: 1, ..SceneCounts::default() });
        let barrier = BufferBarrier::compute_write_to_indirect_read(&layout, RegionKind::DrawCount);
        assert!(barrier.orders(
            RegionKind::DrawCount,
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::PipelineStageFlags2::DRAW_INDIRECT
        ));
        assert!(!barrier.orders(
            RegionKind::IndirectDraws,
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::PipelineStageFlags2::DRAW_INDIRECT
        ));
        assert!(!barrier.orders(
            RegionKind::DrawCount,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::PipelineStageFlags2::DRAW_INDIRECT
        ));
    }
}
