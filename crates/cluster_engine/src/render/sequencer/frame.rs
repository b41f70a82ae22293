//! Per-frame recording order

use super::barriers::{retain_non_empty, BufferBarrier, ImageBarrier};
use super::{AttachmentLoad, CommandEncoder, Pass, PassSet, RenderTargets};
use crate::core::config::RendererConfig;
use crate::render::backends::vulkan::VulkanResult;
use crate::render::scene::{PushConstants, Region, RegionKind, SceneLayout};

/// Dispatch sizing, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerSettings {
    /// Workgroups covering the cluster volume
    pub cluster_workgroups: [u32; 3],
    /// Objects handled per culling workgroup
    pub cull_local_size: u32,
}

impl SequencerSettings {
    /// Derive dispatch sizes from the renderer configuration
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            cluster_workgroups: config.cluster_workgroups(),
            cull_local_size: config.cull_local_size.max(1),
        }
    }
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self { cluster_workgroups: [9, 9, 9], cull_local_size: 256 }
    }
}

/// Scene state a frame is recorded from
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    /// Current scene buffer layout
    pub layout: &'a SceneLayout,
    /// Camera and counts for this frame
    pub push: PushConstants,
    /// Absolute byte range of the index data, empty if there is none
    pub index_range: Region,
}

/// Emits the fixed pass order with its barriers
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSequencer {
    settings: SequencerSettings,
}

impl FrameSequencer {
    /// Sequencer with the given dispatch sizing
    pub const fn new(settings: SequencerSettings) -> Self {
        Self { settings }
    }

    /// Dispatch sizing in use
    pub const fn settings(&self) -> SequencerSettings {
        self.settings
    }

    /// Culling workgroups for `objects` objects
    pub const fn cull_workgroups(&self, objects: u32) -> u32 {
        objects.div_ceil(self.settings.cull_local_size)
    }

    /// Record one frame into `encoder`
    ///
    /// Returns the passes that were actually issued; a dispatch with zero
    /// workgroups is skipped.
    pub fn record<E>(&self, encoder: &mut E, frame: &FrameInputs<'_>) -> VulkanResult<PassSet>
    where
        E: CommandEncoder + ?Sized,
    {
        let layout = frame.layout;
        let counts = layout.counts();
        let mut issued = PassSet::empty();

        encoder.begin()?;
        encoder.pipeline_barrier(
            &[],
            &[
                ImageBarrier::swapchain_to_color_attachment(),
                ImageBarrier::depth_init(),
                ImageBarrier::cluster_volume_init(),
            ],
        );

        encoder.bind_scene(&frame.push);
        let index_range = if frame.index_range.is_empty() { Region::new(0, 0) } else { frame.index_range };
        encoder.bind_index_buffer(index_range);

        if self.settings.cluster_workgroups.iter().all(|&groups| groups > 0) {
            encoder.dispatch(Pass::Cluster, self.settings.cluster_workgroups);
            issued |= PassSet::CLUSTER;
        }

        let cull_groups = self.cull_workgroups(counts.objects);
        if cull_groups > 0 {
            encoder.dispatch(Pass::CullObjects, [cull_groups, 1, 1]);
            issued |= PassSet::CULL_OBJECTS;
        }

        let mut culled = [
            BufferBarrier::compute_write_to_indirect_read(layout, RegionKind::IndirectDraws),
            BufferBarrier::compute_write_to_indirect_read(layout, RegionKind::DrawCount),
            BufferBarrier::visible_counter_reset(layout),
        ];
        let kept = retain_non_empty(&mut culled);
        encoder.pipeline_barrier(&culled[..kept], &[]);

        encoder.begin_rendering(RenderTargets { color: None, depth: AttachmentLoad::Clear });
        encoder.draw_indexed_indirect_count(
            Pass::MeshletVisibility,
            layout.region(RegionKind::IndirectDraws),
            layout.region(RegionKind::DrawCount),
            counts.objects,
        );
        encoder.end_rendering();
        issued |= PassSet::MESHLET_VISIBILITY;

        encoder.pipeline_barrier(
            &[BufferBarrier::visible_meshlets_to_draws(layout)],
            &[ImageBarrier::depth_between_passes()],
        );

        encoder.begin_rendering(RenderTargets { color: None, depth: AttachmentLoad::Clear });
        encoder.draw_indexed_indirect_count(
            Pass::DepthPrepass,
            layout.visible_meshlet_draws(),
            layout.visible_meshlet_counter(),
            counts.meshlets,
        );
        encoder.end_rendering();
        issued |= PassSet::DEPTH_PREPASS;

        encoder.pipeline_barrier(
            &[],
            &[ImageBarrier::cluster_volume_to_shading(), ImageBarrier::depth_between_passes()],
        );

        encoder.begin_rendering(RenderTargets {
            color: Some(AttachmentLoad::Clear),
            depth: AttachmentLoad::Load,
        });
        encoder.draw_indexed_indirect_count(
            Pass::Shading,
            layout.visible_meshlet_draws(),
            layout.visible_meshlet_counter(),
            counts.meshlets,
        );
        encoder.end_rendering();
        issued |= PassSet::SHADING;

        encoder.pipeline_barrier(&[], &[ImageBarrier::swapchain_to_present()]);
        encoder.end()?;

        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::render::scene::SceneCounts;
    use crate::render::sequencer::ImageTarget;
    use crate::render::tests::recording::{Command, RecordingEncoder};
    use ash::vk;

    fn record(counts: SceneCounts) -> (Vec<Command>, PassSet) {
        let layout = SceneLayout::compute(counts);
        let push = PushConstants::new(&Mat4::identity(), &Mat4::identity(), &layout, 0);
        let inputs = FrameInputs { layout: &layout, push, index_range: Region::new(0, 0) };
        let mut encoder = RecordingEncoder::default();
        let issued = FrameSequencer::default().record(&mut encoder, &inputs).unwrap();
        (encoder.commands, issued)
    }

    fn scene(objects: u32, meshlets: u32) -> SceneCounts {
        SceneCounts { objects, meshlets, light_capacity: 4, geometry_bytes: 256 }
    }

    fn position(commands: &[Command], predicate: impl Fn(&Command) -> bool) -> usize {
        commands.iter().position(predicate).expect("command not recorded")
    }

    #[test]
    fn test_passes_run_in_fixed_order() {
        let (commands, issued) = record(scene(10, 40));
        assert_eq!(issued, PassSet::all());

        let order: Vec<Pass> = commands.iter().filter_map(Command::pass).collect();
        assert_eq!(order, Pass::ALL.to_vec());
        assert_eq!(commands.first(), Some(&Command::Begin));
        assert_eq!(commands.last(), Some(&Command::End));
    }

    #[test]
    fn test_frame_is_wrapped_in_swapchain_transitions() {
        let (commands, _) = record(scene(3, 3));
        let Command::Barrier { images, .. } = &commands[1] else {
            panic!("first command after begin must be a barrier");
        };
        let swapchain = images.iter().find(|b| b.target == ImageTarget::Swapchain).unwrap();
        assert_eq!(swapchain.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(swapchain.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let Command::Barrier { images, .. } = &commands[commands.len() - 2] else {
            panic!("last command before end must be a barrier");
        };
        assert_eq!(images[0].target, ImageTarget::Swapchain);
        assert_eq!(images[0].new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_culling_output_is_fenced_before_first_indirect_draw() {
        for objects in [1, 255, 256, 1000] {
            let (commands, _) = record(scene(objects, 8));
            let cull = position(&commands, |c| c.pass() == Some(Pass::CullObjects));
            let draw = position(&commands, |c| c.pass() == Some(Pass::MeshletVisibility));

            for kind in [RegionKind::IndirectDraws, RegionKind::DrawCount] {
                let fenced = commands[cull..draw].iter().any(|c| {
                    c.orders_buffer(kind, vk::PipelineStageFlags2::COMPUTE_SHADER, vk::PipelineStageFlags2::DRAW_INDIRECT)
                });
                assert!(fenced, "{} not fenced for {objects} objects", kind.name());
            }
        }
    }

    #[test]
    fn test_culling_barrier_is_scoped_to_its_regions() {
        let (commands, _) = record(scene(4, 4));
        let cull = position(&commands, |c| c.pass() == Some(Pass::CullObjects));
        let Command::Barrier { buffers, images } = &commands[cull + 1] else {
            panic!("culling must be followed by a barrier");
        };
        assert!(images.is_empty());
        let layout = SceneLayout::compute(scene(4, 4));
        for barrier in buffers {
            assert!(!barrier.range.overlaps(&layout.region(RegionKind::Objects)));
            assert!(!barrier.range.overlaps(&layout.region(RegionKind::Lights)));
            assert!(!barrier.range.overlaps(&layout.region(RegionKind::Geometry)));
        }
    }

    #[test]
    fn test_visibility_output_is_fenced_before_prepass() {
        let (commands, _) = record(scene(4, 16));
        let visibility = position(&commands, |c| c.pass() == Some(Pass::MeshletVisibility));
        let prepass = position(&commands, |c| c.pass() == Some(Pass::DepthPrepass));
        assert!(commands[visibility..prepass].iter().any(|c| c.orders_buffer(
            RegionKind::VisibleMeshlets,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::PipelineStageFlags2::DRAW_INDIRECT
        )));
    }

    #[test]
    fn test_cluster_volume_is_fenced_before_shading() {
        let (commands, _) = record(scene(4, 16));
        let cluster = position(&commands, |c| c.pass() == Some(Pass::Cluster));
        let shading = position(&commands, |c| c.pass() == Some(Pass::Shading));
        let fenced = commands[cluster..shading].iter().any(|c| match c {
            Command::Barrier { images, .. } => images.iter().any(|b| {
                b.target == ImageTarget::ClusterVolume
                    && b.src.stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER)
                    && b.dst.stage.contains(vk::PipelineStageFlags2::FRAGMENT_SHADER)
            }),
            _ => false,
        });
        assert!(fenced);
    }

    #[test]
    fn test_draws_read_their_command_regions() {
        let counts = scene(7, 21);
        let layout = SceneLayout::compute(counts);
        let (commands, _) = record(counts);
        let draws: Vec<&Command> = commands.iter().filter(|c| matches!(c, Command::Draw { .. })).collect();

        assert_eq!(
            draws[0],
            &Command::Draw {
                pass: Pass::MeshletVisibility,
                commands: layout.region(RegionKind::IndirectDraws),
                count: layout.region(RegionKind::DrawCount),
                max_draws: 7,
            }
        );
        for draw in &draws[1..] {
            let Command::Draw { commands, count, max_draws, .. } = draw else { unreachable!() };
            assert_eq!(*commands, layout.visible_meshlet_draws());
            assert_eq!(*count, layout.visible_meshlet_counter());
            assert_eq!(*max_draws, 21);
        }
    }

    #[test]
    fn test_culling_workgroups_round_up() {
        let (commands, _) = record(scene(257, 1));
        assert!(commands.contains(&Command::Dispatch { pass: Pass::CullObjects, workgroups: [2, 1, 1] }));
        assert!(commands.contains(&Command::Dispatch { pass: Pass::Cluster, workgroups: [9, 9, 9] }));
    }

    #[test]
    fn test_empty_scene_records_zero_sized_work() {
        let (commands, issued) = record(SceneCounts::default());
        assert!(!issued.contains(PassSet::CULL_OBJECTS));
        assert!(issued.contains(PassSet::CLUSTER));
        for command in &commands {
            if let Command::Draw { max_draws, .. } = command {
                assert_eq!(*max_draws, 0);
            }
            if let Command::Barrier { buffers, .. } = command {
                assert!(buffers.iter().all(|b| !b.range.is_empty()));
            }
        }
    }

    #[test]
    fn test_depth_attachment_use() {
        let (commands, _) = record(scene(1, 1));
        let scopes: Vec<RenderTargets> = commands
            .iter()
            .filter_map(|c| match c {
                Command::BeginRendering(targets) => Some(*targets),
                _ => None,
            })
            .collect();
        assert_eq!(scopes.len(), 3);
        assert_eq!(scopes[0].color, None);
        assert_eq!(scopes[1].depth, AttachmentLoad::Clear);
        assert_eq!(scopes[2], RenderTargets { color: Some(AttachmentLoad::Clear), depth: AttachmentLoad::Load });
    }
}
