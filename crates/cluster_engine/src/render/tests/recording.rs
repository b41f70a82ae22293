//! Command encoder that records calls instead of issuing them

use ash::vk;

use crate::render::backends::vulkan::VulkanResult;
use crate::render::scene::{PushConstants, Region, RegionKind};
use crate::render::sequencer::{BufferBarrier, CommandEncoder, ImageBarrier, Pass, RenderTargets};

/// One recorded encoder call
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Begin,
    Barrier {
        buffers: Vec<BufferBarrier>,
        images: Vec<ImageBarrier>,
    },
    BindScene(PushConstants),
    BindIndex(Region),
    Dispatch {
        pass: Pass,
        workgroups: [u32; 3],
    },
    BeginRendering(RenderTargets),
    Draw {
        pass: Pass,
        commands: Region,
        count: Region,
        max_draws: u32,
    },
    EndRendering,
    End,
}

impl Command {
    /// Pass issued by this command, if it is a dispatch or draw
    pub fn pass(&self) -> Option<Pass> {
        match self {
            Self::Dispatch { pass, .. } | Self::Draw { pass, .. } => Some(*pass),
            _ => None,
        }
    }

    /// True if this is a barrier ordering `kind` bytes from `src` to `dst`
    pub fn orders_buffer(&self, kind: RegionKind, src: vk::PipelineStageFlags2, dst: vk::PipelineStageFlags2) -> bool {
        match self {
            Self::Barrier { buffers, .. } => buffers.iter().any(|b| b.orders(kind, src, dst)),
            _ => false,
        }
    }
}

/// Encoder that appends every call to `commands`
#[derive(Debug, Default)]
pub struct RecordingEncoder {
    pub commands: Vec<Command>,
}

impl CommandEncoder for RecordingEncoder {
    fn begin(&mut self) -> VulkanResult<()> {
        self.commands.push(Command::Begin);
        Ok(())
    }

    fn pipeline_barrier(&mut self, buffers: &[BufferBarrier], images: &[ImageBarrier]) {
        self.commands.push(Command::Barrier {
            buffers: buffers.to_vec(),
            images: images.to_vec(),
        });
    }

    fn bind_scene(&mut self, push: &PushConstants) {
        self.commands.push(Command::BindScene(*push));
    }

    fn bind_index_buffer(&mut self, range: Region) {
        self.commands.push(Command::BindIndex(range));
    }

    fn dispatch(&mut self, pass: Pass, workgroups: [u32; 3]) {
        self.commands.push(Command::Dispatch { pass, workgroups });
    }

    fn begin_rendering(&mut self, targets: RenderTargets) {
        self.commands.push(Command::BeginRendering(targets));
    }

    fn draw_indexed_indirect_count(&mut self, pass: Pass, commands: Region, count: Region, max_draws: u32) {
        self.commands.push(Command::Draw { pass, commands, count, max_draws });
    }

    fn end_rendering(&mut self) {
        self.commands.push(Command::EndRendering);
    }

    fn end(&mut self) -> VulkanResult<()> {
        self.commands.push(Command::End);
        Ok(())
    }
}
