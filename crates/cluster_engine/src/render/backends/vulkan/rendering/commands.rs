//! Command buffer management
//!
//! [`VulkanEncoder`] turns the sequencer's abstract commands into calls on
//! one slot's command buffer, resolving passes to pipelines, regions to the
//! scene buffer and image targets to the frame's images.

use ash::{vk, Device};

use super::pipeline_set::PipelineSet;
use crate::render::backends::vulkan::resources::descriptor::scene_stages;
use crate::render::backends::vulkan::resources::{DeviceImage, SceneBuffer};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::scene::{DrawIndexedIndirect, PushConstants, Region};
use crate::render::sequencer::{
    AttachmentLoad, BufferBarrier, CommandEncoder, ImageBarrier, ImageTarget, Pass, RenderTargets,
};

/// Byte stride between indirect draw records
const DRAW_STRIDE: u32 = std::mem::size_of::<DrawIndexedIndirect>() as u32;

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_create_info, None)
                .map_err(VulkanError::api("vkCreateCommandPool"))?
        };

        Ok(Self { device, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::api("vkAllocateCommandBuffers"))
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Frees every command buffer allocated from the pool
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Images one frame renders with
#[derive(Debug, Clone, Copy)]
pub struct FrameImages {
    /// Acquired swapchain image
    pub swapchain_image: vk::Image,
    /// View of the acquired swapchain image
    pub swapchain_view: vk::ImageView,
    /// Shared depth attachment
    pub depth_image: vk::Image,
    /// View of the depth attachment
    pub depth_view: vk::ImageView,
    /// Light-cluster volume
    pub cluster_image: vk::Image,
    /// Render area
    pub extent: vk::Extent2D,
}

impl FrameImages {
    /// Collect handles for one frame
    pub fn new(
        swapchain_image: vk::Image,
        swapchain_view: vk::ImageView,
        depth: &DeviceImage,
        cluster_volume: &DeviceImage,
        extent: vk::Extent2D,
    ) -> Self {
        Self {
            swapchain_image,
            swapchain_view,
            depth_image: depth.handle(),
            depth_view: depth.view(),
            cluster_image: cluster_volume.handle(),
            extent,
        }
    }

    fn image(&self, target: ImageTarget) -> vk::Image {
        match target {
            ImageTarget::Swapchain => self.swapchain_image,
            ImageTarget::Depth => self.depth_image,
            ImageTarget::ClusterVolume => self.cluster_image,
        }
    }
}

/// Aspect of the single subresource each image target has
pub fn target_aspect(target: ImageTarget) -> vk::ImageAspectFlags {
    match target {
        ImageTarget::Depth => vk::ImageAspectFlags::DEPTH,
        ImageTarget::Swapchain | ImageTarget::ClusterVolume => vk::ImageAspectFlags::COLOR,
    }
}

/// Load op for an attachment
pub fn load_op(load: AttachmentLoad) -> vk::AttachmentLoadOp {
    match load {
        AttachmentLoad::Clear => vk::AttachmentLoadOp::CLEAR,
        AttachmentLoad::Load => vk::AttachmentLoadOp::LOAD,
    }
}

/// Records one frame into a slot's command buffer
pub struct VulkanEncoder<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
    pipelines: &'a PipelineSet,
    scene: &'a SceneBuffer,
    images: FrameImages,
}

impl<'a> VulkanEncoder<'a> {
    /// Create a new encoder over `command_buffer`
    pub fn new(
        device: &'a Device,
        command_buffer: vk::CommandBuffer,
        pipelines: &'a PipelineSet,
        scene: &'a SceneBuffer,
        images: FrameImages,
    ) -> Self {
        Self {
            device,
            command_buffer,
            pipelines,
            scene,
            images,
        }
    }

    fn bind_pipeline(&mut self, pass: Pass) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                PipelineSet::bind_point(pass),
                self.pipelines.pipeline(pass),
            );
        }
    }
}

impl CommandEncoder for VulkanEncoder<'_> {
    fn begin(&mut self) -> VulkanResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::api("vkResetCommandBuffer"))?;
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::api("vkBeginCommandBuffer"))
        }
    }

    fn pipeline_barrier(&mut self, buffers: &[BufferBarrier], images: &[ImageBarrier]) {
        let buffer_barriers: Vec<vk::BufferMemoryBarrier2> = buffers
            .iter()
            .filter(|b| !b.range.is_empty())
            .map(|b| {
                vk::BufferMemoryBarrier2::builder()
                    .src_stage_mask(b.src.stage)
                    .src_access_mask(b.src.access)
                    .dst_stage_mask(b.dst.stage)
                    .dst_access_mask(b.dst.access)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(self.scene.handle())
                    .offset(b.range.offset)
                    .size(b.range.size)
                    .build()
            })
            .collect();

        let image_barriers: Vec<vk::ImageMemoryBarrier2> = images
            .iter()
            .map(|b| {
                vk::ImageMemoryBarrier2::builder()
                    .src_stage_mask(b.src.stage)
                    .src_access_mask(b.src.access)
                    .dst_stage_mask(b.dst.stage)
                    .dst_access_mask(b.dst.access)
                    .old_layout(b.old_layout)
                    .new_layout(b.new_layout)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(self.images.image(b.target))
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: target_aspect(b.target),
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .build()
            })
            .collect();

        if buffer_barriers.is_empty() && image_barriers.is_empty() {
            return;
        }

        let dependency_info = vk::DependencyInfo::builder()
            .buffer_memory_barriers(&buffer_barriers)
            .image_memory_barriers(&image_barriers);
        unsafe { self.device.cmd_pipeline_barrier2(self.command_buffer, &dependency_info) };
    }

    fn bind_scene(&mut self, push: &PushConstants) {
        let sets = [self.scene.descriptor_set()];
        unsafe {
            for bind_point in [vk::PipelineBindPoint::COMPUTE, vk::PipelineBindPoint::GRAPHICS] {
                self.device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    bind_point,
                    self.pipelines.layout(),
                    0,
                    &sets,
                    &[],
                );
            }
            self.device.cmd_push_constants(
                self.command_buffer,
                self.pipelines.layout(),
                scene_stages(),
                0,
                push.as_bytes(),
            );
        }
    }

    fn bind_index_buffer(&mut self, range: Region) {
        // An empty range may sit at the very end of the buffer, which is not a
        // valid bind offset; nothing reads indices in that case.
        let offset = if range.is_empty() { 0 } else { range.offset };
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, self.scene.handle(), offset, vk::IndexType::UINT32);
        }
    }

    fn dispatch(&mut self, pass: Pass, workgroups: [u32; 3]) {
        self.bind_pipeline(pass);
        let [x, y, z] = workgroups;
        unsafe { self.device.cmd_dispatch(self.command_buffer, x, y, z) };
    }

    fn begin_rendering(&mut self, targets: RenderTargets) {
        let extent = self.images.extent;
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let color_attachments: Vec<vk::RenderingAttachmentInfo> = targets
            .color
            .map(|load| {
                vk::RenderingAttachmentInfo::builder()
                    .image_view(self.images.swapchain_view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(load_op(load))
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue { float32: [0.0, 0.0, 0.0, 1.0] },
                    })
                    .build()
            })
            .into_iter()
            .collect();

        let depth_attachment = vk::RenderingAttachmentInfo::builder()
            .image_view(self.images.depth_view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(load_op(targets.depth))
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });

        let rendering_info = vk::RenderingInfo::builder()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
            self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(self.command_buffer, 0, &[render_area]);
        }
    }

    fn draw_indexed_indirect_count(&mut self, pass: Pass, commands: Region, count: Region, max_draws: u32) {
        self.bind_pipeline(pass);
        if max_draws == 0 {
            return;
        }
        unsafe {
            self.device.cmd_draw_indexed_indirect_count(
                self.command_buffer,
                self.scene.handle(),
                commands.offset,
                self.scene.handle(),
                count.offset,
                max_draws,
                DRAW_STRIDE,
            );
        }
    }

    fn end_rendering(&mut self) {
        unsafe { self.device.cmd_end_rendering(self.command_buffer) };
    }

    fn end(&mut self) -> VulkanResult<()> {
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(VulkanError::api("vkEndCommandBuffer"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_depth_uses_the_depth_aspect() {
        assert_eq!(target_aspect(ImageTarget::Depth), vk::ImageAspectFlags::DEPTH);
        assert_eq!(target_aspect(ImageTarget::Swapchain), vk::ImageAspectFlags::COLOR);
        assert_eq!(target_aspect(ImageTarget::ClusterVolume), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_load_ops() {
        assert_eq!(load_op(AttachmentLoad::Clear), vk::AttachmentLoadOp::CLEAR);
        assert_eq!(load_op(AttachmentLoad::Load), vk::AttachmentLoadOp::LOAD);
    }
}
