//! Vulkan implementation of the frame loop backend
//!
//! Owns every GPU object the frame loop touches. Fields are declared in
//! teardown order: scene buffers and pipelines go first, then per-frame
//! state, the swapchain, and finally the device and window.

use ash::vk;

use super::initialization::{VulkanContext, Window};
use super::rendering::{AttachmentFormats, CommandPool, FrameImages, PipelineSet, VulkanEncoder};
use super::resources::image::DEPTH_FORMAT;
use super::resources::{DeviceImage, ImageSpec, SceneBuffer, SceneDescriptors};
use super::state::{FrameSlots, Swapchain};
use super::{VulkanError, VulkanResult};
use crate::core::config::RendererConfig;
use crate::render::fatal::fatal;
use crate::render::api::{FrameBackend, PresentStatus, RecordFn, SceneStorage, SceneUpload, Submission};
use crate::render::frame::{CompletionTimeline, RetirementQueue, SlotId, FRAMES_IN_FLIGHT};
use crate::render::scene::{LightRecord, SceneLayout};

/// GPU backend over one Vulkan 1.3 device and a glfw window
pub struct VulkanBackend {
    retired: RetirementQueue<SceneBuffer>,
    scene: Option<SceneBuffer>,
    pipelines: PipelineSet,
    descriptors: SceneDescriptors,
    cluster_volume: DeviceImage,
    depth: DeviceImage,
    slots: FrameSlots,
    // Owns the slots' command buffers
    _command_pool: CommandPool,
    swapchain: Swapchain,
    context: VulkanContext,
    window: Window,
}

impl VulkanBackend {
    /// Create a new backend rendering into `window`
    pub fn new(mut window: Window, config: &RendererConfig) -> VulkanResult<Self> {
        let context = VulkanContext::new(&mut window, &config.application_name, config.validation_enabled())?;
        let device = context.raw_device();
        let memory_properties = context.physical_device.memory_properties;

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(&context, vk::Extent2D { width, height })?;

        let command_pool = CommandPool::new(device.clone(), context.device.queue_family)?;
        let slots = FrameSlots::new(&device, &command_pool, swapchain.image_count())?;

        let depth = DeviceImage::new(device.clone(), &memory_properties, ImageSpec::depth(swapchain.extent()))?;
        let cluster_volume = DeviceImage::new(
            device.clone(),
            &memory_properties,
            ImageSpec::cluster_volume(config.cluster_resolution),
        )?;

        let descriptors = SceneDescriptors::new(device.clone())?;
        let pipelines = PipelineSet::new(
            device,
            descriptors.layout(),
            config,
            AttachmentFormats {
                color: swapchain.format(),
                depth: DEPTH_FORMAT,
            },
        )?;

        log::info!(
            "Vulkan backend ready: {} frames in flight, {} swapchain images, cluster volume {:?}",
            FRAMES_IN_FLIGHT,
            swapchain.image_count(),
            config.cluster_resolution
        );

        Ok(Self {
            retired: RetirementQueue::new(),
            scene: None,
            pipelines,
            descriptors,
            cluster_volume,
            depth,
            slots,
            _command_pool: command_pool,
            swapchain,
            context,
            window,
        })
    }

    /// The window being rendered to
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Mutable access to the window, for event polling
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    /// The device and queue
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    fn current_scene(&self) -> VulkanResult<&SceneBuffer> {
        self.scene.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "No scene buffer has been uploaded".to_string(),
        })
    }
}

impl CompletionTimeline for VulkanBackend {
    fn completed_value(&self, slot: SlotId) -> VulkanResult<u64> {
        self.slots.completed_value(slot)
    }

    fn wait_for_value(&self, slot: SlotId, value: u64, timeout_ns: u64) -> VulkanResult<()> {
        self.slots.wait_for_value(slot, value, timeout_ns)
    }
}

impl FrameBackend for VulkanBackend {
    fn acquire_image(&mut self, slot: SlotId, timeout_ns: u64) -> VulkanResult<u32> {
        let signal = self.slots.slot(slot).image_acquired.handle();
        let (image_index, _suboptimal) = self.swapchain.acquire_next_image(timeout_ns, signal)?;
        Ok(image_index)
    }

    fn record_commands(&mut self, slot: SlotId, image_index: u32, record: &mut RecordFn<'_>) -> VulkanResult<()> {
        let scene = self.current_scene()?;
        let images = FrameImages::new(
            self.swapchain.image(image_index),
            self.swapchain.image_view(image_index),
            &self.depth,
            &self.cluster_volume,
            self.swapchain.extent(),
        );
        let mut encoder = VulkanEncoder::new(
            &self.context.device.device,
            self.slots.slot(slot).command_buffer,
            &self.pipelines,
            scene,
            images,
        );
        record(&mut encoder)
    }

    fn submit(&mut self, submission: &Submission) -> VulkanResult<()> {
        let slot = self.slots.slot(submission.slot);

        let mut waits = vec![vk::SemaphoreSubmitInfo::builder()
            .semaphore(slot.image_acquired.handle())
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .build()];
        if let Some(previous) = submission.wait_previous {
            waits.push(
                vk::SemaphoreSubmitInfo::builder()
                    .semaphore(self.slots.slot(previous.slot).timeline.handle())
                    .value(previous.value)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                    .build(),
            );
        }

        let signals = [
            vk::SemaphoreSubmitInfo::builder()
                .semaphore(slot.timeline.handle())
                .value(submission.signal_value)
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                .build(),
            vk::SemaphoreSubmitInfo::builder()
                .semaphore(self.slots.render_finished(submission.image_index)?.handle())
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                .build(),
        ];

        let command_buffers = [vk::CommandBufferSubmitInfo::builder()
            .command_buffer(slot.command_buffer)
            .build()];

        let submit_info = vk::SubmitInfo2::builder()
            .wait_semaphore_infos(&waits)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signals);

        log::trace!(
            "Submitting slot {} image {} -> timeline {}",
            submission.slot.index(),
            submission.image_index,
            submission.signal_value
        );

        unsafe {
            self.context
                .device
                .device
                .queue_submit2(self.context.queue(), &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::api("vkQueueSubmit2"))
        }
    }

    fn present(&mut self, _slot: SlotId, image_index: u32) -> VulkanResult<PresentStatus> {
        let wait = self.slots.render_finished(image_index)?.handle();
        let suboptimal = self.swapchain.present(self.context.queue(), image_index, wait)?;
        Ok(if suboptimal {
            PresentStatus::Suboptimal
        } else {
            PresentStatus::Optimal
        })
    }

    fn wait_idle(&mut self) -> VulkanResult<()> {
        self.context.wait_idle()
    }
}

impl SceneStorage for VulkanBackend {
    fn upload_scene(
        &mut self,
        layout: &SceneLayout,
        scene: SceneUpload<'_>,
        in_flight: [u64; FRAMES_IN_FLIGHT],
    ) -> VulkanResult<()> {
        // Return finished sets to their pools before allocating another one
        self.retired.collect(&self.slots)?;

        let buffer = SceneBuffer::new(
            self.context.raw_device(),
            &self.context.physical_device.memory_properties,
            &mut self.descriptors,
            *layout,
            self.cluster_volume.view(),
        )?;
        buffer.upload(&scene)?;

        if let Some(previous) = self.scene.replace(buffer) {
            self.retired.retire(previous, in_flight);
        }
        Ok(())
    }

    fn write_lights(&mut self, layout: &SceneLayout, first: usize, lights: &[LightRecord]) -> VulkanResult<()> {
        let scene = self.current_scene()?;
        if scene.layout() != layout {
            return Err(VulkanError::InvalidOperation {
                reason: "Light write against a stale scene layout".to_string(),
            });
        }
        scene.write_lights(first, lights)
    }

    fn collect_retired(&mut self) -> VulkanResult<usize> {
        self.retired.collect(&self.slots)
    }

    fn release_retired(&mut self) -> usize {
        self.retired.drain_all()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        // Every field dropped after this may still be in use by the device
        if let Err(err) = self.context.wait_idle() {
            fatal("teardown", &err);
        }
    }
}
