//! The scene buffer: one allocation holding every region of a [`SceneLayout`]

use ash::{vk, Device};

use super::buffer::Buffer;
use super::descriptor::{SceneDescriptorSet, SceneDescriptors};
use crate::render::api::SceneUpload;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::scene::{LightRecord, RegionKind, SceneLayout};

/// Usage of the scene buffer: shader storage, indirect commands and indices
pub fn scene_buffer_usage() -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::INDIRECT_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER
}

/// A scene buffer, its layout and the descriptor set that points at it
///
/// Field order matters: the set is returned to the pool before the buffer it
/// references is destroyed.
pub struct SceneBuffer {
    descriptor_set: SceneDescriptorSet,
    buffer: Buffer,
    layout: SceneLayout,
}

impl SceneBuffer {
    /// Create a new scene buffer sized for `layout`
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        descriptors: &mut SceneDescriptors,
        layout: SceneLayout,
        cluster_view: vk::ImageView,
    ) -> VulkanResult<Self> {
        let buffer = Buffer::new(device, memory_properties, layout.total_size(), scene_buffer_usage())?;
        let descriptor_set = descriptors.allocate(buffer.handle(), cluster_view)?;
        Ok(Self { descriptor_set, buffer, layout })
    }

    /// Fill every region from `scene`
    ///
    /// Counters and output regions are zeroed, so the first frame reads a
    /// well-defined buffer.
    pub fn upload(&self, scene: &SceneUpload<'_>) -> VulkanResult<()> {
        let counts = self.layout.counts();
        if scene.objects.len() != counts.objects as usize {
            return Err(mismatch("objects", scene.objects.len(), counts.objects as usize));
        }
        if scene.lights.len() > counts.light_capacity as usize {
            return Err(mismatch("lights", scene.lights.len(), counts.light_capacity as usize));
        }
        if scene.geometry.byte_size() != counts.geometry_bytes {
            return Err(mismatch(
                "geometry bytes",
                scene.geometry.byte_size() as usize,
                counts.geometry_bytes as usize,
            ));
        }

        for kind in [RegionKind::DrawCount, RegionKind::IndirectDraws, RegionKind::VisibleMeshlets] {
            let region = self.layout.region(kind);
            self.buffer.zero_bytes(region.offset, region.size as usize)?;
        }

        let objects = self.layout.region(RegionKind::Objects);
        self.buffer.write_bytes(objects.offset, bytemuck::cast_slice(scene.objects))?;

        let lights = self.layout.region(RegionKind::Lights);
        self.buffer.zero_bytes(lights.offset, lights.size as usize)?;
        self.write_lights(0, scene.lights)?;

        let geometry = self.layout.region(RegionKind::Geometry);
        let mut staging = vec![0u8; scene.geometry.byte_size() as usize];
        scene.geometry.write_into(&mut staging);
        self.buffer.write_bytes(geometry.offset, &staging)?;

        log::debug!(
            "Uploaded scene: {} objects, {} meshlets, {}/{} lights, {} geometry bytes ({} total)",
            counts.objects,
            counts.meshlets,
            scene.lights.len(),
            counts.light_capacity,
            counts.geometry_bytes,
            self.layout.total_size()
        );
        Ok(())
    }

    /// Overwrite light slots starting at `first`
    pub fn write_lights(&self, first: usize, lights: &[LightRecord]) -> VulkanResult<()> {
        let capacity = self.layout.counts().light_capacity as usize;
        if first + lights.len() > capacity {
            return Err(mismatch("light slots", first + lights.len(), capacity));
        }
        if lights.is_empty() {
            return Ok(());
        }
        let offset = self.layout.light_slot(first as u32).offset;
        self.buffer.write_bytes(offset, bytemuck::cast_slice(lights))
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Descriptor set bound for every pass
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set.handle()
    }

    /// Layout the buffer was allocated for
    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }
}

fn mismatch(what: &str, got: usize, expected: usize) -> VulkanError {
    VulkanError::InvalidOperation {
        reason: format!("Scene buffer holds {expected} {what}, got {got}"),
    }
}
