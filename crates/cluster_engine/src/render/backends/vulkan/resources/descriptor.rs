//! Scene descriptor layout and pool
//!
//! Every pass sees the same two bindings:
//!
//! | binding | type          | contents                         |
//! |---------|---------------|----------------------------------|
//! | 0       | storage buffer| the whole scene buffer           |
//! | 1       | storage image | the light-cluster volume         |
//!
//! Each scene buffer gets its own set, allocated when the buffer is created
//! and freed when it is dropped, so a set is never rewritten while a frame
//! in flight may still be reading it. Pools are chained: when every pool is
//! full another one is created, so replacing the scene never has to wait
//! for retired buffers.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Binding of the scene storage buffer
pub const SCENE_BUFFER_BINDING: u32 = 0;

/// Binding of the cluster storage image
pub const CLUSTER_VOLUME_BINDING: u32 = 1;

/// Sets one pool holds
pub const SETS_PER_POOL: u32 = 8;

/// Stages that read the scene bindings
pub fn scene_stages() -> vk::ShaderStageFlags {
    vk::ShaderStageFlags::COMPUTE | vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
}

/// Whether an allocation failed only because the pool has no room left
pub fn is_pool_exhausted(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL
    )
}

/// Layout and pools for the per-buffer scene descriptor sets
pub struct SceneDescriptors {
    device: Device,
    layout: vk::DescriptorSetLayout,
    pools: Vec<vk::DescriptorPool>,
}

impl SceneDescriptors {
    /// Create a new layout and a first pool of [`SETS_PER_POOL`] sets
    pub fn new(device: Device) -> VulkanResult<Self> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::builder()
                .binding(SCENE_BUFFER_BINDING)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(scene_stages())
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(CLUSTER_VOLUME_BINDING)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE | vk::ShaderStageFlags::FRAGMENT)
                .build(),
        ];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::api("vkCreateDescriptorSetLayout"))?
        };

        let pool = match create_pool(&device) {
            Ok(pool) => pool,
            Err(err) => {
                unsafe { device.destroy_descriptor_set_layout(layout, None) };
                return Err(err);
            }
        };

        Ok(Self {
            device,
            layout,
            pools: vec![pool],
        })
    }

/// Layout shared by every pipeline
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Allocate a set pointing at `buffer` and `cluster_view`
    ///
    /// Tries the newest pool first and chains a new one when all are full.
    pub fn allocate(&mut self, buffer: vk::Buffer, cluster_view: vk::ImageView) -> VulkanResult<SceneDescriptorSet> {
        let (pool, set) = self.allocate_set()?;

        let buffer_info = [vk::DescriptorBufferInfo::builder()
            .buffer(buffer)
            .offset(0)
            .range(vk::WHOLE_SIZE)
            .build()];
        let image_info = [vk::DescriptorImageInfo::builder()
            .image_view(cluster_view)
            .image_layout(vk::ImageLayout::GENERAL)
            .build()];
        let writes = [
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(SCENE_BUFFER_BINDING)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&buffer_info)
                .build(),
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(CLUSTER_VOLUME_BINDING)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .image_info(&image_info)
                .build(),
        ];
        unsafe { self.device.update_descriptor_sets(&writes, &[]) };

        Ok(SceneDescriptorSet {
            device: self.device.clone(),
            pool,
            set,
        })
    }

    fn allocate_set(&mut self) -> VulkanResult<(vk::DescriptorPool, vk::DescriptorSet)> {
        for &pool in self.pools.iter().rev() {
            match self.allocate_from(pool) {
                Ok(set) => return Ok((pool, set)),
                Err(result) if is_pool_exhausted(result) => continue,
                Err(result) => return Err(VulkanError::api("vkAllocateDescriptorSets")(result)),
            }
        }

        let pool = create_pool(&self.device)?;
        self.pools.push(pool);
        log::debug!("Scene descriptor pools full, chained pool {}", self.pools.len());
        let set = self
            .allocate_from(pool)
            .map_err(VulkanError::api("vkAllocateDescriptorSets"))?;
        Ok((pool, set))
    }

    fn allocate_from(&self, pool: vk::DescriptorPool) -> Result<vk::DescriptorSet, vk::Result> {
        let layouts = [self.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info)? };
        sets.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }
}

impl Drop for SceneDescriptors {
    fn drop(&mut self) {
        unsafe {
            for pool in self.pools.drain(..) {
                self.device.destroy_descriptor_pool(pool, None);
            }
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

fn create_pool(device: &Device) -> VulkanResult<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(SETS_PER_POOL)
            .build(),
        vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::STORAGE_IMAGE)
            .descriptor_count(SETS_PER_POOL)
            .build(),
    ];
    let pool_info = vk::DescriptorPoolCreateInfo::builder()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .max_sets(SETS_PER_POOL)
        .pool_sizes(&pool_sizes);
    unsafe {
        device
            .create_descriptor_pool(&pool_info, None)
            .map_err(VulkanError::api("vkCreateDescriptorPool"))
    }
}

/// One allocated scene set, returned to the pool on drop
///
/// Must be dropped before the [`SceneDescriptors`] it came from.
pub struct SceneDescriptorSet {
    device: Device,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

impl SceneDescriptorSet {
    /// Set handle
    pub fn handle(&self) -> vk::DescriptorSet {
        self.set
    }
}

impl Drop for SceneDescriptorSet {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.free_descriptor_sets(self.pool, &[self.set]);
        }
    }
}
