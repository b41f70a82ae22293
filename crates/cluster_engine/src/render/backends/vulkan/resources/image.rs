//! Device-local images: the depth attachment and the light-cluster volume

use ash::{vk, Device};

use super::buffer::find_memory_type;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Format of the shared depth attachment
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Format of the cluster volume: four `u32` words per cell
pub const CLUSTER_FORMAT: vk::Format = vk::Format::R32G32B32A32_UINT;

/// Shape and usage of an image to create
#[derive(Debug, Clone, Copy)]
pub struct ImageSpec {
    /// Texel format
    pub format: vk::Format,
    /// Size in texels
    pub extent: vk::Extent3D,
    /// 2D or 3D
    pub image_type: vk::ImageType,
    /// View type matching `image_type`
    pub view_type: vk::ImageViewType,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Aspect covered by the view
    pub aspect: vk::ImageAspectFlags,
}

impl ImageSpec {
    /// Depth attachment matching the swapchain extent
    pub fn depth(extent: vk::Extent2D) -> Self {
        Self {
            format: DEPTH_FORMAT,
            extent: vk::Extent3D { width: extent.width, height: extent.height, depth: 1 },
            image_type: vk::ImageType::TYPE_2D,
            view_type: vk::ImageViewType::TYPE_2D,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
        }
    }

    /// 3D storage image the clustering pass fills
    pub fn cluster_volume(resolution: [u32; 3]) -> Self {
        Self {
            format: CLUSTER_FORMAT,
            extent: vk::Extent3D { width: resolution[0], height: resolution[1], depth: resolution[2] },
            image_type: vk::ImageType::TYPE_3D,
            view_type: vk::ImageViewType::TYPE_3D,
            usage: vk::ImageUsageFlags::STORAGE,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// Subresource range of the single mip and layer
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

/// Image, memory and view with RAII cleanup
pub struct DeviceImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    spec: ImageSpec,
}

impl DeviceImage {
    /// Create a new image in device-local memory
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        spec: ImageSpec,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(spec.image_type)
            .format(spec.format)
            .extent(spec.extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(spec.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(VulkanError::api("vkCreateImage"))?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let Some(memory_type_index) = find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) else {
            unsafe { device.destroy_image(image, None) };
            return Err(VulkanError::NoSuitableMemoryType);
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(result) => {
                unsafe { device.destroy_image(image, None) };
                return Err(VulkanError::api("vkAllocateMemory")(result));
            }
        };

        let mut result = Self {
            device,
            image,
            memory,
            view: vk::ImageView::null(),
            spec,
        };

        unsafe {
            result
                .device
                .bind_image_memory(image, memory, 0)
                .map_err(VulkanError::api("vkBindImageMemory"))?;
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(spec.view_type)
            .format(spec.format)
            .subresource_range(spec.subresource_range());
        result.view = unsafe {
            result
                .device
                .create_image_view(&view_info, None)
                .map_err(VulkanError::api("vkCreateImageView"))?
        };

        log::debug!(
            "Created {:?} image {}x{}x{}",
            spec.format,
            spec.extent.width,
            spec.extent.height,
            spec.extent.depth
        );
        Ok(result)
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View over the whole image
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// What the image was created with
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }
}

impl Drop for DeviceImage {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
            }
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_volume_is_a_3d_storage_image() {
        let spec = ImageSpec::cluster_volume([9, 9, 9]);
        assert_eq!(spec.image_type, vk::ImageType::TYPE_3D);
        assert_eq!(spec.extent.depth, 9);
        assert!(spec.usage.contains(vk::ImageUsageFlags::STORAGE));
        assert_eq!(spec.subresource_range().aspect_mask, vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_depth_matches_swapchain_extent() {
        let spec = ImageSpec::depth(vk::Extent2D { width: 640, height: 480 });
        assert_eq!(spec.format, DEPTH_FORMAT);
        assert_eq!((spec.extent.width, spec.extent.height, spec.extent.depth), (640, 480, 1));
        assert_eq!(spec.subresource_range().aspect_mask, vk::ImageAspectFlags::DEPTH);
    }
}
