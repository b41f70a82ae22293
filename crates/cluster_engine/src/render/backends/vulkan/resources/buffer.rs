//! Host-visible buffer with dedicated memory
//!
//! The scene buffer is written from the CPU and read by every pass, so it
//! lives in host-visible, host-coherent memory. Device-local memory that is
//! also mappable is preferred when the driver exposes it.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Memory properties tried first
const PREFERRED_PROPERTIES: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::DEVICE_LOCAL.as_raw()
        | vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
        | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Memory properties every mapped buffer needs
const REQUIRED_PROPERTIES: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a new mappable buffer of `size` bytes
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Buffers must be at least one byte".to_string(),
            });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::api("vkCreateBuffer"))?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = find_memory_type(memory_properties, requirements.memory_type_bits, PREFERRED_PROPERTIES)
            .or_else(|| find_memory_type(memory_properties, requirements.memory_type_bits, REQUIRED_PROPERTIES));
        let Some(memory_type_index) = memory_type_index else {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(VulkanError::NoSuitableMemoryType);
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(result) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::api("vkAllocateMemory")(result));
            }
        };

        // From here on Drop cleans up both handles
        let result = Self { device, buffer, memory, size };
        unsafe {
            result
                .device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::api("vkBindBufferMemory"))?;
        }

        log::debug!("Allocated {} byte buffer in memory type {}", size, memory_type_index);
        Ok(result)
    }

    /// Copy `data` into the buffer at `offset`
    pub fn write_bytes(&self, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len() as vk::DeviceSize;
        if offset.checked_add(len).map_or(true, |end| end > self.size) {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Write of {} bytes at {} overruns a {} byte buffer", len, offset, self.size),
            });
        }

        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, offset, len, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::api("vkMapMemory"))?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Fill `len` bytes at `offset` with zeros
    pub fn zero_bytes(&self, offset: vk::DeviceSize, len: usize) -> VulkanResult<()> {
        self.write_bytes(offset, &vec![0u8; len])
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Find memory type with required properties
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        type_filter & (1 << i) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in properties.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        properties
    }

    #[test]
    fn test_prefers_mappable_device_local_memory() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            REQUIRED_PROPERTIES,
            PREFERRED_PROPERTIES,
        ]);
        assert_eq!(find_memory_type(&properties, 0b111, PREFERRED_PROPERTIES), Some(2));
        assert_eq!(find_memory_type(&properties, 0b011, PREFERRED_PROPERTIES), None);
        assert_eq!(find_memory_type(&properties, 0b011, REQUIRED_PROPERTIES), Some(1));
    }

    #[test]
    fn test_type_filter_excludes_types() {
        let properties = memory_properties(&[REQUIRED_PROPERTIES, REQUIRED_PROPERTIES]);
        assert_eq!(find_memory_type(&properties, 0b10, REQUIRED_PROPERTIES), Some(1));
        assert_eq!(find_memory_type(&properties, 0, REQUIRED_PROPERTIES), None);
    }
}
