//! SPIR-V shader modules

use ash::{vk, Device};
use std::io::Cursor;
use std::path::Path;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Decode SPIR-V words for `pass` from file bytes
///
/// Byte-swapped modules are accepted and converted to host order.
pub fn parse_spirv(pass: &'static str, bytes: &[u8]) -> VulkanResult<Vec<u32>> {
    let unavailable = |reason: String| VulkanError::ShaderUnavailable { pass, reason };
    if bytes.is_empty() {
        return Err(unavailable("empty file".to_string()));
    }
    let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| unavailable(e.to_string()))?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&other) => Err(unavailable(format!("bad magic number {other:#010x}"))),
        None => Err(unavailable("no words".to_string())),
    }
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    pub fn from_bytes(device: Device, pass: &'static str, bytes: &[u8]) -> VulkanResult<Self> {
        let code = parse_spirv(pass, bytes)?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::api("vkCreateShaderModule"))?
        };

        Ok(Self { device, module })
    }

    /// Load shader from SPIR-V file
    pub fn from_file(device: Device, pass: &'static str, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| VulkanError::ShaderUnavailable {
            pass,
            reason: format!("{}: {}", path.display(), e),
        })?;
        log::debug!("Loaded {} shader from {} ({} bytes)", pass, path.display(), bytes.len());
        Self::from_bytes(device, pass, &bytes)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}
