//! Rendering: shaders, the pipeline set and command recording

pub mod commands;
pub mod pipeline_set;
pub mod shader;

pub use commands::{CommandPool, FrameImages, VulkanEncoder};
pub use pipeline_set::{AttachmentFormats, PipelineSet};
pub use shader::ShaderModule;
