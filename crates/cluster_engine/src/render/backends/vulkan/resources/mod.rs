//! GPU resources: buffers, images and descriptor sets

pub mod buffer;
pub mod descriptor;
pub mod image;
pub mod scene_buffer;

pub use buffer::Buffer;
pub use descriptor::{SceneDescriptorSet, SceneDescriptors};
pub use image::{DeviceImage, ImageSpec};
pub use scene_buffer::SceneBuffer;
