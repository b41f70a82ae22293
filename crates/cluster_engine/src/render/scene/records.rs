//! GPU record types stored in the scene buffer
//!
//! All records are `#[repr(C)]`, std430-compatible and [`bytemuck::Pod`], so
//! they can be copied into mapped memory as raw bytes.

use bytemuck::{Pod, Zeroable};

use super::layout::{Region, SceneLayout};
use crate::foundation::math::{to_columns, Mat4};

/// One renderable object
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectRecord {
    /// World-space position
    pub position: [f32; 3],
    /// Bounding sphere radius used by culling
    pub radius: f32,
    /// Orientation quaternion (x, y, z, w)
    pub orientation: [f32; 4],
    /// First meshlet owned by this object
    pub first_meshlet: u32,
    /// Number of meshlets owned by this object
    pub meshlet_count: u32,
    /// Keeps the record a multiple of 16 bytes
    pub _pad: [u32; 2],
}

impl ObjectRecord {
    /// Object at `position` with identity orientation
    pub fn new(position: [f32; 3], radius: f32, first_meshlet: u32, meshlet_count: u32) -> Self {
        Self {
            position,
            radius,
            orientation: [0.0, 0.0, 0.0, 1.0],
            first_meshlet,
            meshlet_count,
            _pad: [0; 2],
        }
    }

    /// Replace the orientation quaternion
    pub fn with_orientation(mut self, orientation: [f32; 4]) -> Self {
        self.orientation = orientation;
        self
    }
}

/// Point light
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightRecord {
    /// Position; `w` is unused
    pub position: [f32; 4],
    /// Color; `w` is unused
    pub color: [f32; 4],
}

impl LightRecord {
    /// Light at `position` with `color`
    pub fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position: [position[0], position[1], position[2], 1.0],
            color: [color[0], color[1], color[2], 1.0],
        }
    }
}

/// Byte-for-byte `VkDrawIndexedIndirectCommand`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirect {
    /// Indices per instance
    pub index_count: u32,
    /// Instances to draw
    pub instance_count: u32,
    /// First index in the bound index buffer
    pub first_index: u32,
    /// Added to each index before vertex fetch
    pub vertex_offset: i32,
    /// First instance id
    pub first_instance: u32,
}

/// Push-constant block shared by all five passes
///
/// The counts let shaders rebuild the scene layout without extra bindings:
/// `[objects, meshlets, lights, light_capacity]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PushConstants {
    /// Projection matrix, column major
    pub projection: [[f32; 4]; 4],
    /// View matrix, column major
    pub view: [[f32; 4]; 4],
    /// Object, meshlet, light and light-capacity counts
    pub counts: [u32; 4],
}

impl PushConstants {
    /// Size of the block in bytes
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// Pack camera matrices and scene counts
    pub fn new(projection: &Mat4, view: &Mat4, layout: &SceneLayout, light_count: u32) -> Self {
        let counts = layout.counts();
        Self {
            projection: to_columns(projection),
            view: to_columns(view),
            counts: [counts.objects, counts.meshlets, light_count, counts.light_capacity],
        }
    }

    /// Number of objects the culling pass walks
    pub const fn object_count(&self) -> u32 {
        self.counts[0]
    }

    /// Number of meshlets the visibility pass may emit
    pub const fn meshlet_count(&self) -> u32 {
        self.counts[1]
    }

    /// Raw bytes for `vkCmdPushConstants`
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

const _: () = assert!(std::mem::size_of::<ObjectRecord>() == 48);
const _: () = assert!(std::mem::size_of::<LightRecord>() == 32);
const _: () = assert!(std::mem::size_of::<DrawIndexedIndirect>() == 20);
const _: () = assert!(std::mem::size_of::<PushConstants>() == 144);

/// Vertex and index data uploaded once into the geometry region
///
/// Vertex bytes are opaque to the renderer; indices follow them directly and
/// are bound as a `u32` index buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneGeometry {
    vertices: Vec<u8>,
    indices: Vec<u32>,
}

impl SceneGeometry {
    /// Wrap vertex bytes and indices, padding vertices to four bytes
    pub fn new(vertices: impl Into<Vec<u8>>, indices: impl Into<Vec<u32>>) -> Self {
        let mut vertices = vertices.into();
        let padded = vertices.len().next_multiple_of(4);
        vertices.resize(padded, 0);
        Self { vertices, indices: indices.into() }
    }

    /// Typed vertices, converted to bytes
    pub fn from_vertices<V: Pod>(vertices: &[V], indices: impl Into<Vec<u32>>) -> Self {
        Self::new(bytemuck::cast_slice::<V, u8>(vertices).to_vec(), indices)
    }

    /// Geometry with no vertices or indices
    pub fn empty() -> Self {
        Self::default()
    }

    /// Padded vertex bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    /// Index data
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of indices
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Bytes the geometry region needs
    pub fn byte_size(&self) -> u64 {
        (self.vertices.len() + self.indices.len() * 4) as u64
    }

    /// Index bytes relative to the start of the geometry region
    pub fn index_region(&self) -> Region {
        Region::new(self.vertices.len() as u64, self.indices.len() as u64 * 4)
    }

    /// Copy vertices then indices into `dst`, which must be `byte_size()` long
    pub fn write_into(&self, dst: &mut [u8]) {
        let (vertex_dst, index_dst) = dst.split_at_mut(self.vertices.len());
        vertex_dst.copy_from_slice(&self.vertices);
        index_dst.copy_from_slice(bytemuck::cast_slice(&self.indices));
    }
}
