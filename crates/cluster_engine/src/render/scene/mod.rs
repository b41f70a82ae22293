//! Scene data: buffer layout, GPU records and the light list

pub mod layout;
pub mod lights;
pub mod records;

pub use layout::{Region, RegionKind, SceneCounts, SceneLayout};
pub use lights::{LightList, LightPush};
pub use records::{DrawIndexedIndirect, LightRecord, ObjectRecord, PushConstants, SceneGeometry};
