//! # Cluster Engine
//!
//! GPU-driven clustered-forward frame orchestration on Vulkan.
//!
//! The engine sequences per-frame GPU work across compute and graphics
//! stages, keeps a small ring of frames in flight, and orders every write
//! into the shared scene buffer before the pass that reads it.
//!
//! ## Features
//!
//! - **Scene Buffer**: one allocation partitioned into typed regions
//! - **Frame Ring**: timeline-semaphore pacing with two frames in flight
//! - **Command Sequencer**: clustering, culling, meshlet visibility, depth
//!   prepass and shading with explicit `synchronization2` barriers
//! - **Presentation Loop**: acquire, record, submit, present
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cluster_engine::prelude::*;
//!
//! let mut renderer = RenderContext::init("Clustered Forward", 1280, 720);
//! renderer.add_light([0.0, 4.0, 0.0], [1.0, 0.9, 0.8]);
//!
//! while !renderer.window().should_close() {
//!     renderer.window_mut().poll_events();
//!     renderer.draw_frame();
//! }
//!
//! renderer.shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigError};
    pub use crate::core::config::{RendererConfig, ShaderConfig};
    pub use crate::foundation::math::{Mat4, Vec3};
    pub use crate::render::scene::{LightRecord, ObjectRecord, SceneGeometry};
    pub use crate::render::{RenderContext, VulkanError, VulkanResult};
}
