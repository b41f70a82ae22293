//! # Renderer Configuration
//!
//! Settings for the clustered-forward renderer: window, frame pacing,
//! cluster grid, workgroup sizes and the SPIR-V files for each pass.
//!
//! Everything has a default, so a config file only needs the keys it
//! changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};
use crate::render::frame::FRAMES_IN_FLIGHT;

/// Directories searched for compiled shaders, in order
pub const SHADER_SEARCH_DIRS: [&str; 5] = [
    "target/shaders/",
    "shaders/",
    "resources/shaders/",
    "../shaders/",
    "./",
];

/// # Shader Configuration
///
/// One SPIR-V file per shader stage. The depth prepass is depth-only and has
/// no fragment stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Light clustering compute shader
    pub cluster_comp: String,
    /// Object culling compute shader
    pub object_comp: String,
    /// Meshlet visibility vertex shader
    pub meshlet_vert: String,
    /// Meshlet visibility fragment shader
    pub meshlet_frag: String,
    /// Depth prepass vertex shader
    pub zprepass_vert: String,
    /// Shading vertex shader
    pub main_vert: String,
    /// Shading fragment shader
    pub main_frag: String,
}

impl ShaderConfig {
    /// File names expected for each stage
    pub const FILE_NAMES: [&'static str; 7] = [
        "cluster.comp.spv",
        "object.comp.spv",
        "meshlet.vert.spv",
        "meshlet.frag.spv",
        "zprepass.vert.spv",
        "main.vert.spv",
        "main.frag.spv",
    ];

    /// Use every stage from one directory
    pub fn in_directory(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let path = |name: &str| dir.join(name).to_string_lossy().into_owned();
        let [cluster, object, meshlet_v, meshlet_f, zprepass, main_v, main_f] = Self::FILE_NAMES;
        Self {
            cluster_comp: path(cluster),
            object_comp: path(object),
            meshlet_vert: path(meshlet_v),
            meshlet_frag: path(meshlet_f),
            zprepass_vert: path(zprepass),
            main_vert: path(main_v),
            main_frag: path(main_f),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Each stage is looked up in [`SHADER_SEARCH_DIRS`]; a stage that is not
    /// found anywhere keeps a `shaders/` path so the load error names it.
    pub fn with_path_resolution() -> Self {
        let resolve = |name: &str| {
            SHADER_SEARCH_DIRS
                .iter()
                .map(|dir| format!("{dir}{name}"))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("shaders/{name}"))
        };
        let [cluster, object, meshlet_v, meshlet_f, zprepass, main_v, main_f] = Self::FILE_NAMES;
        Self {
            cluster_comp: resolve(cluster),
            object_comp: resolve(object),
            meshlet_vert: resolve(meshlet_v),
            meshlet_frag: resolve(meshlet_f),
            zprepass_vert: resolve(zprepass),
            main_vert: resolve(main_v),
            main_frag: resolve(main_f),
        }
    }

    /// All configured paths, in stage order
    pub fn paths(&self) -> [&str; 7] {
        [
            &self.cluster_comp,
            &self.object_comp,
            &self.meshlet_vert,
            &self.meshlet_frag,
            &self.zprepass_vert,
            &self.main_vert,
            &self.main_frag,
        ]
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = self
            .paths()
            .into_iter()
            .filter(|path| !Path::new(path).exists())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!("Shaders not found: {}", missing.join(", "))))
        }
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution()
    }
}

/// # Renderer Configuration
///
/// Everything `RenderContext` needs at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Window title
    pub window_title: String,
    /// Initial window width in pixels
    pub window_width: u32,
    /// Initial window height in pixels
    pub window_height: u32,
    /// Frames in flight; the ring is fixed at compile time, so this must match it
    pub frames_in_flight: usize,
    /// Cluster volume resolution (x, y, z)
    pub cluster_resolution: [u32; 3],
    /// Local workgroup size of the clustering compute shader
    pub cluster_local_size: [u32; 3],
    /// Local workgroup size of the culling compute shader
    pub cull_local_size: u32,
    /// Bound for swapchain acquisition and frame-slot waits, in nanoseconds
    pub timeout_ns: u64,
    /// Light slots reserved before the first growth
    pub initial_light_capacity: u32,
    /// Whether to enable Vulkan validation layers (auto-detected when unset)
    pub enable_validation: Option<bool>,
    /// Shader configuration
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Create a configuration with the given window title
    pub fn new(window_title: impl Into<String>) -> Self {
        Self {
            window_title: window_title.into(),
            ..Self::default()
        }
    }

    /// Set the window size
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the cluster volume resolution
    pub fn with_cluster_resolution(mut self, resolution: [u32; 3]) -> Self {
        self.cluster_resolution = resolution;
        self
    }

    /// Set the acquire / slot-wait timeout
    pub fn with_timeout_ns(mut self, timeout_ns: u64) -> Self {
        self.timeout_ns = timeout_ns;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Resolved validation setting: explicit value, or on in debug builds
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Workgroups needed to cover the cluster volume
    pub fn cluster_workgroups(&self) -> [u32; 3] {
        [0, 1, 2].map(|axis| self.cluster_resolution[axis].div_ceil(self.cluster_local_size[axis]))
    }

    /// Validate the configuration
    ///
    /// Shader files are checked separately when they are loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Invalid(reason.to_string()));

        if self.application_name.is_empty() {
            return invalid("application name cannot be empty");
        }
        if self.window_width == 0 || self.window_height == 0 {
            return invalid("window size must be non-zero");
        }
        if self.frames_in_flight != FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid(format!(
                "frames_in_flight must be {FRAMES_IN_FLIGHT}, got {}",
                self.frames_in_flight
            )));
        }
        if self.cluster_resolution.contains(&0) {
            return invalid("cluster resolution must be non-zero on every axis");
        }
        if self.cluster_local_size.contains(&0) || self.cull_local_size == 0 {
            return invalid("workgroup sizes must be non-zero");
        }
        if self.timeout_ns == 0 {
            return invalid("timeout must be non-zero");
        }
        if self.initial_light_capacity == 0 {
            return invalid("initial light capacity must be at least 1");
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Clustered Forward".to_string(),
            window_title: "Clustered Forward".to_string(),
            window_width: 1280,
            window_height: 720,
            frames_in_flight: FRAMES_IN_FLIGHT,
            cluster_resolution: [9, 9, 9],
            cluster_local_size: [1, 1, 1],
            cull_local_size: 256,
            timeout_ns: 1_000_000_000,
            initial_light_capacity: 8,
            enable_validation: None,
            shaders: ShaderConfig::default(),
        }
    }
}

impl Config for RendererConfig {}
