//! The renderer's public entry point
//!
//! `RenderContext` owns the backend, the presentation loop and the CPU copy
//! of the scene. Scene edits are staged and applied at the start of the next
//! frame, so a burst of `add_light` calls costs at most one buffer update.
//!
//! The plain methods (`init`, `add_light`, `draw_frame`, `shutdown`) treat
//! every error as fatal and abort with a diagnostic. The `try_*` variants
//! return the error instead.

use crate::core::config::RendererConfig;
use crate::foundation::math::{look_at, perspective, Mat4};
use crate::render::api::{FrameBackend, SceneStorage, SceneUpload};
use crate::render::backends::vulkan::{VulkanBackend, VulkanError, VulkanResult, Window};
use crate::render::fatal::{abort_on_error, fatal};
use crate::render::frame::FRAMES_IN_FLIGHT;
use crate::render::presenter::{FrameReport, Presenter};
use crate::render::scene::{
    LightList, LightPush, LightRecord, ObjectRecord, PushConstants, Region, RegionKind, SceneCounts, SceneGeometry, SceneLayout,
};
use crate::render::sequencer::{FrameInputs, FrameSequencer, SequencerSettings};

/// Scene changes not yet visible to the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PendingUpdate {
    #[default]
    None,
    /// Light slots from `first` on need writing into the current buffer
    Lights { first: usize },
    /// The layout changed; a new buffer is needed
    Relayout,
}

impl PendingUpdate {
    fn merge(self, next: Self) -> Self {
        match (self, next) {
            (Self::Relayout, _) | (_, Self::Relayout) => Self::Relayout,
            (Self::Lights { first: a }, Self::Lights { first: b }) => Self::Lights { first: a.min(b) },
            (Self::None, other) | (other, Self::None) => other,
        }
    }
}

/// Owns the renderer: backend, frame ring and scene
pub struct RenderContext<B: FrameBackend + SceneStorage = VulkanBackend> {
    backend: B,
    presenter: Presenter,
    layout: SceneLayout,
    geometry: SceneGeometry,
    objects: Vec<ObjectRecord>,
    meshlet_count: u32,
    lights: LightList,
    projection: Mat4,
    view: Mat4,
    pending: PendingUpdate,
    shut_down: bool,
}

impl<B: FrameBackend + SceneStorage> RenderContext<B> {
    /// Create a new context over an initialized backend
    ///
    /// Uploads an empty scene sized for `config.initial_light_capacity`
    /// lights.
    pub fn with_backend(mut backend: B, config: &RendererConfig) -> VulkanResult<Self> {
        config.validate()?;

        let lights = LightList::with_capacity(config.initial_light_capacity as usize);
        let geometry = SceneGeometry::empty();
        let layout = SceneLayout::compute(SceneCounts {
            light_capacity: gpu_count(lights.capacity(), "light slots")?,
            ..SceneCounts::default()
        });
        backend.upload_scene(
            &layout,
            SceneUpload { geometry: &geometry, objects: &[], lights: &[] },
            [0; FRAMES_IN_FLIGHT],
        )?;

        let sequencer = FrameSequencer::new(SequencerSettings::from_config(config));
        let aspect = config.window_width as f32 / config.window_height as f32;

        log::info!(
            "Render context ready ({}x{}, {} light slots)",
            config.window_width,
            config.window_height,
            lights.capacity()
        );

        Ok(Self {
            backend,
            presenter: Presenter::new(sequencer, config.timeout_ns),
            layout,
            geometry,
            objects: Vec::new(),
            meshlet_count: 0,
            lights,
            projection: perspective(60f32.to_radians(), aspect, 0.1, 100.0),
            view: look_at([0.0, 2.0, 6.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            pending: PendingUpdate::None,
            shut_down: false,
        })
    }

    /// Append a light; returns its index
    #[track_caller]
    pub fn add_light(&mut self, position: [f32; 3], color: [f32; 3]) -> usize {
        abort_on_error(self.try_add_light(position, color), "add_light")
    }

    /// Append a light; returns its index
    ///
    /// Growing past the light capacity doubles it and schedules a new scene
    /// buffer for the next frame.
    pub fn try_add_light(&mut self, position: [f32; 3], color: [f32; 3]) -> VulkanResult<usize> {
        if self.shut_down {
            return Err(shut_down_error());
        }
        let push = self.lights.push(LightRecord::new(position, color));
        let update = match push {
            LightPush::InPlace { index } => PendingUpdate::Lights { first: index },
            LightPush::Grown { .. } => PendingUpdate::Relayout,
        };
        self.pending = self.pending.merge(update);
        Ok(push.index())
    }

    /// Replace geometry and objects
    #[track_caller]
    pub fn set_scene(&mut self, geometry: SceneGeometry, objects: Vec<ObjectRecord>, meshlet_count: u32) {
        abort_on_error(self.try_set_scene(geometry, objects, meshlet_count), "set_scene");
    }

    /// Replace geometry and objects, uploading a freshly laid out buffer
    ///
    /// Every object's meshlet range must lie within `meshlet_count`. The old
    /// buffer is retired until the frames in flight have finished with it.
    pub fn try_set_scene(
        &mut self,
        geometry: SceneGeometry,
        objects: Vec<ObjectRecord>,
        meshlet_count: u32,
    ) -> VulkanResult<()> {
        if self.shut_down {
            return Err(shut_down_error());
        }
        if let Some((i, object)) = objects.iter().enumerate().find(|(_, o)| {
            o.first_meshlet
                .checked_add(o.meshlet_count)
                .map_or(true, |end| end > meshlet_count)
        }) {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "object {} meshlets {}..+{} exceed the scene's {} meshlets",
                    i, object.first_meshlet, object.meshlet_count, meshlet_count
                ),
            });
        }

        self.geometry = geometry;
        self.objects = objects;
        self.meshlet_count = meshlet_count;
        self.upload_scene()
    }

    /// Camera used from the next frame on
    pub fn set_camera(&mut self, projection: Mat4, view: Mat4) {
        self.projection = projection;
        self.view = view;
    }

    /// Lights added so far, in order
    pub fn lights(&self) -> &[LightRecord] {
        self.lights.as_slice()
    }

    /// Light slots reserved in the scene buffer
    pub fn light_capacity(&self) -> usize {
        self.lights.capacity()
    }

    /// Layout of the current scene buffer
    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }

    /// Frames drawn so far
    pub fn frame_count(&self) -> u64 {
        self.presenter.ring().frame_counter()
    }

    /// The backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Render and present one frame
    #[track_caller]
    pub fn draw_frame(&mut self) -> FrameReport {
        abort_on_error(self.try_draw_frame(), "draw_frame")
    }

    /// Render and present one frame
    pub fn try_draw_frame(&mut self) -> VulkanResult<FrameReport> {
        if self.shut_down {
            return Err(shut_down_error());
        }
        self.apply_pending()?;
        self.backend.collect_retired()?;

        let push = PushConstants::new(
            &self.projection,
            &self.view,
            &self.layout,
            gpu_count(self.lights.len(), "lights")?,
        );
        let geometry = self.layout.region(RegionKind::Geometry);
        let indices = self.geometry.index_region();
        let inputs = FrameInputs {
            layout: &self.layout,
            push,
            index_range: Region::new(geometry.offset + indices.offset, indices.size),
        };

        self.presenter.draw_frame(&mut self.backend, &inputs)
    }

    /// Wait for the GPU and release everything
    #[track_caller]
    pub fn shutdown(mut self) {
        abort_on_error(self.try_shutdown(), "shutdown");
    }

    /// Wait for every frame in flight, idle the device and free retired buffers
    ///
    /// Calling it again is a no-op.
    pub fn try_shutdown(&mut self) -> VulkanResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.presenter.wait_in_flight(&self.backend)?;
        self.backend.wait_idle()?;
        let released = self.backend.release_retired();
        self.shut_down = true;
        log::info!(
            "Renderer shut down after {} frames ({} retired buffers released)",
            self.frame_count(),
            released
        );
        Ok(())
    }

    fn apply_pending(&mut self) -> VulkanResult<()> {
        match std::mem::take(&mut self.pending) {
            PendingUpdate::None => Ok(()),
            // Frames in flight were pushed a light count of at most `first`,
            // so they never read the slots written here
            PendingUpdate::Lights { first } => self
                .backend
                .write_lights(&self.layout, first, &self.lights.as_slice()[first..]),
            PendingUpdate::Relayout => self.upload_scene(),
        }
    }

    fn upload_scene(&mut self) -> VulkanResult<()> {
        let layout = SceneLayout::compute(SceneCounts {
            objects: gpu_count(self.objects.len(), "objects")?,
            meshlets: self.meshlet_count,
            light_capacity: gpu_count(self.lights.capacity(), "light slots")?,
            geometry_bytes: self.geometry.byte_size(),
        });
        self.backend.upload_scene(
            &layout,
            SceneUpload {
                geometry: &self.geometry,
                objects: &self.objects,
                lights: self.lights.as_slice(),
            },
            self.presenter.ring().pending_values(),
        )?;
        log::debug!("Scene buffer relaid out: {} bytes", layout.total_size());
        self.layout = layout;
        // The upload carried every light
        self.pending = PendingUpdate::None;
        Ok(())
    }
}

impl RenderContext<VulkanBackend> {
    /// Open a window and initialize the renderer with default settings
    #[track_caller]
    pub fn init(window_title: &str, width: u32, height: u32) -> Self {
        abort_on_error(Self::try_init(window_title, width, height), "init")
    }

    /// Open a window and initialize the renderer with default settings
    pub fn try_init(window_title: &str, width: u32, height: u32) -> VulkanResult<Self> {
        let config = RendererConfig::new(window_title).with_window_size(width, height);
        Self::try_init_with_config(&config)
    }

    /// Open a window and initialize the renderer from `config`
    #[track_caller]
    pub fn init_with_config(config: &RendererConfig) -> Self {
        abort_on_error(Self::try_init_with_config(config), "init")
    }

    /// Open a window and initialize the renderer from `config`
    pub fn try_init_with_config(config: &RendererConfig) -> VulkanResult<Self> {
        config.validate()?;
        let window = Window::new(&config.window_title, config.window_width, config.window_height)?;
        let backend = VulkanBackend::new(window, config)?;
        Self::with_backend(backend, config)
    }

    /// The window being rendered to
    pub fn window(&self) -> &Window {
        self.backend.window()
    }

    /// Mutable access to the window, for event polling
    pub fn window_mut(&mut self) -> &mut Window {
        self.backend.window_mut()
    }
}

impl<B: FrameBackend + SceneStorage> Drop for RenderContext<B> {
    fn drop(&mut self) {
        if let Err(err) = self.try_shutdown() {
            fatal("shutdown", &err);
        }
    }
}

/// Narrow a CPU-side count to the 32-bit counts the GPU reads
fn gpu_count(len: usize, what: &str) -> VulkanResult<u32> {
    u32::try_from(len).map_err(|_| VulkanError::InvalidOperation {
        reason: format!("{len} {what} do not fit the GPU's 32-bit counts"),
    })
}

fn shut_down_error() -> VulkanError {
    VulkanError::InvalidOperation {
        reason: "Renderer has been shut down".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_updates_merge_to_the_widest() {
        let lights = |first| PendingUpdate::Lights { first };
        assert_eq!(PendingUpdate::None.merge(lights(3)), lights(3));
        assert_eq!(lights(3).merge(lights(1)), lights(1));
        assert_eq!(lights(3).merge(PendingUpdate::Relayout), PendingUpdate::Relayout);
        assert_eq!(PendingUpdate::Relayout.merge(lights(0)), PendingUpdate::Relayout);
        assert_eq!(PendingUpdate::Relayout.merge(PendingUpdate::None), PendingUpdate::Relayout);
    }

    #[test]
    fn test_gpu_counts_pass_values_in_range() {
        assert_eq!(gpu_count(0, "objects").unwrap(), 0);
        assert_eq!(gpu_count(u32::MAX as usize, "lights").unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_gpu_counts_do_not_truncate() {
        let err = gpu_count(u32::MAX as usize + 1, "objects").unwrap_err();
        assert!(matches!(err, VulkanError::InvalidOperation { .. }));
        assert!(err.to_string().contains("4294967296 objects"));
    }
}
