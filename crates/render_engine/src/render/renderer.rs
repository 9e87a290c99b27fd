//! # Renderer
//!
//! The renderer context: owns the active backend, the frame's command queue,
//! the bound camera and the id counters, and exposes the render API game
//! logic talks to.
//!
//! ## Usage
//!
//! ```no_run
//! use render_engine::prelude::*;
//! # fn frame(surface: Box<dyn GlSurface>) -> RenderResult<()> {
//! // SAFETY: the surface's context is current on this thread
//! let mut renderer = unsafe { Renderer::init(RendererConfig::default(), surface)? };
//! let mesh = renderer.generate_mesh(
//!     vec![Vertex::default(); 3],
//!     vec![0u32, 1, 2],
//! )?;
//! renderer.draw(DrawCommand::new(Mat4::identity(), mesh))?;
//! renderer.render(1.0 / 60.0)?;
//! renderer.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! Ids returned by `generate_*` are usable immediately: the backend executes
//! generate commands before it resolves the draws of the same frame.

use crate::assets::ImageData;
use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::render::api::{BackendKind, FrameTime, RenderBackend, RenderData, RendererConfig};
use crate::render::backends::opengl::{GlowDevice, GpuDevice, OpenGlBackend};
use crate::render::camera::Camera;
use crate::render::command_queue::CommandQueue;
use crate::render::commands::{
    builtin, DirectionalLightCommand, DrawCommand, GenerateMesh, GenerateTexture, MeshId,
    MeshIndices, PointLightCommand, TextureDesc, TextureId, UiRect, Vertex,
};
use crate::render::lighting::MAX_POINT_LIGHTS;
use crate::render::surface::GlSurface;
use crate::render::{RenderError, RenderResult};

/// Explicitly owned renderer context
///
/// Construct one at startup, call [`render`](Self::render) once per frame and
/// [`shutdown`](Self::shutdown) (or drop it) at exit. Several instances can
/// coexist; nothing is process-global.
pub struct Renderer {
    backend: Box<dyn RenderBackend>,
    config: RendererConfig,
    commands: CommandQueue,
    camera: Option<Camera>,

    surface_size: (u32, u32),
    framebuffer_size: (u32, u32),

    /// Aspect ratio (or camera) changed since the camera uniforms were written
    projection_dirty: bool,

    next_mesh_id: u32,
    next_texture_id: u32,

    frame: u64,
    elapsed: f32,
    ui_object_count: usize,
    shut_down: bool,
}

impl Renderer {
    /// Create a renderer for the configured backend on `surface`
    ///
    /// # Safety
    /// The surface's GL context must be current on the calling thread and
    /// stay current for as long as the renderer is used, including its drop.
    ///
    /// # Errors
    /// Invalid configuration, an unimplemented backend, or any fatal
    /// initialization error of the backend.
    pub unsafe fn init(config: RendererConfig, surface: Box<dyn GlSurface>) -> RenderResult<Self> {
        Self::check_backend(&config)?;
        // SAFETY: forwarded to the caller
        let device = unsafe { GlowDevice::from_surface(surface.as_ref()) };
        Self::init_with_device(device, surface, config)
    }

    /// Create an OpenGL renderer over an explicit device
    pub fn init_with_device<D: GpuDevice + 'static>(
        device: D,
        surface: Box<dyn GlSurface>,
        config: RendererConfig,
    ) -> RenderResult<Self> {
        Self::check_backend(&config)?;
        let surface_size = surface.size();
        let framebuffer_size = config.framebuffer_resolution(surface_size.0, surface_size.1);
        let backend = OpenGlBackend::new(device, surface, &config, framebuffer_size)?;
        Self::from_backend(Box::new(backend), config, surface_size)
    }

    /// Wrap an already initialized backend
    pub fn from_backend(
        backend: Box<dyn RenderBackend>,
        config: RendererConfig,
        surface_size: (u32, u32),
    ) -> RenderResult<Self> {
        config.validate()?;
        let framebuffer_size = config.framebuffer_resolution(surface_size.0, surface_size.1);
        log::info!(
            "Renderer ready ({:?}, surface {}x{}, {} commands per frame)",
            backend.kind(),
            surface_size.0,
            surface_size.1,
            config.command_capacity
        );

        Ok(Self {
            backend,
            commands: CommandQueue::with_capacity(config.command_capacity),
            config,
            camera: None,
            surface_size,
            framebuffer_size,
            projection_dirty: true,
            next_mesh_id: builtin::FIRST_USER_ID,
            next_texture_id: builtin::FIRST_USER_ID,
            frame: 0,
            elapsed: 0.0,
            ui_object_count: 0,
            shut_down: false,
        })
    }

    fn check_backend(config: &RendererConfig) -> RenderResult<()> {
        config.validate()?;
        match config.backend {
            BackendKind::OpenGl => Ok(()),
            other => {
                log::error!("Render backend {:?} is not implemented", other);
                Err(RenderError::UnsupportedBackend(other))
            }
        }
    }

    /// Bind the camera used for sorting and the camera uniforms
    ///
    /// # Errors
    /// [`RenderError::InvalidCamera`] when the lens does not form a
    /// perspective projection; the previous camera stays bound.
    pub fn set_camera(&mut self, camera: Camera) -> RenderResult<()> {
        camera.validate()?;
        self.camera = Some(camera);
        self.projection_dirty = true;
        Ok(())
    }

    /// Unbind the camera
    pub fn clear_camera(&mut self) -> Option<Camera> {
        self.camera.take()
    }

    /// The bound camera
    pub const fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    /// The bound camera, for moving it between frames
    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.camera.as_mut()
    }

    /// Queue a draw
    ///
    /// # Errors
    /// [`RenderError::QueueFull`] when the frame is at capacity.
    pub fn draw(&mut self, draw: DrawCommand) -> RenderResult<()> {
        self.commands.push_draw(draw)
    }

    /// Queue creation of a mesh and return its id
    ///
    /// The id can be drawn in the same frame. Ids are only consumed by
    /// accepted requests.
    ///
    /// # Arguments
    /// * `vertices` - Vertex data
    /// * `indices` - 16 or 32 bit indices into `vertices`
    pub fn generate_mesh(
        &mut self,
        vertices: Vec<Vertex>,
        indices: impl Into<MeshIndices>,
    ) -> RenderResult<MeshId> {
        let id = MeshId(self.next_mesh_id);
        let command = GenerateMesh {
            id,
            vertices,
            indices: indices.into(),
        };
        command.validate()?;
        self.commands.push_generate_mesh(command)?;
        self.next_mesh_id += 1;
        Ok(id)
    }

    /// Queue release of meshes
    pub fn retire_meshes(&mut self, ids: &[MeshId]) -> RenderResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.commands.push_retire_meshes(ids.to_vec())
    }

    /// Queue creation of a texture and return its id
    pub fn generate_texture(&mut self, desc: TextureDesc) -> RenderResult<TextureId> {
        desc.validate()?;
        let id = TextureId(self.next_texture_id);
        self.commands.push_generate_texture(GenerateTexture { id, desc })?;
        self.next_texture_id += 1;
        Ok(id)
    }

    /// Queue creation of an RGBA8 texture from a decoded image
    ///
    /// # Errors
    /// [`RenderError::Asset`] when the image cannot be turned into texture
    /// data, plus everything [`generate_texture`](Self::generate_texture) rejects.
    pub fn generate_texture_from_image(&mut self, image: &ImageData) -> RenderResult<TextureId> {
        let desc = TextureDesc::from_image(image)?;
        self.generate_texture(desc)
    }

    /// Queue release of textures
    pub fn retire_textures(&mut self, ids: &[TextureId]) -> RenderResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.commands.push_retire_textures(ids.to_vec())
    }

    /// Queue an update of the directional light
    pub fn set_directional_light(&mut self, direction: Vec3, color: Vec3, active: bool) -> RenderResult<()> {
        self.commands.push_directional_light(DirectionalLightCommand {
            direction,
            color,
            active,
        })
    }

    /// Queue an update of point light `index`
    ///
    /// # Errors
    /// [`RenderError::InvalidLightIndex`] unless `index < MAX_POINT_LIGHTS`.
    pub fn set_point_light(
        &mut self,
        index: usize,
        position: Vec3,
        color: Vec3,
        active: bool,
    ) -> RenderResult<()> {
        if index >= MAX_POINT_LIGHTS {
            return Err(RenderError::InvalidLightIndex(index));
        }
        self.commands.push_point_light(PointLightCommand {
            index,
            position,
            color,
            active,
        })
    }

    /// Queue a flat-colored rectangle in surface pixels, drawn over the scene
    pub fn draw_ui_rect(&mut self, position: Vec2, size: Vec2, color: Vec4) -> RenderResult<()> {
        self.commands.push_ui_rect(UiRect { position, size, color })
    }

    /// React to a new surface size
    ///
    /// The main framebuffer follows on the next frame.
    pub fn on_resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.surface_size = (width, height);
        self.framebuffer_size = self.config.framebuffer_resolution(width, height);
        self.projection_dirty = true;
        self.backend.on_resize(width, height)
    }

    /// Render and present one frame, then reset the queue
    ///
    /// The queue is cleared even when the backend fails.
    ///
    /// # Arguments
    /// * `delta` - Seconds since the previous frame
    pub fn render(&mut self, delta: f32) -> RenderResult<()> {
        self.elapsed += delta;
        let mut data = RenderData {
            camera: self.camera.as_mut(),
            projection_dirty: self.projection_dirty,
            time: FrameTime {
                elapsed: self.elapsed,
                delta,
                frame: self.frame,
            },
            commands: &mut self.commands,
            framebuffer_size: self.framebuffer_size,
            ui_object_count: 0,
        };

        let result = self
            .backend
            .begin_frame(&mut data)
            .and_then(|()| self.backend.end_frame(&mut data));

        self.projection_dirty = data.projection_dirty;
        self.ui_object_count = data.ui_object_count;
        self.commands.clear();
        self.frame += 1;
        result
    }

    /// Release all GPU resources; later frames do nothing
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.backend.shutdown();
        self.commands.clear();
        self.shut_down = true;
    }

    /// Active configuration
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Commands queued so far this frame
    pub const fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// The active backend
    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    /// The active backend, mutably
    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    /// Frames rendered so far
    pub const fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Current surface size
    pub const fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    /// Current offscreen resolution
    pub const fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer_size
    }

    /// UI rectangles drawn in the last frame
    pub const fn ui_object_count(&self) -> usize {
        self.ui_object_count
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
