//! Backend abstraction for the rendering system
//!
//! A backend is the consumer of the frame's command queue. The renderer calls
//! into it through four entry points, once per frame or event:
//!
//! - [`begin_frame`](RenderBackend::begin_frame): execute lifecycle commands,
//!   resolve ids, refresh uniform data and clear render targets
//! - [`end_frame`](RenderBackend::end_frame): record every pass and present
//! - [`on_resize`](RenderBackend::on_resize): react to a new surface size
//! - [`shutdown`](RenderBackend::shutdown): release all GPU resources

use crate::render::api::renderer_config::BackendKind;
use crate::render::camera::Camera;
use crate::render::command_queue::CommandQueue;
use crate::render::RenderResult;

/// Frame timing handed to shaders through the frame uniform buffer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds since the renderer started
    pub elapsed: f32,
    /// Seconds since the previous frame
    pub delta: f32,
    /// Index of this frame, starting at 0
    pub frame: u64,
}

/// Per-frame snapshot passed into the backend
///
/// Owned by the frame driver for exactly one frame. The backend may modify it
/// (it clears `projection_dirty`, reports `ui_object_count`) but must not keep
/// any borrow past `end_frame`.
#[derive(Debug)]
pub struct RenderData<'a> {
    /// Active camera, if any
    pub camera: Option<&'a mut Camera>,

    /// Set when the projection inputs (aspect, fov, planes) changed since the
    /// camera uniforms were last written
    pub projection_dirty: bool,

    /// Frame timing
    pub time: FrameTime,

    /// Commands pushed during this frame
    pub commands: &'a mut CommandQueue,

    /// Resolution of the offscreen render target in pixels
    pub framebuffer_size: (u32, u32),

    /// Number of UI rectangles drawn, written by the backend
    pub ui_object_count: usize,
}

impl<'a> RenderData<'a> {
    /// Snapshot with no camera, zero time and the projection marked dirty
    pub fn new(commands: &'a mut CommandQueue, framebuffer_size: (u32, u32)) -> Self {
        Self {
            camera: None,
            projection_dirty: true,
            time: FrameTime::default(),
            commands,
            framebuffer_size,
            ui_object_count: 0,
        }
    }

    /// Width over height of the render target, 1.0 for a degenerate target
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.framebuffer_size;
        if width == 0 || height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }
}

/// Rendering backend function table
///
/// Implementations are driven strictly in the order
/// `begin_frame → end_frame` per frame, with `on_resize` only between frames.
pub trait RenderBackend {
    /// Which backend this is
    fn kind(&self) -> BackendKind;

    /// Prepare the frame
    ///
    /// Drains the lifecycle commands out of `data.commands`, so after this
    /// call the queue only holds draws.
    ///
    /// # Arguments
    /// * `data` - Snapshot of the frame being rendered
    fn begin_frame(&mut self, data: &mut RenderData<'_>) -> RenderResult<()>;

    /// Record all passes for the frame and present it
    ///
    /// # Arguments
    /// * `data` - The snapshot previously passed to `begin_frame`
    fn end_frame(&mut self, data: &mut RenderData<'_>) -> RenderResult<()>;

    /// React to a new surface size between frames
    ///
    /// # Arguments
    /// * `width` - New surface width in pixels
    /// * `height` - New surface height in pixels
    fn on_resize(&mut self, width: u32, height: u32) -> RenderResult<()>;

    /// Release every GPU resource; the backend is unusable afterwards
    fn shutdown(&mut self);

    /// Downcast to the concrete backend type
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to the mutable concrete backend type
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
