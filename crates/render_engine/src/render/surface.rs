//! Platform surface interface
//!
//! The renderer does not create windows or GL contexts itself. The frame
//! driver hands it a surface implementing these traits; the backend only ever
//! queries the size, presents and sets the swap interval.

use std::ffi::c_void;

use crate::render::RenderResult;

/// A presentable surface
pub trait RenderSurface {
    /// Current size of the drawable area in pixels
    fn size(&self) -> (u32, u32);

    /// Present the back buffer
    ///
    /// May block until vertical sync; this is the only frame-pacing point of
    /// the renderer.
    fn swap_buffers(&mut self) -> RenderResult<()>;

    /// Set how many vertical blanks to wait per swap (0 disables vsync)
    fn set_swap_interval(&mut self, interval: i32) -> RenderResult<()>;
}

/// A surface with a current OpenGL context
pub trait GlSurface: RenderSurface {
    /// Address of the GL entry point `name`, or null when unavailable
    fn get_proc_address(&self, name: &str) -> *const c_void;
}
