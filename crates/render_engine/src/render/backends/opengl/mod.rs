//! OpenGL backend
//!
//! Consumes the frame's command queue and renders it in four passes: shadow
//! maps, the lit main pass into an offscreen framebuffer, flat UI quads, and a
//! post-process blit to the default framebuffer.
//!
//! All GL calls go through [`GpuDevice`]; [`GlowDevice`] is the production
//! implementation.

mod backend;
mod device;
mod frame;
mod glow_device;
mod resources;
mod shader;
mod uniforms;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ui_projection, OpenGlBackend, ResolvedDraw};
pub use device::{
    DeviceError, DeviceInfo, DeviceResult, GpuDevice, MeshBuffers, MeshUpload, PrimitiveMode,
    ShaderStage, TextureTarget, TextureUpload,
};
pub use frame::resolve_draw;
pub use glow_device::GlowDevice;
pub use resources::{
    cube_geometry, fullscreen_quad_geometry, null_texture_desc, quad_2d_geometry, BuiltinKeys,
    Framebuffer, GpuMesh, GpuTexture, ResourceTables, TextureKey, VertexArrayKey, FRAMEBUFFER_CHECKS,
};
pub use shader::{ProgramKind, ShaderLibrary, ShaderProgram};
pub use uniforms::UniformBuffers;
