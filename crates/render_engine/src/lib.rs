//! # Render Engine
//!
//! Frame-oriented renderer: game code records draw and resource-lifecycle
//! commands into a per-frame queue, and a multi-pass OpenGL backend turns
//! them into shadow, main, UI and post-process passes.
//!
//! ## Features
//!
//! - **Command queue**: draws, mesh/texture generation and retirement, lights
//! - **Stable ids**: opaque mesh and texture ids with built-in fallbacks
//! - **Shadows**: one directional shadow map and up to 4 point-light cube maps
//! - **Pluggable devices**: the backend runs on any [`GpuDevice`](render::backends::opengl::GpuDevice),
//!   `glow` in production
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_engine::prelude::*;
//!
//! fn run(surface: Box<dyn GlSurface>) -> RenderResult<()> {
//!     render_engine::foundation::logging::init_with_level("info");
//!
//!     let config = RendererConfig::load_from_file("renderer.toml").unwrap_or_default();
//!     // SAFETY: the surface's context is current on this thread
//!     let mut renderer = unsafe { Renderer::init(config, surface)? };
//!     renderer.set_point_light(0, Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, 1.0, 1.0), true)?;
//!
//!     loop {
//!         renderer.draw(
//!             DrawCommand::new(Mat4::identity(), builtin::CUBE_MESH)
//!                 .with_flags(DrawFlags::SHADOW_CASTER | DrawFlags::SHADOW_RECEIVER),
//!         )?;
//!         renderer.render(1.0 / 60.0)?;
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod foundation;
pub mod config;
pub mod assets;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        assets::{AssetError, ImageData},
        config::{Config, ConfigError},
        foundation::math::{Mat4, Mat4Ext, Quat, Vec2, Vec3, Vec4},
        render::{
            builtin, BackendKind, Camera, CameraTransform, DrawCommand, DrawFlags, GlSurface,
            MeshId, RenderError, RenderResult, RenderSurface, Renderer, RendererConfig,
            TextureDesc, TextureId, TextureSlot, Vertex,
        },
    };
}
