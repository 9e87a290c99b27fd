//! Public rendering API
//!
//! The backend function table ([`RenderBackend`]), the per-frame snapshot it
//! consumes ([`RenderData`]) and the renderer configuration.

pub mod render_backend;
pub mod renderer_config;

pub use render_backend::{FrameTime, RenderBackend, RenderData};
pub use renderer_config::{BackendKind, RendererConfig};
