//! Renderer configuration for application-specific settings
//!
//! Lets applications tune the renderer without hardcoding values in the
//! rendering system itself. Stored as TOML or RON through [`Config`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::render::command_queue::DEFAULT_COMMAND_CAPACITY;

/// Graphics APIs a renderer can be configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BackendKind {
    /// OpenGL 4.x, the only implemented backend
    #[default]
    OpenGl,
    /// Vulkan
    Vulkan,
    /// Direct3D
    DirectX,
    /// Metal
    Metal,
}

/// Configuration for the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Graphics API to use
    pub backend: BackendKind,
    /// Commands a single frame may queue
    pub command_capacity: usize,
    /// Directory holding `<name>.<stage>.glsl` shader files
    pub shader_dir: PathBuf,
    /// Edge length of every shadow map in texels
    pub shadow_map_size: u32,
    /// Wait for vertical sync when presenting
    pub vsync: bool,
    /// Offscreen render resolution relative to the surface size
    pub resolution_scale: f32,
    /// Main framebuffer clear color [R, G, B, A] (0.0-1.0 range)
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    /// Set the backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the per-frame command capacity
    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    /// Set the shader directory
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Set the shadow map resolution
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    /// Enable or disable vsync
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the render resolution scale
    pub fn with_resolution_scale(mut self, scale: f32) -> Self {
        self.resolution_scale = scale;
        self
    }

    /// Set background clear color [R, G, B, A] (0.0-1.0 range)
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Swap interval matching the vsync setting
    pub const fn swap_interval(&self) -> i32 {
        if self.vsync {
            1
        } else {
            0
        }
    }

    /// Offscreen resolution for a surface of `width` x `height` pixels
    ///
    /// Never smaller than 1x1.
    pub fn framebuffer_resolution(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.resolution_scale).round() as u32).max(1);
        (scale(width), scale(height))
    }

    /// Reject values the renderer cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_capacity == 0 {
            return Err(ConfigError::Invalid("command_capacity must be at least 1".into()));
        }
        if self.shadow_map_size == 0 {
            return Err(ConfigError::Invalid("shadow_map_size must be at least 1".into()));
        }
        if !self.resolution_scale.is_finite() || self.resolution_scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "resolution_scale must be positive, got {}",
                self.resolution_scale
            )));
        }
        if self.shader_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("shader_dir is empty".into()));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::OpenGl,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            shader_dir: PathBuf::from("./resources/shaders"),
            shadow_map_size: 1024,
            vsync: true,
            resolution_scale: 1.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Config for RendererConfig {}
