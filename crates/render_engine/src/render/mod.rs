//! # Rendering System
//!
//! Frame-oriented rendering built around a command queue. Game logic describes
//! what it wants drawn by pushing [`RenderCommand`]s through the [`Renderer`];
//! once per frame the active backend drains the queue and turns it into GPU
//! work.
//!
//! ## Architecture
//!
//! - **Renderer**: explicitly owned renderer context and public render API
//! - **Command Queue**: fixed-capacity, frame-scoped command buffer with
//!   separate draw and lifecycle regions
//! - **Resource Id Map**: opaque ids to backend-native handles, with built-in
//!   fallbacks for ids that do not resolve
//! - **OpenGL Backend**: multi-pass renderer (shadows, main, UI, post-process)
//!   over a narrow [`GpuDevice`](backends::opengl::GpuDevice) seam
//!
//! ## Frame lifecycle
//!
//! ```text
//! game logic ── push ──> CommandQueue ──> begin_frame ──> end_frame ──> clear
//!                                          (lifecycle,     (shadow, main,
//!                                           remap, UBOs)    UI, present)
//! ```

pub mod commands;
pub mod command_queue;
pub mod draw_order;
pub mod id_map;
pub mod camera;
pub mod lighting;
pub mod api;
pub mod surface;
pub mod renderer;

/// Graphics backend implementations
///
/// Only OpenGL is implemented; other [`BackendKind`]s are rejected at init.
pub mod backends;

pub use api::{BackendKind, FrameTime, RenderBackend, RenderData, RendererConfig};
pub use camera::{Camera, CameraTransform};
pub use command_queue::{CommandQueue, DEFAULT_COMMAND_CAPACITY};
pub use commands::{
    builtin, DirectionalLightCommand, DrawCommand, DrawFlags, GenerateMesh, GenerateTexture,
    IndexType, MeshId, MeshIndices, PointLightCommand, RenderCommand, TextureBaseType,
    TextureDesc, TextureFilter, TextureFormat, TextureId, TextureSlot, TextureWrap, UiRect, Vertex,
};
pub use id_map::ResourceIdMap;
pub use lighting::{DirectionalLight, PointLight, MAX_POINT_LIGHTS};
pub use renderer::Renderer;
pub use surface::{GlSurface, RenderSurface};

use crate::assets::AssetError;
use crate::config::ConfigError;
use backends::opengl::DeviceError;

/// Resource classes tracked by id maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Vertex array with its buffers
    Mesh,
    /// 2D texture
    Texture,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mesh => write!(f, "mesh"),
            Self::Texture => write!(f, "texture"),
        }
    }
}

/// Errors that can occur during rendering operations
///
/// Fatal errors (see [`RenderError::is_fatal`]) leave the renderer unusable and
/// are expected to end the program; the rest reject a single request and the
/// frame continues.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A shader stage file could not be read
    #[error("Shader file missing: {path}")]
    ShaderFileMissing {
        /// Path that was tried
        path: std::path::PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The GPU device rejected an operation
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// The frame's command queue is at capacity
    #[error("Render command queue full (capacity {capacity})")]
    QueueFull {
        /// Commands the queue holds per frame
        capacity: usize,
    },

    /// A generate command reused an id that is still mapped
    #[error("Duplicate {kind} id {id}")]
    DuplicateResourceId {
        /// Resource class of the id
        kind: ResourceKind,
        /// The reused id
        id: u32,
    },

    /// Point light index outside `0..MAX_POINT_LIGHTS`
    #[error("Invalid point light index {0} (max {MAX_POINT_LIGHTS})")]
    InvalidLightIndex(usize),

    /// Mesh data failed validation
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Texture data failed validation
    #[error("Invalid texture: {0}")]
    InvalidTexture(String),

    /// Camera lens parameters do not form a perspective projection
    #[error("Invalid camera: {0}")]
    InvalidCamera(String),

    /// The configured backend has no implementation
    #[error("Unsupported render backend: {0:?}")]
    UnsupportedBackend(BackendKind),

    /// The platform surface failed
    #[error("Surface error: {0}")]
    Surface(String),

    /// Renderer configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An asset could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
}

impl RenderError {
    /// Whether the renderer can no longer be used after this error
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InitializationFailed(_)
                | Self::ShaderFileMissing { .. }
                | Self::Device(_)
                | Self::UnsupportedBackend(_)
                | Self::Surface(_)
        )
    }

    /// Process exit code the frame driver should use for this failure kind
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InitializationFailed(_) => 10,
            Self::ShaderFileMissing { .. } => 11,
            Self::Device(_) => 12,
            Self::UnsupportedBackend(_) => 13,
            Self::Surface(_) => 14,
            Self::Config(_) => 15,
            Self::Asset(_) => 16,
            Self::QueueFull { .. } => 20,
            Self::DuplicateResourceId { .. } => 21,
            Self::InvalidLightIndex(_) => 22,
            Self::InvalidMesh(_) => 23,
            Self::InvalidTexture(_) => 24,
            Self::InvalidCamera(_) => 25,
        }
    }
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
