//! GPU device seam
//!
//! [`GpuDevice`] is the narrow set of GL operations the OpenGL backend needs.
//! [`GlowDevice`](super::GlowDevice) implements it over a real context; the
//! tests implement it with a recording fake so the whole frame algorithm runs
//! without a GPU.

use std::fmt::Debug;

use crate::render::commands::{IndexType, MeshIndices, TextureDesc, Vertex};

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported by the GPU device
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    /// The driver refused to create an object
    #[error("Failed to create {0}")]
    ObjectCreation(String),

    /// A shader stage failed to compile
    #[error("Failed to compile {stage:?} stage of '{program}': {log}")]
    ShaderCompile {
        /// Program the stage belongs to
        program: String,
        /// Failing stage
        stage: ShaderStage,
        /// Driver info log
        log: String,
    },

    /// A program failed to link
    #[error("Failed to link '{program}': {log}")]
    ProgramLink {
        /// Program name
        program: String,
        /// Driver info log
        log: String,
    },

    /// A framebuffer is not complete
    #[error("Framebuffer incomplete (status 0x{status:X})")]
    FramebufferIncomplete {
        /// Raw completeness status
        status: u32,
    },
}

/// Pipeline stage of a shader source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Geometry shader
    Geometry,
    /// Fragment shader
    Fragment,
}

impl ShaderStage {
    /// File extension component of the stage (`<name>.<ext>.glsl`)
    pub const fn file_extension(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Geometry => "geom",
            Self::Fragment => "frag",
        }
    }
}

/// Primitive assembly mode of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveMode {
    /// Triangle list
    Triangles,
    /// Line list
    Lines,
}

/// Texture binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTarget {
    /// `TEXTURE_2D`
    Texture2d,
    /// `TEXTURE_CUBE_MAP_ARRAY`
    CubeMapArray,
}

/// Vertex and index data of a mesh to upload
///
/// Vertices always use the [`Vertex`] layout: position at location 0, normal
/// at 1, uv at 2, tangent at 3.
#[derive(Debug, Clone, Copy)]
pub struct MeshUpload<'a> {
    /// Vertex data
    pub vertices: &'a [Vertex],
    /// Index data; `None` draws the vertices in order
    pub indices: Option<&'a MeshIndices>,
}

/// Texture storage to allocate
#[derive(Debug, Clone, Copy)]
pub enum TextureUpload<'a> {
    /// 2D texture filled from a description
    Image(&'a TextureDesc),
    /// Empty RGBA8 2D color target
    ColorTarget {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Empty 2D depth target
    DepthTarget {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Empty depth cube map array with `cubes` cubes of `size`x`size` faces
    DepthCubeArray {
        /// Edge length of each face
        size: u32,
        /// Number of cubes
        cubes: u32,
    },
}

impl TextureUpload<'_> {
    /// Binding target of the texture this upload creates
    pub const fn target(&self) -> TextureTarget {
        match self {
            Self::DepthCubeArray { .. } => TextureTarget::CubeMapArray,
            _ => TextureTarget::Texture2d,
        }
    }
}

/// Objects backing one uploaded mesh
#[derive(Debug, Clone, Copy)]
pub struct MeshBuffers<V, B> {
    /// Vertex array object
    pub vertex_array: V,
    /// Vertex buffer
    pub vertex_buffer: B,
    /// Index buffer, if the mesh is indexed
    pub index_buffer: Option<B>,
}

/// Driver identification queried at init
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// `GL_VENDOR`
    pub vendor: String,
    /// `GL_RENDERER`
    pub renderer: String,
    /// `GL_VERSION`
    pub version: String,
    /// `GL_SHADING_LANGUAGE_VERSION`
    pub glsl_version: String,
    /// `GL_NUM_EXTENSIONS`
    pub extension_count: u32,
}

impl DeviceInfo {
    /// `(major, minor)` of a desktop GL context, parsed from `GL_VERSION`
    ///
    /// `None` for an empty string (no current context) and for OpenGL ES.
    pub fn gl_version(&self) -> Option<(u32, u32)> {
        if self.version.starts_with("OpenGL ES") {
            return None;
        }
        let number = self.version.split_whitespace().next()?;
        let mut parts = number.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor: String = parts.next()?.chars().take_while(char::is_ascii_digit).collect();
        Some((major, minor.parse().ok()?))
    }
}

/// GL operations used by the OpenGL backend
///
/// Handles are plain copyable values; the backend owns the lifetime of every
/// object it creates and deletes it explicitly.
pub trait GpuDevice {
    /// Buffer object
    type Buffer: Copy + Debug;
    /// Vertex array object
    type VertexArray: Copy + Debug;
    /// Texture object
    type Texture: Copy + Debug;
    /// Framebuffer object
    type Framebuffer: Copy + Debug;
    /// Linked program
    type Program: Copy + Debug;
    /// Uniform location within a program
    type UniformLocation: Clone + Debug;

    /// Driver identification
    fn device_info(&self) -> DeviceInfo;

    /// Allocate a uniform buffer of `size` zeroed bytes bound to `binding`
    fn create_uniform_buffer(&mut self, binding: u32, size: usize) -> DeviceResult<Self::Buffer>;

    /// Overwrite `bytes.len()` bytes of a uniform buffer starting at `offset`
    fn write_uniform_buffer(&mut self, buffer: Self::Buffer, offset: usize, bytes: &[u8]);

    /// Delete a buffer
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    /// Upload a mesh into a new vertex array
    fn create_mesh(
        &mut self,
        upload: MeshUpload<'_>,
    ) -> DeviceResult<MeshBuffers<Self::VertexArray, Self::Buffer>>;

    /// Delete a mesh's vertex array and buffers
    fn delete_mesh(&mut self, buffers: MeshBuffers<Self::VertexArray, Self::Buffer>);

    /// Allocate a texture
    fn create_texture(&mut self, upload: TextureUpload<'_>) -> DeviceResult<Self::Texture>;

    /// Delete a texture
    fn delete_texture(&mut self, texture: Self::Texture);

    /// Create a framebuffer with an optional color attachment and a depth
    /// attachment
    ///
    /// A cube map array depth texture is attached layered. Without a color
    /// attachment, draw and read buffers are disabled.
    fn create_framebuffer(
        &mut self,
        color: Option<Self::Texture>,
        depth: Self::Texture,
        depth_target: TextureTarget,
    ) -> DeviceResult<Self::Framebuffer>;

    /// Verify completeness of a framebuffer
    fn check_framebuffer(&mut self, framebuffer: Self::Framebuffer) -> DeviceResult<()>;

    /// Delete a framebuffer (not its attachments)
    fn delete_framebuffer(&mut self, framebuffer: Self::Framebuffer);

    /// Compile and link a program from GLSL stage sources
    ///
    /// # Arguments
    /// * `label` - Program name used in error messages
    /// * `stages` - Stage and source pairs
    fn create_program(
        &mut self,
        label: &str,
        stages: &[(ShaderStage, &str)],
    ) -> DeviceResult<Self::Program>;

    /// Delete a program
    fn delete_program(&mut self, program: Self::Program);

    /// Location of a uniform, `None` if the program does not use it
    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;

    /// Bind a named uniform block of a program to a buffer binding point
    ///
    /// Blocks the program does not declare are ignored.
    fn bind_uniform_block(&mut self, program: Self::Program, block: &str, binding: u32);

    /// Bind a framebuffer, `None` for the default one
    fn bind_framebuffer(&mut self, framebuffer: Option<Self::Framebuffer>);

    /// Set the viewport to `width` x `height` at the origin
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clear color and/or depth of the bound framebuffer
    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>);

    /// Enable or disable depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Enable or disable alpha blending
    fn set_blending(&mut self, enabled: bool);

    /// Make a program current
    fn use_program(&mut self, program: Self::Program);

    /// Bind a vertex array
    fn bind_vertex_array(&mut self, vertex_array: Self::VertexArray);

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Self::Texture);

    /// Set a `mat4` uniform of the current program from column-major data
    fn set_uniform_mat4(&mut self, location: Option<&Self::UniformLocation>, value: &[f32; 16]);

    /// Set a `mat3` uniform of the current program from column-major data
    fn set_uniform_mat3(&mut self, location: Option<&Self::UniformLocation>, value: &[f32; 9]);

    /// Set a `vec4` uniform of the current program
    fn set_uniform_vec4(&mut self, location: Option<&Self::UniformLocation>, value: [f32; 4]);

    /// Set an `int` or sampler uniform of the current program
    fn set_uniform_i32(&mut self, location: Option<&Self::UniformLocation>, value: i32);

    /// Draw `count` indices of the bound vertex array
    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, index_type: IndexType);

    /// Draw `count` vertices of the bound vertex array starting at `first`
    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(version: &str) -> DeviceInfo {
        DeviceInfo {
            version: version.into(),
            ..DeviceInfo::default()
        }
    }

    #[test]
    fn test_gl_version_parsing() {
        assert_eq!(info("4.6.0 NVIDIA 535.54.03").gl_version(), Some((4, 6)));
        assert_eq!(info("4.1 Metal - 83.1").gl_version(), Some((4, 1)));
        assert_eq!(info("3.3 (Core Profile) Mesa 23.0.4").gl_version(), Some((3, 3)));
        assert_eq!(info("OpenGL ES 3.2 Mesa 23.0.4").gl_version(), None);
        assert_eq!(info("").gl_version(), None);
    }
}
