//! Render commands
//!
//! Everything game logic can ask of the renderer during a frame is expressed
//! as a [`RenderCommand`]. Commands only carry data; no GPU work happens until
//! the active backend consumes the queue.
//!
//! Resource ids in commands are *opaque*: they are assigned by the renderer
//! when the generate command is queued and only become meaningful to the GPU
//! after the backend has executed that command and recorded the native handle
//! in its id map.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3, Vec4};
use crate::render::{RenderError, RenderResult};

/// Opaque, producer-assigned mesh id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MeshId(pub u32);

/// Opaque, producer-assigned texture id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextureId(pub u32);

/// Ids reserved for engine built-in resources
///
/// Ids below [`FIRST_USER_ID`](builtin::FIRST_USER_ID) are never handed out by
/// the id allocator. Id 0 is "no resource" and always resolves to the
/// fallback for its slot.
pub mod builtin {
    use super::{MeshId, TextureId};

    /// Unit cube, also the fallback for unknown mesh ids
    pub const CUBE_MESH: MeshId = MeshId(1);
    /// Unit quad in the XY plane spanning [0, 1], used by the UI path
    pub const QUAD_2D_MESH: MeshId = MeshId(2);
    /// Two clip-space triangles covering the viewport, used by post-processing
    pub const FULLSCREEN_QUAD_MESH: MeshId = MeshId(3);

    /// 1x1 white
    pub const NULL_DIFFUSE_TEXTURE: TextureId = TextureId(1);
    /// 1x1 flat tangent-space normal
    pub const NULL_NORMAL_TEXTURE: TextureId = TextureId(2);
    /// 1x1 fully rough
    pub const NULL_ROUGHNESS_TEXTURE: TextureId = TextureId(3);
    /// 1x1 non-metallic
    pub const NULL_METALLIC_TEXTURE: TextureId = TextureId(4);

    /// First id returned by the mesh and texture allocators
    pub const FIRST_USER_ID: u32 = 10;

    /// Whether an id lies in the reserved range
    pub const fn is_reserved(id: u32) -> bool {
        id < FIRST_USER_ID
    }
}

bitflags! {
    /// Material and pass flags attached to a draw
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawFlags: u32 {
        /// Blended with what is behind it
        const TRANSPARENT = 1 << 0;
        /// Rendered into the shadow maps
        const SHADOW_CASTER = 1 << 1;
        /// Samples the shadow maps in the main pass
        const SHADOW_RECEIVER = 1 << 2;
        /// Drawn as lines in the main pass
        const WIREFRAME = 1 << 3;
    }
}

/// Vertex layout shared by every generated mesh
///
/// Attribute locations: 0 position, 1 normal, 2 texture coordinate, 3 tangent.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinate
    pub uv: [f32; 2],
    /// Object-space tangent, used for normal mapping
    pub tangent: [f32; 3],
}

impl Vertex {
    /// Create a vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2], tangent: [f32; 3]) -> Self {
        Self { position, normal, uv, tangent }
    }
}

/// Width of the indices of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

/// Index buffer of a generated mesh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshIndices {
    /// 16-bit indices
    U16(Vec<u16>),
    /// 32-bit indices
    U32(Vec<u32>),
}

impl MeshIndices {
    /// Number of indices
    pub fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    /// Whether there are no indices
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index width
    pub const fn index_type(&self) -> IndexType {
        match self {
            Self::U16(_) => IndexType::U16,
            Self::U32(_) => IndexType::U32,
        }
    }

    /// Largest index referenced, if any
    pub fn max_index(&self) -> Option<u32> {
        match self {
            Self::U16(indices) => indices.iter().copied().max().map(u32::from),
            Self::U32(indices) => indices.iter().copied().max(),
        }
    }

    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(indices) => bytemuck::cast_slice(indices),
            Self::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

impl From<Vec<u32>> for MeshIndices {
    fn from(indices: Vec<u32>) -> Self {
        Self::U32(indices)
    }
}

impl From<Vec<u16>> for MeshIndices {
    fn from(indices: Vec<u16>) -> Self {
        Self::U16(indices)
    }
}

/// Channel layout of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TextureFormat {
    /// Single channel
    R,
    /// Two channels
    Rg,
    /// Three channels
    Rgb,
    /// Four channels
    Rgba,
    /// Depth component
    Depth,
}

impl TextureFormat {
    /// Number of channels per texel
    pub const fn channels(self) -> usize {
        match self {
            Self::R | Self::Depth => 1,
            Self::Rg => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Component type of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TextureBaseType {
    /// 8-bit unsigned normalized
    UnsignedByte,
    /// 32-bit float
    Float,
}

impl TextureBaseType {
    /// Size of one component in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::UnsignedByte => 1,
            Self::Float => 4,
        }
    }
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TextureWrap {
    /// Tile
    Repeat,
    /// Tile, mirroring every other repetition
    MirroredRepeat,
    /// Clamp to the border texel
    ClampToEdge,
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TextureFilter {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
}

/// Everything needed to create a 2D texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Channel layout
    pub format: TextureFormat,
    /// Component type
    pub base_type: TextureBaseType,
    /// Wrap mode on both axes
    pub wrap: TextureWrap,
    /// Min and mag filter
    pub filter: TextureFilter,
    /// Tightly packed texel data, rows bottom to top
    pub pixels: Vec<u8>,
}

impl TextureDesc {
    /// RGBA8 texture with repeat wrapping and linear filtering
    pub fn rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba,
            base_type: TextureBaseType::UnsignedByte,
            wrap: TextureWrap::Repeat,
            filter: TextureFilter::Linear,
            pixels,
        }
    }

    /// Set the wrap mode
    #[must_use]
    pub fn with_wrap(mut self, wrap: TextureWrap) -> Self {
        self.wrap = wrap;
        self
    }

    /// Set the filter
    #[must_use]
    pub fn with_filter(mut self, filter: TextureFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Byte length the pixel buffer must have, `None` when it does not fit in `usize`
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.format.channels())?
            .checked_mul(self.base_type.size())
    }

    /// Reject zero-sized or oversized textures and pixel buffers of the wrong length
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidTexture(format!(
                "texture dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        // GL takes sizes as GLsizei
        if self.width > i32::MAX as u32 || self.height > i32::MAX as u32 {
            return Err(RenderError::InvalidTexture(format!(
                "texture dimensions {}x{} exceed {}",
                self.width,
                self.height,
                i32::MAX
            )));
        }
        let Some(expected) = self.expected_len() else {
            return Err(RenderError::InvalidTexture(format!(
                "{}x{} {:?}/{:?} texture is too large to address",
                self.width, self.height, self.format, self.base_type
            )));
        };
        if self.pixels.len() != expected {
            return Err(RenderError::InvalidTexture(format!(
                "{}x{} {:?}/{:?} texture needs {} bytes, got {}",
                self.width,
                self.height,
                self.format,
                self.base_type,
                expected,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}

/// Texture slots of a draw, in uniform binding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Base color
    Diffuse = 0,
    /// Tangent-space normal map
    Normal = 1,
    /// Roughness map
    Roughness = 2,
    /// Metallic map
    Metallic = 3,
}

impl TextureSlot {
    /// All slots in binding order
    pub const ALL: [Self; 4] = [Self::Diffuse, Self::Normal, Self::Roughness, Self::Metallic];

    /// Built-in texture used when the slot's id does not resolve
    pub const fn null_texture(self) -> TextureId {
        match self {
            Self::Diffuse => builtin::NULL_DIFFUSE_TEXTURE,
            Self::Normal => builtin::NULL_NORMAL_TEXTURE,
            Self::Roughness => builtin::NULL_ROUGHNESS_TEXTURE,
            Self::Metallic => builtin::NULL_METALLIC_TEXTURE,
        }
    }
}

/// Request to render one mesh instance
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    /// Model-to-world transform
    pub transform: Mat4,
    /// Mesh to draw
    pub mesh: MeshId,
    /// Textures indexed by [`TextureSlot`]
    pub textures: [TextureId; 4],
    /// Color multiplied into the diffuse term
    pub tint: Vec4,
    /// Material and pass flags
    pub flags: DrawFlags,
}

impl DrawCommand {
    /// Draw `mesh` at `transform` with null textures, white tint and no flags
    pub fn new(transform: Mat4, mesh: MeshId) -> Self {
        Self {
            transform,
            mesh,
            textures: [TextureId::default(); 4],
            tint: Vec4::new(1.0, 1.0, 1.0, 1.0),
            flags: DrawFlags::empty(),
        }
    }

    /// Set the texture of one slot
    #[must_use]
    pub fn with_texture(mut self, slot: TextureSlot, texture: TextureId) -> Self {
        self.textures[slot as usize] = texture;
        self
    }

    /// Set the tint color
    #[must_use]
    pub fn with_tint(mut self, tint: Vec4) -> Self {
        self.tint = tint;
        self
    }

    /// Set the flags
    #[must_use]
    pub fn with_flags(mut self, flags: DrawFlags) -> Self {
        self.flags = flags;
        self
    }

    /// World position of the object (translation of its transform)
    pub fn position(&self) -> Vec3 {
        self.transform.translation_part()
    }

    /// Texture id of one slot
    pub const fn texture(&self, slot: TextureSlot) -> TextureId {
        self.textures[slot as usize]
    }
}

/// Request to create a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateMesh {
    /// Id assigned when the command was queued
    pub id: MeshId,
    /// Vertex data, owned by the command until the backend consumes it
    pub vertices: Vec<Vertex>,
    /// Index data
    pub indices: MeshIndices,
}

impl GenerateMesh {
    /// Reject empty meshes and indices past the end of the vertex buffer
    pub fn validate(&self) -> RenderResult<()> {
        if self.vertices.is_empty() {
            return Err(RenderError::InvalidMesh(format!("mesh {:?} has no vertices", self.id)));
        }
        if self.indices.is_empty() {
            return Err(RenderError::InvalidMesh(format!("mesh {:?} has no indices", self.id)));
        }
        if let Some(max) = self.indices.max_index() {
            if max as usize >= self.vertices.len() {
                return Err(RenderError::InvalidMesh(format!(
                    "mesh {:?} references vertex {} but only has {}",
                    self.id,
                    max,
                    self.vertices.len()
                )));
            }
        }
        Ok(())
    }
}

/// Request to create a texture
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateTexture {
    /// Id assigned when the command was queued
    pub id: TextureId,
    /// Dimensions, format and texel data
    pub desc: TextureDesc,
}

/// Directional light update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLightCommand {
    /// Direction the light travels in
    pub direction: Vec3,
    /// Linear RGB color
    pub color: Vec3,
    /// Whether the light contributes
    pub active: bool,
}

/// Point light update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightCommand {
    /// Slot, `0..MAX_POINT_LIGHTS`
    pub index: usize,
    /// World position
    pub position: Vec3,
    /// Linear RGB color
    pub color: Vec3,
    /// Whether the light contributes and casts shadows
    pub active: bool,
}

/// One renderer request
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Render a mesh instance
    Draw3d(DrawCommand),
    /// Create a mesh
    GenerateMesh(GenerateMesh),
    /// Create a texture
    GenerateTexture(GenerateTexture),
    /// Release meshes
    RetireMeshes(Vec<MeshId>),
    /// Release textures
    RetireTextures(Vec<TextureId>),
    /// Update the directional light
    SetDirectionalLight(DirectionalLightCommand),
    /// Update one point light
    SetPointLight(PointLightCommand),
}

impl RenderCommand {
    /// Short name for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Draw3d(_) => "draw_3d",
            Self::GenerateMesh(_) => "generate_mesh",
            Self::GenerateTexture(_) => "generate_texture",
            Self::RetireMeshes(_) => "retire_meshes",
            Self::RetireTextures(_) => "retire_textures",
            Self::SetDirectionalLight(_) => "set_directional_light",
            Self::SetPointLight(_) => "set_point_light",
        }
    }
}

/// Flat-colored rectangle in pixel space, drawn over the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiRect {
    /// Top-left corner in pixels
    pub position: Vec2,
    /// Width and height in pixels
    pub size: Vec2,
    /// RGBA color
    pub color: Vec4,
}

impl UiRect {
    /// Model matrix mapping the unit quad onto the rectangle
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::new_translation(&Vec3::new(self.position.x, self.position.y, 0.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(self.size.x, self.size.y, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(id: u32) -> GenerateMesh {
        GenerateMesh {
            id: MeshId(id),
            vertices: vec![Vertex::default(); 3],
            indices: vec![0u32, 1, 2].into(),
        }
    }

    #[test]
    fn test_mesh_validation_accepts_triangle() {
        assert!(triangle(10).validate().is_ok());
    }

    #[test]
    fn test_mesh_validation_rejects_out_of_range_index() {
        let mut mesh = triangle(10);
        mesh.indices = vec![0u16, 1, 3].into();
        assert!(matches!(mesh.validate(), Err(RenderError::InvalidMesh(_))));
    }

    #[test]
    fn test_mesh_validation_rejects_empty() {
        let mut mesh = triangle(10);
        mesh.vertices.clear();
        assert!(matches!(mesh.validate(), Err(RenderError::InvalidMesh(_))));
    }

    #[test]
    fn test_texture_validation_checks_length() {
        let ok = TextureDesc::rgba8(2, 2, vec![0; 16]);
        assert!(ok.validate().is_ok());

        let short = TextureDesc::rgba8(2, 2, vec![0; 15]);
        assert!(matches!(short.validate(), Err(RenderError::InvalidTexture(_))));

        let empty = TextureDesc::rgba8(0, 4, Vec::new());
        assert!(matches!(empty.validate(), Err(RenderError::InvalidTexture(_))));
    }

    #[test]
    fn test_float_texture_expected_len() {
        let mut desc = TextureDesc::rgba8(4, 1, Vec::new());
        desc.format = TextureFormat::Rg;
        desc.base_type = TextureBaseType::Float;
        assert_eq!(desc.expected_len(), Some(4 * 2 * 4));
    }

    #[test]
    fn test_texture_validation_rejects_overflowing_size() {
        let mut huge = TextureDesc::rgba8(1 << 30, 1 << 30, Vec::new());
        huge.base_type = TextureBaseType::Float;
        assert!(matches!(huge.validate(), Err(RenderError::InvalidTexture(_))));

        let wide = TextureDesc::rgba8(u32::MAX, 1, Vec::new());
        assert!(matches!(wide.validate(), Err(RenderError::InvalidTexture(_))));
    }

    #[test]
    fn test_each_slot_has_its_own_null_texture() {
        let nulls: Vec<_> = TextureSlot::ALL.iter().map(|s| s.null_texture()).collect();
        for (i, a) in nulls.iter().enumerate() {
            for b in &nulls[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_draw_position_is_translation() {
        let draw = DrawCommand::new(Mat4::new_translation(&Vec3::new(3.0, 0.0, -1.0)), MeshId(10));
        assert_eq!(draw.position(), Vec3::new(3.0, 0.0, -1.0));
        assert_eq!(draw.texture(TextureSlot::Metallic), TextureId(0));
    }

    #[test]
    fn test_index_bytes() {
        let indices: MeshIndices = vec![1u16, 2, 3].into();
        assert_eq!(indices.as_bytes().len(), 6);
        assert_eq!(indices.index_type(), IndexType::U16);
        assert_eq!(indices.max_index(), Some(3));
    }

    #[test]
    fn test_reserved_range() {
        assert!(builtin::is_reserved(builtin::CUBE_MESH.0));
        assert!(builtin::is_reserved(9));
        assert!(!builtin::is_reserved(builtin::FIRST_USER_ID));
    }
}
