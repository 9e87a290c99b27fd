//! GPU resource tables of the OpenGL backend
//!
//! Meshes and textures live in generation-indexed [`SlotMap`]s. The id maps
//! translate the opaque ids game logic holds into slot keys; a retired
//! resource frees its slot and a stale key can never alias a newer resource.
//!
//! Built-in resources (cube, 2D quad, fullscreen quad, the four null textures)
//! are created with the tables and occupy the reserved ids.

use slotmap::{new_key_type, SlotMap};

use super::device::{
    GpuDevice, MeshBuffers, MeshUpload, PrimitiveMode, TextureTarget, TextureUpload,
};
use crate::render::commands::{
    builtin, GenerateMesh, GenerateTexture, IndexType, MeshId, MeshIndices, TextureDesc,
    TextureFilter, TextureFormat, TextureId, TextureSlot, TextureWrap, Vertex,
};
use crate::render::id_map::ResourceIdMap;
use crate::render::{RenderError, RenderResult, ResourceKind};

/// Whether framebuffer completeness is checked after creation
pub const FRAMEBUFFER_CHECKS: bool = cfg!(any(debug_assertions, feature = "gl-validation"));

new_key_type! {
    /// Slot of a mesh in the vertex array table
    pub struct VertexArrayKey;
    /// Slot of a texture in the texture table
    pub struct TextureKey;
}

/// An uploaded mesh
pub struct GpuMesh<D: GpuDevice> {
    /// Vertex array and buffers
    pub buffers: MeshBuffers<D::VertexArray, D::Buffer>,
    /// Index width, `None` for non-indexed meshes
    pub index_type: Option<IndexType>,
    /// Number of indices (or vertices when non-indexed)
    pub count: u32,
    /// Default primitive mode
    pub mode: PrimitiveMode,
}

impl<D: GpuDevice> GpuMesh<D> {
    /// Draw the mesh with `mode`; the vertex array must be bound
    pub fn draw(&self, device: &mut D, mode: PrimitiveMode) {
        match self.index_type {
            Some(index_type) => device.draw_elements(mode, self.count, index_type),
            None => device.draw_arrays(mode, 0, self.count),
        }
    }
}

/// An uploaded 2D texture
pub struct GpuTexture<D: GpuDevice> {
    /// Native texture
    pub texture: D::Texture,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Channel layout
    pub format: TextureFormat,
    /// Wrap mode
    pub wrap: TextureWrap,
    /// Filter
    pub filter: TextureFilter,
}

/// A render target with its attachments
pub struct Framebuffer<D: GpuDevice> {
    /// Native framebuffer
    pub framebuffer: D::Framebuffer,
    /// Color attachment, absent for shadow maps
    pub color: Option<D::Texture>,
    /// Depth attachment
    pub depth: D::Texture,
    /// Target of the depth attachment
    pub depth_target: TextureTarget,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl<D: GpuDevice> Framebuffer<D> {
    /// RGBA8 color + depth target used by the main pass
    pub fn main(device: &mut D, width: u32, height: u32) -> RenderResult<Self> {
        let color = device.create_texture(TextureUpload::ColorTarget { width, height })?;
        let depth = device.create_texture(TextureUpload::DepthTarget { width, height })?;
        Self::assemble(device, Some(color), depth, TextureTarget::Texture2d, width, height)
    }

    /// Depth-only square target of the directional light
    pub fn directional_shadow(device: &mut D, size: u32) -> RenderResult<Self> {
        let depth = device.create_texture(TextureUpload::DepthTarget { width: size, height: size })?;
        Self::assemble(device, None, depth, TextureTarget::Texture2d, size, size)
    }

    /// Depth-only cube map array target (one cube, six layers) of a point light
    pub fn point_shadow(device: &mut D, size: u32) -> RenderResult<Self> {
        let depth = device.create_texture(TextureUpload::DepthCubeArray { size, cubes: 1 })?;
        Self::assemble(device, None, depth, TextureTarget::CubeMapArray, size, size)
    }

    fn assemble(
        device: &mut D,
        color: Option<D::Texture>,
        depth: D::Texture,
        depth_target: TextureTarget,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let framebuffer = device.create_framebuffer(color, depth, depth_target)?;
        let framebuffer = Self {
            framebuffer,
            color,
            depth,
            depth_target,
            width,
            height,
        };

        if FRAMEBUFFER_CHECKS {
            if let Err(e) = device.check_framebuffer(framebuffer.framebuffer) {
                log::error!("Framebuffer {}x{} incomplete: {}", width, height, e);
                framebuffer.destroy(device);
                return Err(e.into());
            }
        }
        Ok(framebuffer)
    }

    /// Size in pixels
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Delete the framebuffer and its attachments
    pub fn destroy(&self, device: &mut D) {
        device.delete_framebuffer(self.framebuffer);
        if let Some(color) = self.color {
            device.delete_texture(color);
        }
        device.delete_texture(self.depth);
    }
}

/// Slot keys of the built-in resources
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinKeys {
    /// Unit cube, the fallback mesh
    pub cube: VertexArrayKey,
    /// Unit quad at the origin in the XY plane, used for UI rectangles
    pub quad_2d: VertexArrayKey,
    /// Non-indexed NDC quad of 6 vertices, used for presentation
    pub fullscreen_quad: VertexArrayKey,
    /// Null textures indexed by [`TextureSlot`]
    pub null_textures: [TextureKey; 4],
}

/// Mesh and texture tables with their id maps
pub struct ResourceTables<D: GpuDevice> {
    vertex_arrays: SlotMap<VertexArrayKey, GpuMesh<D>>,
    textures: SlotMap<TextureKey, GpuTexture<D>>,
    mesh_ids: ResourceIdMap<VertexArrayKey>,
    texture_ids: ResourceIdMap<TextureKey>,
    builtins: BuiltinKeys,
}

impl<D: GpuDevice> ResourceTables<D> {
    /// Create the tables and upload the built-in resources
    ///
    /// Built-ins uploaded before a failure are deleted again.
    pub fn new(device: &mut D) -> RenderResult<Self> {
        let mut tables = Self {
            vertex_arrays: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            mesh_ids: ResourceIdMap::new(ResourceKind::Mesh),
            texture_ids: ResourceIdMap::new(ResourceKind::Texture),
            builtins: BuiltinKeys::default(),
        };

        match tables.upload_builtins(device) {
            Ok(builtins) => tables.builtins = builtins,
            Err(e) => {
                tables.destroy(device);
                return Err(e);
            }
        }

        log::debug!(
            "Created built-in resources ({} meshes, {} textures)",
            tables.vertex_arrays.len(),
            tables.textures.len()
        );
        Ok(tables)
    }

    fn upload_builtins(&mut self, device: &mut D) -> RenderResult<BuiltinKeys> {
        let (vertices, indices) = cube_geometry();
        let cube = self.vertex_arrays.insert(upload_mesh(device, &vertices, Some(&indices))?);
        self.mesh_ids.push(builtin::CUBE_MESH.0, cube)?;

        let (vertices, indices) = quad_2d_geometry();
        let quad_2d = self.vertex_arrays.insert(upload_mesh(device, &vertices, Some(&indices))?);
        self.mesh_ids.push(builtin::QUAD_2D_MESH.0, quad_2d)?;

        let vertices = fullscreen_quad_geometry();
        let fullscreen_quad = self.vertex_arrays.insert(upload_mesh(device, &vertices, None)?);
        self.mesh_ids.push(builtin::FULLSCREEN_QUAD_MESH.0, fullscreen_quad)?;

        let mut null_textures = [TextureKey::default(); 4];
        for slot in TextureSlot::ALL {
            let desc = null_texture_desc(slot);
            let key = self.textures.insert(upload_texture(device, &desc)?);
            self.texture_ids.push(slot.null_texture().0, key)?;
            null_textures[slot as usize] = key;
        }

        Ok(BuiltinKeys {
            cube,
            quad_2d,
            fullscreen_quad,
            null_textures,
        })
    }

    /// Upload a mesh and map its id
    ///
    /// A duplicate id is rejected before anything is uploaded.
    pub fn generate_mesh(&mut self, device: &mut D, command: &GenerateMesh) -> RenderResult<VertexArrayKey> {
        command.validate()?;
        if self.mesh_ids.key_exists(command.id.0) {
            return Err(RenderError::DuplicateResourceId { kind: ResourceKind::Mesh, id: command.id.0 });
        }
        let mesh = upload_mesh(device, &command.vertices, Some(&command.indices))?;
        let key = self.vertex_arrays.insert(mesh);
        self.mesh_ids.push(command.id.0, key)?;
        log::debug!(
            "Generated mesh {} ({} vertices, {} indices)",
            command.id.0,
            command.vertices.len(),
            command.indices.len()
        );
        Ok(key)
    }

    /// Upload a texture and map its id
    pub fn generate_texture(&mut self, device: &mut D, command: &GenerateTexture) -> RenderResult<TextureKey> {
        command.desc.validate()?;
        if self.texture_ids.key_exists(command.id.0) {
            return Err(RenderError::DuplicateResourceId { kind: ResourceKind::Texture, id: command.id.0 });
        }
        let texture = upload_texture(device, &command.desc)?;
        let key = self.textures.insert(texture);
        self.texture_ids.push(command.id.0, key)?;
        log::debug!(
            "Generated texture {} ({}x{} {:?})",
            command.id.0,
            command.desc.width,
            command.desc.height,
            command.desc.format
        );
        Ok(key)
    }

    /// Delete meshes and forget their ids
    ///
    /// Built-in and unknown ids are skipped.
    pub fn retire_meshes(&mut self, device: &mut D, ids: &[MeshId]) {
        for id in ids {
            if builtin::is_reserved(id.0) {
                log::warn!("Ignoring retire of built-in mesh {}", id.0);
                continue;
            }
            match self.mesh_ids.remove(id.0).and_then(|key| self.vertex_arrays.remove(key)) {
                Some(mesh) => {
                    device.delete_mesh(mesh.buffers);
                    log::debug!("Retired mesh {}", id.0);
                }
                None => log::warn!("Retire of unknown mesh {}", id.0),
            }
        }
    }

    /// Delete textures and forget their ids
    ///
    /// Built-in and unknown ids are skipped.
    pub fn retire_textures(&mut self, device: &mut D, ids: &[TextureId]) {
        for id in ids {
            if builtin::is_reserved(id.0) {
                log::warn!("Ignoring retire of built-in texture {}", id.0);
                continue;
            }
            match self.texture_ids.remove(id.0).and_then(|key| self.textures.remove(key)) {
                Some(texture) => {
                    device.delete_texture(texture.texture);
                    log::debug!("Retired texture {}", id.0);
                }
                None => log::warn!("Retire of unknown texture {}", id.0),
            }
        }
    }

    /// Slot of a mesh id, falling back to the built-in cube
    pub fn resolve_mesh(&self, id: MeshId) -> VertexArrayKey {
        self.mesh_ids.get(id.0).unwrap_or_else(|| {
            if id.0 != 0 {
                log::warn!("Mesh {} not found, drawing fallback cube", id.0);
            }
            self.builtins.cube
        })
    }

    /// Slot of a texture id, falling back to the slot's null texture
    pub fn resolve_texture(&self, slot: TextureSlot, id: TextureId) -> TextureKey {
        self.texture_ids.get(id.0).unwrap_or_else(|| {
            if id.0 != 0 {
                log::warn!("Texture {} not found, using null {:?} texture", id.0, slot);
            }
            self.builtins.null_textures[slot as usize]
        })
    }

    /// Mesh in a slot
    pub fn mesh(&self, key: VertexArrayKey) -> Option<&GpuMesh<D>> {
        self.vertex_arrays.get(key)
    }

    /// Texture in a slot
    pub fn texture(&self, key: TextureKey) -> Option<&GpuTexture<D>> {
        self.textures.get(key)
    }

    /// Mesh id map
    pub const fn mesh_ids(&self) -> &ResourceIdMap<VertexArrayKey> {
        &self.mesh_ids
    }

    /// Texture id map
    pub const fn texture_ids(&self) -> &ResourceIdMap<TextureKey> {
        &self.texture_ids
    }

    /// Slot keys of the built-in resources
    pub const fn builtins(&self) -> &BuiltinKeys {
        &self.builtins
    }

    /// Number of live meshes, built-ins included
    pub fn mesh_count(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Number of live textures, built-ins included
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Delete every mesh and texture
    pub fn destroy(&mut self, device: &mut D) {
        for (_, mesh) in self.vertex_arrays.drain() {
            device.delete_mesh(mesh.buffers);
        }
        for (_, texture) in self.textures.drain() {
            device.delete_texture(texture.texture);
        }
        self.mesh_ids.drain().for_each(drop);
        self.texture_ids.drain().for_each(drop);
    }
}

fn upload_mesh<D: GpuDevice>(
    device: &mut D,
    vertices: &[Vertex],
    indices: Option<&MeshIndices>,
) -> RenderResult<GpuMesh<D>> {
    let buffers = device.create_mesh(MeshUpload { vertices, indices })?;
    Ok(GpuMesh {
        buffers,
        index_type: indices.map(MeshIndices::index_type),
        count: indices.map_or(vertices.len(), MeshIndices::len) as u32,
        mode: PrimitiveMode::Triangles,
    })
}

fn upload_texture<D: GpuDevice>(device: &mut D, desc: &TextureDesc) -> RenderResult<GpuTexture<D>> {
    let texture = device.create_texture(TextureUpload::Image(desc))?;
    Ok(GpuTexture {
        texture,
        width: desc.width,
        height: desc.height,
        format: desc.format,
        wrap: desc.wrap,
        filter: desc.filter,
    })
}

/// 1x1 texture a slot falls back to
pub fn null_texture_desc(slot: TextureSlot) -> TextureDesc {
    let texel = match slot {
        TextureSlot::Diffuse => [255, 255, 255, 255],
        // flat tangent-space normal
        TextureSlot::Normal => [128, 128, 255, 255],
        TextureSlot::Roughness => [255, 255, 255, 255],
        TextureSlot::Metallic => [0, 0, 0, 255],
    };
    TextureDesc::rgba8(1, 1, texel.to_vec()).with_filter(TextureFilter::Nearest)
}

/// Unit cube centered at the origin, 4 vertices per face
pub fn cube_geometry() -> (Vec<Vertex>, MeshIndices) {
    // (normal, u axis, v axis), u x v == normal so faces wind counter-clockwise
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    const CORNERS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut vertices = Vec::with_capacity(24);
    let mut indices: Vec<u16> = Vec::with_capacity(36);
    for (normal, u, v) in FACES {
        let base = vertices.len() as u16;
        for [s, t] in CORNERS {
            let position = std::array::from_fn(|i| normal[i] * 0.5 + u[i] * (s - 0.5) + v[i] * (t - 0.5));
            vertices.push(Vertex::new(position, normal, [s, t], u));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices.into())
}

/// Quad spanning (0,0) to (1,1) in the XY plane
pub fn quad_2d_geometry() -> (Vec<Vertex>, MeshIndices) {
    let normal = [0.0, 0.0, 1.0];
    let tangent = [1.0, 0.0, 0.0];
    let vertices = vec![
        Vertex::new([0.0, 0.0, 0.0], normal, [0.0, 0.0], tangent),
        Vertex::new([1.0, 0.0, 0.0], normal, [1.0, 0.0], tangent),
        Vertex::new([1.0, 1.0, 0.0], normal, [1.0, 1.0], tangent),
        Vertex::new([0.0, 1.0, 0.0], normal, [0.0, 1.0], tangent),
    ];
    (vertices, vec![0u16, 1, 2, 0, 2, 3].into())
}

/// Two triangles covering normalized device coordinates
pub fn fullscreen_quad_geometry() -> Vec<Vertex> {
    let normal = [0.0, 0.0, 1.0];
    let tangent = [1.0, 0.0, 0.0];
    [
        ([-1.0, -1.0], [0.0, 0.0]),
        ([1.0, -1.0], [1.0, 0.0]),
        ([1.0, 1.0], [1.0, 1.0]),
        ([-1.0, -1.0], [0.0, 0.0]),
        ([1.0, 1.0], [1.0, 1.0]),
        ([-1.0, 1.0], [0.0, 1.0]),
    ]
    .iter()
    .map(|&([x, y], uv)| Vertex::new([x, y, 0.0], normal, uv, tangent))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_cube_geometry() {
        let (vertices, indices) = cube_geometry();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert_eq!(indices.index_type(), IndexType::U16);
        assert_eq!(indices.max_index(), Some(23));

        for vertex in &vertices {
            let position = Vec3::from(vertex.position);
            let normal = Vec3::from(vertex.normal);
            // every vertex lies on the face its normal points out of
            assert!((position.dot(&normal) - 0.5).abs() < 1e-6);
            assert!(position.iter().all(|c| c.abs() <= 0.5 + 1e-6));
        }
    }

    #[test]
    fn test_cube_faces_wind_outward() {
        let (vertices, indices) = cube_geometry();
        let MeshIndices::U16(indices) = indices else {
            panic!("cube uses 16-bit indices");
        };
        for triangle in indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(vertices[triangle[i] as usize].position));
            let face_normal = (b - a).cross(&(c - a));
            let normal = Vec3::from(vertices[triangle[0] as usize].normal);
            assert!(face_normal.dot(&normal) > 0.0);
        }
    }

    #[test]
    fn test_fullscreen_quad_covers_ndc() {
        let vertices = fullscreen_quad_geometry();
        assert_eq!(vertices.len(), 6);
        for corner in [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]] {
            assert!(vertices.iter().any(|v| v.position[0] == corner[0] && v.position[1] == corner[1]));
        }
    }

    #[test]
    fn test_null_textures_are_valid_and_distinct() {
        let descs: Vec<TextureDesc> = TextureSlot::ALL.iter().map(|&slot| null_texture_desc(slot)).collect();
        for desc in &descs {
            assert!(desc.validate().is_ok());
        }
        assert_ne!(descs[TextureSlot::Metallic as usize].pixels, descs[TextureSlot::Roughness as usize].pixels);
    }
}
