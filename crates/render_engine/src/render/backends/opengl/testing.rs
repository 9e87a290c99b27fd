//! Test doubles for the OpenGL backend: a device that records every call and
//! a surface that counts presents

use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;

use super::device::{
    DeviceError, DeviceInfo, DeviceResult, GpuDevice, MeshBuffers, MeshUpload, PrimitiveMode,
    ShaderStage, TextureTarget, TextureUpload,
};
use crate::render::commands::IndexType;
use crate::render::surface::{GlSurface, RenderSurface};
use crate::render::{RenderError, RenderResult};

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateUniformBuffer { buffer: u32, binding: u32, size: usize },
    WriteUniformBuffer { buffer: u32, offset: usize, len: usize },
    CreateMesh { vertex_array: u32, vertices: usize, indices: Option<usize> },
    DeleteMesh { vertex_array: u32 },
    CreateTexture { texture: u32, target: TextureTarget, size: (u32, u32) },
    DeleteTexture { texture: u32 },
    CreateFramebuffer { framebuffer: u32, color: Option<u32>, depth: u32 },
    DeleteFramebuffer { framebuffer: u32 },
    CreateProgram { program: u32, label: String, stages: Vec<ShaderStage> },
    DeleteProgram { program: u32 },
    BindFramebuffer(Option<u32>),
    Viewport(u32, u32),
    Clear { color: Option<[f32; 4]>, depth: Option<f32> },
    DepthTest(bool),
    Blending(bool),
    UseProgram(u32),
    BindVertexArray(u32),
    BindTexture { unit: u32, target: TextureTarget, texture: u32 },
    SetUniformI32 { name: String, value: i32 },
    SetUniformVec4 { name: String, value: [f32; 4] },
    SetUniformMat4 { name: String },
    SetUniformMat3 { name: String },
    DrawElements { mode: PrimitiveMode, count: u32 },
    DrawArrays { mode: PrimitiveMode, count: u32 },
}

/// [`GpuDevice`] that hands out integer handles and records every call
#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_handle: u32,
    pub calls: Vec<Call>,
    /// Byte contents of every uniform buffer
    pub uniform_buffers: HashMap<u32, Vec<u8>>,
    /// Program label -> handle
    pub programs: HashMap<String, u32>,
    /// Live vertex arrays
    pub live_vertex_arrays: Vec<u32>,
    /// Live textures
    pub live_textures: Vec<u32>,
    /// Link of the program with this label fails
    pub fail_program: Option<String>,
    /// Every framebuffer completeness check fails
    pub fail_framebuffer_checks: bool,
    /// `GL_VERSION` to report instead of 4.6
    pub reported_version: Option<String>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Forget recorded calls, keeping all state
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Read a `T` at `offset` of uniform buffer `buffer`
    pub fn read_uniform<T: bytemuck::Pod>(&self, buffer: u32, offset: usize) -> T {
        let bytes = &self.uniform_buffers[&buffer][offset..offset + std::mem::size_of::<T>()];
        bytemuck::pod_read_unaligned(bytes)
    }
}

impl GpuDevice for RecordingDevice {
    type Buffer = u32;
    type VertexArray = u32;
    type Texture = u32;
    type Framebuffer = u32;
    type Program = u32;
    type UniformLocation = String;

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            vendor: "Recording".into(),
            renderer: "RecordingDevice".into(),
            version: self.reported_version.clone().unwrap_or_else(|| "4.6".into()),
            glsl_version: "4.60".into(),
            extension_count: 0,
        }
    }

    fn create_uniform_buffer(&mut self, binding: u32, size: usize) -> DeviceResult<u32> {
        let buffer = self.handle();
        self.uniform_buffers.insert(buffer, vec![0; size]);
        self.calls.push(Call::CreateUniformBuffer { buffer, binding, size });
        Ok(buffer)
    }

    fn write_uniform_buffer(&mut self, buffer: u32, offset: usize, bytes: &[u8]) {
        let data = self.uniform_buffers.get_mut(&buffer).expect("unknown uniform buffer");
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.calls.push(Call::WriteUniformBuffer { buffer, offset, len: bytes.len() });
    }

    fn delete_buffer(&mut self, buffer: u32) {
        self.uniform_buffers.remove(&buffer);
    }

    fn create_mesh(&mut self, upload: MeshUpload<'_>) -> DeviceResult<MeshBuffers<u32, u32>> {
        let vertex_array = self.handle();
        let vertex_buffer = self.handle();
        let index_buffer = upload.indices.map(|_| self.handle());
        self.live_vertex_arrays.push(vertex_array);
        self.calls.push(Call::CreateMesh {
            vertex_array,
            vertices: upload.vertices.len(),
            indices: upload.indices.map(|indices| indices.len()),
        });
        Ok(MeshBuffers { vertex_array, vertex_buffer, index_buffer })
    }

    fn delete_mesh(&mut self, buffers: MeshBuffers<u32, u32>) {
        self.live_vertex_arrays.retain(|&v| v != buffers.vertex_array);
        self.calls.push(Call::DeleteMesh { vertex_array: buffers.vertex_array });
    }

    fn create_texture(&mut self, upload: TextureUpload<'_>) -> DeviceResult<u32> {
        let texture = self.handle();
        let size = match upload {
            TextureUpload::Image(desc) => (desc.width, desc.height),
            TextureUpload::ColorTarget { width, height } | TextureUpload::DepthTarget { width, height } => {
                (width, height)
            }
            TextureUpload::DepthCubeArray { size, .. } => (size, size),
        };
        self.live_textures.push(texture);
        self.calls.push(Call::CreateTexture { texture, target: upload.target(), size });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: u32) {
        self.live_textures.retain(|&t| t != texture);
        self.calls.push(Call::DeleteTexture { texture });
    }

    fn create_framebuffer(&mut self, color: Option<u32>, depth: u32, _: TextureTarget) -> DeviceResult<u32> {
        let framebuffer = self.handle();
        self.calls.push(Call::CreateFramebuffer { framebuffer, color, depth });
        Ok(framebuffer)
    }

    fn check_framebuffer(&mut self, _: u32) -> DeviceResult<()> {
        if self.fail_framebuffer_checks {
            Err(DeviceError::FramebufferIncomplete { status: 0x8CD6 })
        } else {
            Ok(())
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: u32) {
        self.calls.push(Call::DeleteFramebuffer { framebuffer });
    }

    fn create_program(&mut self, label: &str, stages: &[(ShaderStage, &str)]) -> DeviceResult<u32> {
        if self.fail_program.as_deref() == Some(label) {
            return Err(DeviceError::ProgramLink {
                program: label.to_string(),
                log: "injected link failure".into(),
            });
        }
        let program = self.handle();
        self.programs.insert(label.to_string(), program);
        self.calls.push(Call::CreateProgram {
            program,
            label: label.to_string(),
            stages: stages.iter().map(|(stage, _)| *stage).collect(),
        });
        Ok(program)
    }

    fn delete_program(&mut self, program: u32) {
        self.calls.push(Call::DeleteProgram { program });
    }

    fn uniform_location(&self, _: u32, name: &str) -> Option<String> {
        Some(name.to_string())
    }

    fn bind_uniform_block(&mut self, _: u32, _: &str, _: u32) {}

    fn bind_framebuffer(&mut self, framebuffer: Option<u32>) {
        self.calls.push(Call::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.calls.push(Call::Viewport(width, height));
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>) {
        self.calls.push(Call::Clear { color, depth });
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.calls.push(Call::DepthTest(enabled));
    }

    fn set_blending(&mut self, enabled: bool) {
        self.calls.push(Call::Blending(enabled));
    }

    fn use_program(&mut self, program: u32) {
        self.calls.push(Call::UseProgram(program));
    }

    fn bind_vertex_array(&mut self, vertex_array: u32) {
        self.calls.push(Call::BindVertexArray(vertex_array));
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: u32) {
        self.calls.push(Call::BindTexture { unit, target, texture });
    }

    fn set_uniform_mat4(&mut self, location: Option<&String>, _: &[f32; 16]) {
        if let Some(name) = location {
            self.calls.push(Call::SetUniformMat4 { name: name.clone() });
        }
    }

    fn set_uniform_mat3(&mut self, location: Option<&String>, _: &[f32; 9]) {
        if let Some(name) = location {
            self.calls.push(Call::SetUniformMat3 { name: name.clone() });
        }
    }

    fn set_uniform_vec4(&mut self, location: Option<&String>, value: [f32; 4]) {
        if let Some(name) = location {
            self.calls.push(Call::SetUniformVec4 { name: name.clone(), value });
        }
    }

    fn set_uniform_i32(&mut self, location: Option<&String>, value: i32) {
        if let Some(name) = location {
            self.calls.push(Call::SetUniformI32 { name: name.clone(), value });
        }
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, _: IndexType) {
        self.calls.push(Call::DrawElements { mode, count });
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, _: u32, count: u32) {
        self.calls.push(Call::DrawArrays { mode, count });
    }
}

/// Counters shared between a [`FakeSurface`] and the test holding it
#[derive(Debug, Clone, Default)]
pub struct SurfaceStats {
    pub swaps: Rc<Cell<usize>>,
    pub swap_interval: Rc<Cell<Option<i32>>>,
}

/// Surface of fixed size that counts swaps
#[derive(Debug)]
pub struct FakeSurface {
    pub size: (u32, u32),
    pub stats: SurfaceStats,
    pub fail_swap: bool,
}

impl FakeSurface {
    pub fn new(width: u32, height: u32) -> (Self, SurfaceStats) {
        let stats = SurfaceStats::default();
        let surface = Self { size: (width, height), stats: stats.clone(), fail_swap: false };
        (surface, stats)
    }
}

impl RenderSurface for FakeSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn swap_buffers(&mut self) -> RenderResult<()> {
        if self.fail_swap {
            return Err(RenderError::Surface("swap failed".into()));
        }
        self.stats.swaps.set(self.stats.swaps.get() + 1);
        Ok(())
    }

    fn set_swap_interval(&mut self, interval: i32) -> RenderResult<()> {
        self.stats.swap_interval.set(Some(interval));
        Ok(())
    }
}

impl GlSurface for FakeSurface {
    fn get_proc_address(&self, _: &str) -> *const c_void {
        std::ptr::null()
    }
}

/// Directory of the shipped GLSL sources
pub fn shader_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../resources/shaders")
}
