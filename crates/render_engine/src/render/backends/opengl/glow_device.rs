//! [`GpuDevice`] over a `glow` OpenGL context

use glow::HasContext;

use super::device::{
    DeviceError, DeviceInfo, DeviceResult, GpuDevice, MeshBuffers, MeshUpload, PrimitiveMode,
    ShaderStage, TextureTarget, TextureUpload,
};
use crate::render::commands::{
    IndexType, TextureBaseType, TextureDesc, TextureFilter, TextureFormat, TextureWrap, Vertex,
};
use crate::render::surface::GlSurface;

/// OpenGL device backed by a loaded `glow` context
pub struct GlowDevice {
    gl: glow::Context,
}

impl GlowDevice {
    /// Wrap an already loaded context
    pub fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    /// Load GL entry points through the surface's proc lookup
    ///
    /// # Safety
    /// The surface's GL context must be current on the calling thread and
    /// stay current and alive for as long as the device is used. Every GL
    /// call the device makes goes through pointers resolved for that context.
    pub unsafe fn from_surface(surface: &dyn GlSurface) -> Self {
        let gl = glow::Context::from_loader_function(|name| surface.get_proc_address(name));
        Self::new(gl)
    }

    /// The underlying context
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn compile_stage(
        &self,
        label: &str,
        stage: ShaderStage,
        source: &str,
    ) -> DeviceResult<glow::NativeShader> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Geometry => glow::GEOMETRY_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };

        unsafe {
            let shader = self
                .gl
                .create_shader(kind)
                .map_err(|e| DeviceError::ObjectCreation(format!("{stage:?} shader: {e}")))?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);

            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(DeviceError::ShaderCompile {
                    program: label.to_string(),
                    stage,
                    log,
                });
            }
            Ok(shader)
        }
    }
}

const fn primitive_mode(mode: PrimitiveMode) -> u32 {
    match mode {
        PrimitiveMode::Triangles => glow::TRIANGLES,
        PrimitiveMode::Lines => glow::LINES,
    }
}

const fn texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2d => glow::TEXTURE_2D,
        TextureTarget::CubeMapArray => glow::TEXTURE_CUBE_MAP_ARRAY,
    }
}

const fn index_type(index_type: IndexType) -> u32 {
    match index_type {
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

/// (internal format, pixel format, pixel type) of a texture description
const fn image_formats(desc: &TextureDesc) -> (u32, u32, u32) {
    let format = match desc.format {
        TextureFormat::R => glow::RED,
        TextureFormat::Rg => glow::RG,
        TextureFormat::Rgb => glow::RGB,
        TextureFormat::Rgba => glow::RGBA,
        TextureFormat::Depth => glow::DEPTH_COMPONENT,
    };
    let internal = match (desc.format, desc.base_type) {
        (TextureFormat::R, TextureBaseType::UnsignedByte) => glow::R8,
        (TextureFormat::Rg, TextureBaseType::UnsignedByte) => glow::RG8,
        (TextureFormat::Rgb, TextureBaseType::UnsignedByte) => glow::RGB8,
        (TextureFormat::Rgba, TextureBaseType::UnsignedByte) => glow::RGBA8,
        (TextureFormat::Depth, TextureBaseType::UnsignedByte) => glow::DEPTH_COMPONENT16,
        (TextureFormat::R, TextureBaseType::Float) => glow::R32F,
        (TextureFormat::Rg, TextureBaseType::Float) => glow::RG32F,
        (TextureFormat::Rgb, TextureBaseType::Float) => glow::RGB32F,
        (TextureFormat::Rgba, TextureBaseType::Float) => glow::RGBA32F,
        (TextureFormat::Depth, TextureBaseType::Float) => glow::DEPTH_COMPONENT32F,
    };
    let ty = match desc.base_type {
        TextureBaseType::UnsignedByte => glow::UNSIGNED_BYTE,
        TextureBaseType::Float => glow::FLOAT,
    };
    (internal, format, ty)
}

impl GpuDevice for GlowDevice {
    type Buffer = glow::NativeBuffer;
    type VertexArray = glow::NativeVertexArray;
    type Texture = glow::NativeTexture;
    type Framebuffer = glow::NativeFramebuffer;
    type Program = glow::NativeProgram;
    type UniformLocation = glow::NativeUniformLocation;

    fn device_info(&self) -> DeviceInfo {
        unsafe {
            DeviceInfo {
                vendor: self.gl.get_parameter_string(glow::VENDOR),
                renderer: self.gl.get_parameter_string(glow::RENDERER),
                version: self.gl.get_parameter_string(glow::VERSION),
                glsl_version: self.gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION),
                extension_count: u32::try_from(self.gl.get_parameter_i32(glow::NUM_EXTENSIONS))
                    .unwrap_or(0),
            }
        }
    }

    fn create_uniform_buffer(&mut self, binding: u32, size: usize) -> DeviceResult<Self::Buffer> {
        unsafe {
            let buffer = self
                .gl
                .create_buffer()
                .map_err(|e| DeviceError::ObjectCreation(format!("uniform buffer: {e}")))?;
            self.gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(glow::UNIFORM_BUFFER, &vec![0u8; size], glow::DYNAMIC_DRAW);
            self.gl.bind_buffer_base(glow::UNIFORM_BUFFER, binding, Some(buffer));
            self.gl.bind_buffer(glow::UNIFORM_BUFFER, None);
            Ok(buffer)
        }
    }

    fn write_uniform_buffer(&mut self, buffer: Self::Buffer, offset: usize, bytes: &[u8]) {
        unsafe {
            self.gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
            self.gl.buffer_sub_data_u8_slice(glow::UNIFORM_BUFFER, offset as i32, bytes);
            self.gl.bind_buffer(glow::UNIFORM_BUFFER, None);
        }
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn create_mesh(
        &mut self,
        upload: MeshUpload<'_>,
    ) -> DeviceResult<MeshBuffers<Self::VertexArray, Self::Buffer>> {
        let stride = std::mem::size_of::<Vertex>() as i32;
        let attributes = [
            (0, 3, std::mem::offset_of!(Vertex, position)),
            (1, 3, std::mem::offset_of!(Vertex, normal)),
            (2, 2, std::mem::offset_of!(Vertex, uv)),
            (3, 3, std::mem::offset_of!(Vertex, tangent)),
        ];

        unsafe {
            let vertex_array = self
                .gl
                .create_vertex_array()
                .map_err(|e| DeviceError::ObjectCreation(format!("vertex array: {e}")))?;
            self.gl.bind_vertex_array(Some(vertex_array));

            let vertex_buffer = self
                .gl
                .create_buffer()
                .map_err(|e| DeviceError::ObjectCreation(format!("vertex buffer: {e}")))?;
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(upload.vertices),
                glow::STATIC_DRAW,
            );

            for (location, components, offset) in attributes {
                self.gl.enable_vertex_attrib_array(location);
                self.gl.vertex_attrib_pointer_f32(
                    location,
                    components,
                    glow::FLOAT,
                    false,
                    stride,
                    offset as i32,
                );
            }

            let index_buffer = match upload.indices {
                Some(indices) => {
                    let buffer = self
                        .gl
                        .create_buffer()
                        .map_err(|e| DeviceError::ObjectCreation(format!("index buffer: {e}")))?;
                    // element array binding is recorded in the vertex array
                    self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer));
                    self.gl.buffer_data_u8_slice(
                        glow::ELEMENT_ARRAY_BUFFER,
                        indices.as_bytes(),
                        glow::STATIC_DRAW,
                    );
                    Some(buffer)
                }
                None => None,
            };

            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(MeshBuffers {
                vertex_array,
                vertex_buffer,
                index_buffer,
            })
        }
    }

    fn delete_mesh(&mut self, buffers: MeshBuffers<Self::VertexArray, Self::Buffer>) {
        unsafe {
            self.gl.delete_vertex_array(buffers.vertex_array);
            self.gl.delete_buffer(buffers.vertex_buffer);
            if let Some(index_buffer) = buffers.index_buffer {
                self.gl.delete_buffer(index_buffer);
            }
        }
    }

    fn create_texture(&mut self, upload: TextureUpload<'_>) -> DeviceResult<Self::Texture> {
        let target = texture_target(upload.target());

        unsafe {
            let texture = self
                .gl
                .create_texture()
                .map_err(|e| DeviceError::ObjectCreation(format!("texture: {e}")))?;
            self.gl.bind_texture(target, Some(texture));

            let (wrap, min_filter, mag_filter) = match upload {
                TextureUpload::Image(desc) => {
                    let (internal, format, ty) = image_formats(desc);
                    self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
                    self.gl.tex_image_2d(
                        target,
                        0,
                        internal as i32,
                        desc.width as i32,
                        desc.height as i32,
                        0,
                        format,
                        ty,
                        glow::PixelUnpackData::Slice(Some(&desc.pixels)),
                    );

                    let wrap = match desc.wrap {
                        TextureWrap::Repeat => glow::REPEAT,
                        TextureWrap::MirroredRepeat => glow::MIRRORED_REPEAT,
                        TextureWrap::ClampToEdge => glow::CLAMP_TO_EDGE,
                    };
                    match desc.filter {
                        TextureFilter::Nearest => (wrap, glow::NEAREST, glow::NEAREST),
                        TextureFilter::Linear => {
                            self.gl.generate_mipmap(target);
                            (wrap, glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR)
                        }
                    }
                }
                TextureUpload::ColorTarget { width, height } => {
                    self.gl.tex_storage_2d(target, 1, glow::RGBA8, width as i32, height as i32);
                    (glow::CLAMP_TO_EDGE, glow::LINEAR, glow::LINEAR)
                }
                TextureUpload::DepthTarget { width, height } => {
                    self.gl.tex_storage_2d(
                        target,
                        1,
                        glow::DEPTH_COMPONENT24,
                        width as i32,
                        height as i32,
                    );
                    (glow::CLAMP_TO_EDGE, glow::NEAREST, glow::NEAREST)
                }
                TextureUpload::DepthCubeArray { size, cubes } => {
                    self.gl.tex_storage_3d(
                        target,
                        1,
                        glow::DEPTH_COMPONENT24,
                        size as i32,
                        size as i32,
                        (cubes * 6) as i32,
                    );
                    (glow::CLAMP_TO_EDGE, glow::NEAREST, glow::NEAREST)
                }
            };

            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap as i32);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap as i32);
            if upload.target() == TextureTarget::CubeMapArray {
                self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, wrap as i32);
            }
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, min_filter as i32);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, mag_filter as i32);
            self.gl.bind_texture(target, None);

            Ok(texture)
        }
    }

    fn delete_texture(&mut self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }

    fn create_framebuffer(
        &mut self,
        color: Option<Self::Texture>,
        depth: Self::Texture,
        depth_target: TextureTarget,
    ) -> DeviceResult<Self::Framebuffer> {
        unsafe {
            let framebuffer = self
                .gl
                .create_framebuffer()
                .map_err(|e| DeviceError::ObjectCreation(format!("framebuffer: {e}")))?;
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));

            match color {
                Some(color) => self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0,
                    glow::TEXTURE_2D,
                    Some(color),
                    0,
                ),
                None => {
                    self.gl.draw_buffer(glow::NONE);
                    self.gl.read_buffer(glow::NONE);
                }
            }

            match depth_target {
                TextureTarget::Texture2d => self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::DEPTH_ATTACHMENT,
                    glow::TEXTURE_2D,
                    Some(depth),
                    0,
                ),
                TextureTarget::CubeMapArray => self.gl.framebuffer_texture(
                    glow::FRAMEBUFFER,
                    glow::DEPTH_ATTACHMENT,
                    Some(depth),
                    0,
                ),
            }

            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            Ok(framebuffer)
        }
    }

    fn check_framebuffer(&mut self, framebuffer: Self::Framebuffer) -> DeviceResult<()> {
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status == glow::FRAMEBUFFER_COMPLETE {
                Ok(())
            } else {
                Err(DeviceError::FramebufferIncomplete { status })
            }
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: Self::Framebuffer) {
        unsafe { self.gl.delete_framebuffer(framebuffer) }
    }

    fn create_program(
        &mut self,
        label: &str,
        stages: &[(ShaderStage, &str)],
    ) -> DeviceResult<Self::Program> {
        let mut shaders = Vec::with_capacity(stages.len());
        for (stage, source) in stages {
            match self.compile_stage(label, *stage, source) {
                Ok(shader) => shaders.push(shader),
                Err(e) => {
                    for shader in shaders {
                        unsafe { self.gl.delete_shader(shader) };
                    }
                    return Err(e);
                }
            }
        }

        unsafe {
            let program = self
                .gl
                .create_program()
                .map_err(|e| DeviceError::ObjectCreation(format!("program '{label}': {e}")))?;
            for shader in &shaders {
                self.gl.attach_shader(program, *shader);
            }
            self.gl.link_program(program);
            let linked = self.gl.get_program_link_status(program);

            for shader in shaders {
                self.gl.detach_shader(program, shader);
                self.gl.delete_shader(shader);
            }

            if !linked {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(DeviceError::ProgramLink {
                    program: label.to_string(),
                    log,
                });
            }
            Ok(program)
        }
    }

    fn delete_program(&mut self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn bind_uniform_block(&mut self, program: Self::Program, block: &str, binding: u32) {
        unsafe {
            if let Some(index) = self.gl.get_uniform_block_index(program, block) {
                self.gl.uniform_block_binding(program, index, binding);
            }
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<Self::Framebuffer>) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) }
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: Option<f32>) {
        let mut mask = 0;
        unsafe {
            if let Some([r, g, b, a]) = color {
                self.gl.clear_color(r, g, b, a);
                mask |= glow::COLOR_BUFFER_BIT;
            }
            if let Some(depth) = depth {
                self.gl.depth_mask(true);
                self.gl.clear_depth_f32(depth);
                mask |= glow::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                self.gl.clear(mask);
            }
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_blending(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::BLEND);
                self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            } else {
                self.gl.disable(glow::BLEND);
            }
        }
    }

    fn use_program(&mut self, program: Self::Program) {
        unsafe { self.gl.use_program(Some(program)) }
    }

    fn bind_vertex_array(&mut self, vertex_array: Self::VertexArray) {
        unsafe { self.gl.bind_vertex_array(Some(vertex_array)) }
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Self::Texture) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(texture_target(target), Some(texture));
        }
    }

    fn set_uniform_mat4(&mut self, location: Option<&Self::UniformLocation>, value: &[f32; 16]) {
        unsafe { self.gl.uniform_matrix_4_f32_slice(location, false, value) }
    }

    fn set_uniform_mat3(&mut self, location: Option<&Self::UniformLocation>, value: &[f32; 9]) {
        unsafe { self.gl.uniform_matrix_3_f32_slice(location, false, value) }
    }

    fn set_uniform_vec4(&mut self, location: Option<&Self::UniformLocation>, value: [f32; 4]) {
        unsafe { self.gl.uniform_4_f32(location, value[0], value[1], value[2], value[3]) }
    }

    fn set_uniform_i32(&mut self, location: Option<&Self::UniformLocation>, value: i32) {
        unsafe { self.gl.uniform_1_i32(location, value) }
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32, ty: IndexType) {
        unsafe { self.gl.draw_elements(primitive_mode(mode), count as i32, index_type(ty), 0) }
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32) {
        unsafe { self.gl.draw_arrays(primitive_mode(mode), first as i32, count as i32) }
    }
}
