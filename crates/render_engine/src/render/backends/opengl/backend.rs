//! OpenGL backend state and initialization

use super::device::{DeviceInfo, GpuDevice};
use super::resources::{Framebuffer, ResourceTables, TextureKey, VertexArrayKey};
use super::shader::ShaderLibrary;
use super::uniforms::UniformBuffers;
use crate::foundation::math::{Mat4, Mat4Ext, Vec4};
use crate::render::api::{BackendKind, RenderBackend, RenderData, RendererConfig};
use crate::render::commands::DrawFlags;
use crate::render::lighting::MAX_POINT_LIGHTS;
use crate::render::surface::GlSurface;
use crate::render::{RenderError, RenderResult};

/// A draw command with its ids resolved to resource slots
///
/// Built once per frame by the remap phase; the queued command keeps its
/// opaque ids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDraw {
    /// Model-to-world transform
    pub transform: Mat4,
    /// Mesh slot
    pub mesh: VertexArrayKey,
    /// Texture slots indexed by [`TextureSlot`](crate::render::TextureSlot)
    pub textures: [TextureKey; 4],
    /// Diffuse tint
    pub tint: Vec4,
    /// Material and pass flags
    pub flags: DrawFlags,
}

impl ResolvedDraw {
    /// Whether the draw goes into the shadow maps
    ///
    /// Wireframe casters are excluded.
    pub fn casts_shadow(&self) -> bool {
        self.flags.contains(DrawFlags::SHADOW_CASTER) && !self.flags.contains(DrawFlags::WIREFRAME)
    }
}

/// Multi-pass OpenGL renderer
///
/// Owns every GPU object it uses: uniform buffers, programs, mesh and texture
/// tables, the main framebuffer and the five shadow framebuffers.
pub struct OpenGlBackend<D: GpuDevice> {
    pub(super) device: D,
    pub(super) surface: Box<dyn GlSurface>,
    pub(super) device_info: DeviceInfo,
    pub(super) uniforms: UniformBuffers<D>,
    pub(super) shaders: ShaderLibrary<D>,
    pub(super) resources: ResourceTables<D>,
    pub(super) main_framebuffer: Framebuffer<D>,
    pub(super) directional_shadow: Framebuffer<D>,
    pub(super) point_shadows: Vec<Framebuffer<D>>,
    pub(super) resolved: Vec<ResolvedDraw>,
    pub(super) clear_color: [f32; 4],
    pub(super) surface_size: (u32, u32),
    pub(super) shut_down: bool,
}

impl<D: GpuDevice> OpenGlBackend<D> {
    /// Stand up every fixed GPU resource
    ///
    /// Any failure here is fatal. Objects created before the failing step
    /// are deleted again.
    ///
    /// # Arguments
    /// * `device` - Device with a current context
    /// * `surface` - Surface the context renders to
    /// * `config` - Renderer configuration
    /// * `framebuffer_size` - Initial offscreen resolution
    pub fn new(
        mut device: D,
        mut surface: Box<dyn GlSurface>,
        config: &RendererConfig,
        framebuffer_size: (u32, u32),
    ) -> RenderResult<Self> {
        let device_info = device.device_info();
        log::info!("OpenGL vendor:   {}", device_info.vendor);
        log::info!("OpenGL renderer: {}", device_info.renderer);
        log::info!("OpenGL version:  {}", device_info.version);
        log::info!("GLSL version:    {}", device_info.glsl_version);
        log::info!("Extensions:      {}", device_info.extension_count);
        check_gl_version(&device_info)?;

        let FixedObjects {
            uniforms,
            shaders,
            resources,
            main_framebuffer,
            directional_shadow,
            point_shadows,
        } = FixedObjects::create(&mut device, config, framebuffer_size)?;

        let surface_size = surface.size();
        uniforms.write_ui_projection(&mut device, &ui_projection(surface_size));
        let swap_interval = surface.set_swap_interval(config.swap_interval());

        let mut backend = Self {
            device,
            surface,
            device_info,
            uniforms,
            shaders,
            resources,
            main_framebuffer,
            directional_shadow,
            point_shadows,
            resolved: Vec::new(),
            clear_color: config.clear_color,
            surface_size,
            shut_down: false,
        };
        if let Err(e) = swap_interval {
            backend.release();
            return Err(e);
        }

        log::info!("OpenGL backend initialized");
        Ok(backend)
    }

    /// Driver identification queried at init
    pub const fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// The GPU device
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Mesh and texture tables
    pub const fn resources(&self) -> &ResourceTables<D> {
        &self.resources
    }

    /// Uniform buffers and light state
    pub const fn uniforms(&self) -> &UniformBuffers<D> {
        &self.uniforms
    }

    /// Draws of the current frame after the remap phase
    pub fn resolved_draws(&self) -> &[ResolvedDraw] {
        &self.resolved
    }

    /// Offscreen target of the main pass
    pub const fn main_framebuffer(&self) -> &Framebuffer<D> {
        &self.main_framebuffer
    }

    /// Shadow target of the directional light
    pub const fn directional_shadow(&self) -> &Framebuffer<D> {
        &self.directional_shadow
    }

    /// Shadow targets of the point lights
    pub fn point_shadows(&self) -> &[Framebuffer<D>] {
        &self.point_shadows
    }

    /// Last surface size seen
    pub const fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    fn release(&mut self) {
        self.resources.destroy(&mut self.device);
        self.shaders.destroy(&mut self.device);
        self.uniforms.destroy(&mut self.device);
        self.main_framebuffer.destroy(&mut self.device);
        self.directional_shadow.destroy(&mut self.device);
        for framebuffer in self.point_shadows.drain(..) {
            framebuffer.destroy(&mut self.device);
        }
        self.resolved.clear();
    }
}

/// Oldest desktop GL the shipped shaders compile on
pub const MIN_GL_VERSION: (u32, u32) = (4, 1);

fn check_gl_version(info: &DeviceInfo) -> RenderResult<()> {
    match info.gl_version() {
        Some(version) if version >= MIN_GL_VERSION => Ok(()),
        Some((major, minor)) => {
            log::error!("OpenGL {}.{} is older than the required {:?}", major, minor, MIN_GL_VERSION);
            Err(RenderError::InitializationFailed(format!(
                "OpenGL {}.{} found, {}.{} required",
                major, minor, MIN_GL_VERSION.0, MIN_GL_VERSION.1
            )))
        }
        None => Err(RenderError::InitializationFailed(format!(
            "no usable desktop OpenGL context (GL_VERSION {:?})",
            info.version
        ))),
    }
}

/// Fixed GPU objects the backend creates at init
struct FixedObjects<D: GpuDevice> {
    uniforms: UniformBuffers<D>,
    shaders: ShaderLibrary<D>,
    resources: ResourceTables<D>,
    main_framebuffer: Framebuffer<D>,
    directional_shadow: Framebuffer<D>,
    point_shadows: Vec<Framebuffer<D>>,
}

impl<D: GpuDevice> FixedObjects<D> {
    /// Create every fixed object; on failure the ones already created are deleted
    fn create(device: &mut D, config: &RendererConfig, framebuffer_size: (u32, u32)) -> RenderResult<Self> {
        let uniforms = UniformBuffers::new(device)?;
        let mut resources = ResourceTables::new(device).inspect_err(|_| uniforms.destroy(device))?;
        let shaders = ShaderLibrary::load(device, &config.shader_dir).inspect_err(|_| {
            resources.destroy(device);
            uniforms.destroy(device);
        })?;

        let (width, height) = framebuffer_size;
        let targets = create_targets(device, (width.max(1), height.max(1)), config.shadow_map_size);
        let (main_framebuffer, directional_shadow, point_shadows) = match targets {
            Ok(targets) => targets,
            Err(e) => {
                shaders.destroy(device);
                resources.destroy(device);
                uniforms.destroy(device);
                return Err(e);
            }
        };
        log::debug!(
            "Created framebuffers (main {}x{}, {} shadow maps of {}x{})",
            width,
            height,
            1 + point_shadows.len(),
            config.shadow_map_size,
            config.shadow_map_size
        );

        Ok(Self {
            uniforms,
            shaders,
            resources,
            main_framebuffer,
            directional_shadow,
            point_shadows,
        })
    }
}

type Targets<D> = (Framebuffer<D>, Framebuffer<D>, Vec<Framebuffer<D>>);

fn create_targets<D: GpuDevice>(
    device: &mut D,
    (width, height): (u32, u32),
    shadow_map_size: u32,
) -> RenderResult<Targets<D>> {
    let main = Framebuffer::main(device, width, height)?;
    let directional = Framebuffer::directional_shadow(device, shadow_map_size).inspect_err(|_| main.destroy(device))?;

    let mut points = Vec::with_capacity(MAX_POINT_LIGHTS);
    for _ in 0..MAX_POINT_LIGHTS {
        match Framebuffer::point_shadow(device, shadow_map_size) {
            Ok(framebuffer) => points.push(framebuffer),
            Err(e) => {
                for framebuffer in points.iter().chain([&main, &directional]) {
                    framebuffer.destroy(device);
                }
                return Err(e);
            }
        }
    }
    Ok((main, directional, points))
}

/// Pixel-space orthographic projection with the origin at the top left
pub fn ui_projection((width, height): (u32, u32)) -> Mat4 {
    Mat4::orthographic(0.0, width.max(1) as f32, height.max(1) as f32, 0.0, -1.0, 1.0)
}

impl<D: GpuDevice + 'static> RenderBackend for OpenGlBackend<D> {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenGl
    }

    fn begin_frame(&mut self, data: &mut RenderData<'_>) -> RenderResult<()> {
        if self.shut_down {
            log::warn!("begin_frame called after shutdown");
            return Ok(());
        }
        self.prepare_frame(data)
    }

    fn end_frame(&mut self, data: &mut RenderData<'_>) -> RenderResult<()> {
        if self.shut_down {
            log::warn!("end_frame called after shutdown");
            return Ok(());
        }
        self.render_passes(data)
    }

    fn on_resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if self.shut_down {
            return Ok(());
        }
        log::debug!("Surface resized to {}x{}", width, height);
        self.surface_size = (width, height);
        self.uniforms.write_ui_projection(&mut self.device, &ui_projection(self.surface_size));
        // show the last frame rescaled until the next one is rendered
        self.present()
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.release();
        self.shut_down = true;
        log::info!("OpenGL backend shut down");
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::super::resources::FRAMEBUFFER_CHECKS;
    use super::super::testing::{shader_dir, Call, FakeSurface, RecordingDevice};
    use super::*;

    fn config() -> RendererConfig {
        RendererConfig::default().with_shader_dir(shader_dir())
    }

    fn assert_nothing_live(device: &RecordingDevice) {
        assert!(device.live_vertex_arrays.is_empty());
        assert!(device.live_textures.is_empty());
        assert!(device.uniform_buffers.is_empty());
    }

    #[test]
    fn test_link_failure_releases_created_objects() {
        let mut device = RecordingDevice::new();
        device.fail_program = Some("shadow_point".into());

        let result = FixedObjects::create(&mut device, &config(), (800, 600));
        assert!(matches!(result.err(), Some(RenderError::Device(_))));
        assert_nothing_live(&device);
        // the four programs linked before it
        assert_eq!(device.count(|call| matches!(call, Call::DeleteProgram { .. })), 4);
    }

    #[test]
    fn test_missing_shaders_release_created_objects() {
        let mut device = RecordingDevice::new();
        let config = RendererConfig::default().with_shader_dir("/nonexistent/shaders");

        let result = FixedObjects::create(&mut device, &config, (800, 600));
        assert!(matches!(result.err(), Some(RenderError::ShaderFileMissing { .. })));
        assert_nothing_live(&device);
        assert_eq!(device.count(|call| matches!(call, Call::DeleteProgram { .. })), 0);
    }

    #[test]
    fn test_framebuffer_failure_releases_created_objects() {
        if !FRAMEBUFFER_CHECKS {
            return;
        }
        let mut device = RecordingDevice::new();
        device.fail_framebuffer_checks = true;

        let result = FixedObjects::create(&mut device, &config(), (800, 600));
        assert!(matches!(result.err(), Some(RenderError::Device(_))));
        assert_nothing_live(&device);
        assert_eq!(device.count(|call| matches!(call, Call::DeleteProgram { .. })), 5);
    }

    #[test]
    fn test_old_or_missing_gl_fails_initialization() {
        for version in ["3.3 (Core Profile) Mesa 23.0.4", "OpenGL ES 3.2", ""] {
            let mut device = RecordingDevice::new();
            device.reported_version = Some(version.into());
            let (surface, _) = FakeSurface::new(800, 600);

            let err = OpenGlBackend::new(device, Box::new(surface), &config(), (800, 600))
                .err()
                .unwrap();
            assert!(matches!(err, RenderError::InitializationFailed(_)), "{version}: {err}");
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_minimum_gl_version_is_accepted() {
        let mut device = RecordingDevice::new();
        device.reported_version = Some("4.1 Metal - 83.1".into());
        let (surface, _) = FakeSurface::new(800, 600);
        assert!(OpenGlBackend::new(device, Box::new(surface), &config(), (800, 600)).is_ok());
    }
}
