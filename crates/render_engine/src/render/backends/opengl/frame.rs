//! Per-frame algorithm of the OpenGL backend
//!
//! `begin_frame`:
//! 1. sort draws back to front (when a camera is bound)
//! 2. lifecycle phase: generate/retire resources, update lights
//! 3. remap phase: resolve draw ids to resource slots with fallbacks
//! 4. camera and frame uniforms
//! 5. resize reconciliation of the main framebuffer
//! 6. clear the main and shadow framebuffers
//!
//! `end_frame`:
//! 1. shadow pass (directional, then every active point light)
//! 2. main pass
//! 3. UI pass
//! 4. post-process blit to the default framebuffer and swap

use super::backend::{OpenGlBackend, ResolvedDraw};
use super::device::{GpuDevice, PrimitiveMode, TextureTarget};
use super::resources::{Framebuffer, ResourceTables};
use super::shader::{DIRECTIONAL_SHADOW_UNIT, MATERIAL_TEXTURE_UNIT, POINT_SHADOW_UNIT, POST_PROCESS_INPUT_UNIT};
use crate::foundation::math::{Mat4Ext, Mat3};
use crate::render::api::RenderData;
use crate::render::commands::{DrawCommand, DrawFlags, RenderCommand, TextureSlot};
use crate::render::lighting::{DirectionalLight, PointLight, MAX_POINT_LIGHTS};
use crate::render::{RenderError, RenderResult};

/// Resolve every id of a draw, substituting built-ins on a miss
pub fn resolve_draw<D: GpuDevice>(resources: &ResourceTables<D>, draw: &DrawCommand) -> ResolvedDraw {
    ResolvedDraw {
        transform: draw.transform,
        mesh: resources.resolve_mesh(draw.mesh),
        textures: TextureSlot::ALL.map(|slot| resources.resolve_texture(slot, draw.texture(slot))),
        tint: draw.tint,
        flags: draw.flags,
    }
}

fn mat3_to_cols(matrix: &Mat3) -> [f32; 9] {
    let mut out = [0.0; 9];
    out.copy_from_slice(matrix.as_slice());
    out
}

impl<D: GpuDevice> OpenGlBackend<D> {
    pub(super) fn prepare_frame(&mut self, data: &mut RenderData<'_>) -> RenderResult<()> {
        log::trace!("Begin frame {}", data.time.frame);

        if let Some(camera) = data.camera.as_deref() {
            data.commands.sort_draws_back_to_front(camera.transform.world_position());
        }

        for command in data.commands.take_lifecycle() {
            let name = command.name();
            if let Err(e) = self.execute_lifecycle(command) {
                if e.is_fatal() {
                    log::error!("Fatal error executing {}: {}", name, e);
                    return Err(e);
                }
                log::warn!("Skipped {}: {}", name, e);
            }
        }

        let resources = &self.resources;
        self.resolved.clear();
        self.resolved
            .extend(data.commands.draws().iter().map(|draw| resolve_draw(resources, draw)));

        let aspect = data.aspect_ratio();
        if let Some(camera) = data.camera.as_deref_mut() {
            if camera.transform.is_dirty() || data.projection_dirty {
                let view_projection = camera.view_projection(aspect);
                self.uniforms.write_camera(
                    &mut self.device,
                    &view_projection,
                    camera.transform.world_position(),
                    camera.near(),
                    camera.far(),
                );
                camera.transform.mark_clean();
                data.projection_dirty = false;
            }
        }
        self.uniforms.write_frame(&mut self.device, data.time, data.framebuffer_size);

        self.reconcile_main_framebuffer(data.framebuffer_size)?;
        self.clear_targets();
        Ok(())
    }

    fn execute_lifecycle(&mut self, command: RenderCommand) -> RenderResult<()> {
        match command {
            RenderCommand::GenerateMesh(generate) => {
                self.resources.generate_mesh(&mut self.device, &generate)?;
            }
            RenderCommand::GenerateTexture(generate) => {
                self.resources.generate_texture(&mut self.device, &generate)?;
            }
            RenderCommand::RetireMeshes(ids) => self.resources.retire_meshes(&mut self.device, &ids),
            RenderCommand::RetireTextures(ids) => self.resources.retire_textures(&mut self.device, &ids),
            RenderCommand::SetDirectionalLight(light) => self.uniforms.set_directional_light(
                &mut self.device,
                DirectionalLight {
                    direction: light.direction,
                    color: light.color,
                    active: light.active,
                },
            ),
            RenderCommand::SetPointLight(light) => {
                if light.index >= MAX_POINT_LIGHTS {
                    return Err(RenderError::InvalidLightIndex(light.index));
                }
                self.uniforms.set_point_light(
                    &mut self.device,
                    light.index,
                    PointLight {
                        position: light.position,
                        color: light.color,
                        active: light.active,
                    },
                );
            }
            RenderCommand::Draw3d(_) => {
                log::warn!("Draw command found in lifecycle region, ignoring");
            }
        }
        Ok(())
    }

    /// Recreate the main framebuffer when the requested size changed
    ///
    /// Contents are not preserved.
    fn reconcile_main_framebuffer(&mut self, (width, height): (u32, u32)) -> RenderResult<()> {
        let wanted = (width.max(1), height.max(1));
        if self.main_framebuffer.size() == wanted {
            return Ok(());
        }

        log::debug!(
            "Recreating main framebuffer {:?} -> {:?}",
            self.main_framebuffer.size(),
            wanted
        );
        let replacement = Framebuffer::main(&mut self.device, wanted.0, wanted.1)?;
        let stale = std::mem::replace(&mut self.main_framebuffer, replacement);
        stale.destroy(&mut self.device);
        Ok(())
    }

    fn clear_targets(&mut self) {
        self.device.bind_framebuffer(Some(self.main_framebuffer.framebuffer));
        self.device.clear(Some(self.clear_color), Some(1.0));

        self.device.bind_framebuffer(Some(self.directional_shadow.framebuffer));
        self.device.clear(None, Some(1.0));

        for framebuffer in &self.point_shadows {
            self.device.bind_framebuffer(Some(framebuffer.framebuffer));
            self.device.clear(None, Some(1.0));
        }
    }

    pub(super) fn render_passes(&mut self, data: &mut RenderData<'_>) -> RenderResult<()> {
        self.shadow_pass();
        self.main_pass();
        data.ui_object_count = self.ui_pass(data);
        self.present()?;
        log::trace!("End frame {}", data.time.frame);
        Ok(())
    }

    fn shadow_pass(&mut self) {
        self.device.set_depth_test(true);
        self.device.set_blending(false);

        let active_points: Vec<usize> = self.uniforms.active_point_lights().collect();
        let directional = &self.shaders.shadow_directional;
        let point = &self.shaders.shadow_point;

        for draw in self.resolved.iter().filter(|draw| draw.casts_shadow()) {
            let Some(mesh) = self.resources.mesh(draw.mesh) else {
                continue;
            };
            let transform = draw.transform.to_cols_array();

            self.device.bind_framebuffer(Some(self.directional_shadow.framebuffer));
            self.device.set_viewport(self.directional_shadow.width, self.directional_shadow.height);
            self.device.use_program(directional.program());
            self.device.bind_vertex_array(mesh.buffers.vertex_array);
            self.device.set_uniform_mat4(directional.uniform("u_transform"), &transform);
            mesh.draw(&mut self.device, mesh.mode);

            for &index in &active_points {
                let framebuffer = &self.point_shadows[index];
                self.device.bind_framebuffer(Some(framebuffer.framebuffer));
                self.device.set_viewport(framebuffer.width, framebuffer.height);
                self.device.use_program(point.program());
                self.device.bind_vertex_array(mesh.buffers.vertex_array);
                self.device.set_uniform_i32(point.uniform("u_point_index"), index as i32);
                self.device.set_uniform_mat4(point.uniform("u_transform"), &transform);
                mesh.draw(&mut self.device, mesh.mode);
            }
        }
    }

    fn main_pass(&mut self) {
        let program = &self.shaders.phong_brdf;

        self.device.bind_framebuffer(Some(self.main_framebuffer.framebuffer));
        self.device.set_viewport(self.main_framebuffer.width, self.main_framebuffer.height);
        self.device.set_depth_test(true);
        self.device.set_blending(true);
        self.device.use_program(program.program());

        self.device.bind_texture(
            DIRECTIONAL_SHADOW_UNIT,
            self.directional_shadow.depth_target,
            self.directional_shadow.depth,
        );
        for (index, framebuffer) in self.point_shadows.iter().enumerate() {
            self.device.bind_texture(
                POINT_SHADOW_UNIT + index as u32,
                framebuffer.depth_target,
                framebuffer.depth,
            );
        }

        for draw in &self.resolved {
            let Some(mesh) = self.resources.mesh(draw.mesh) else {
                continue;
            };
            self.device.bind_vertex_array(mesh.buffers.vertex_array);

            for slot in TextureSlot::ALL {
                if let Some(texture) = self.resources.texture(draw.textures[slot as usize]) {
                    self.device.bind_texture(
                        MATERIAL_TEXTURE_UNIT + slot as u32,
                        TextureTarget::Texture2d,
                        texture.texture,
                    );
                }
            }

            let receiver = i32::from(draw.flags.contains(DrawFlags::SHADOW_RECEIVER));
            self.device.set_uniform_vec4(program.uniform("u_tint"), draw.tint.into());
            self.device.set_uniform_i32(program.uniform("u_shadow_receiver"), receiver);
            self.device.set_uniform_mat4(program.uniform("u_transform"), &draw.transform.to_cols_array());
            self.device.set_uniform_mat3(
                program.uniform("u_normal_matrix"),
                &mat3_to_cols(&draw.transform.normal_matrix()),
            );

            let mode = if draw.flags.contains(DrawFlags::WIREFRAME) {
                PrimitiveMode::Lines
            } else {
                mesh.mode
            };
            mesh.draw(&mut self.device, mode);
        }
    }

    /// Draw the queued UI rectangles over the scene, returning how many
    fn ui_pass(&mut self, data: &RenderData<'_>) -> usize {
        let rects = data.commands.ui_rects();
        if rects.is_empty() {
            return 0;
        }
        let Some(quad) = self.resources.mesh(self.resources.builtins().quad_2d) else {
            return 0;
        };
        let program = &self.shaders.ui_debug_color;

        self.device.set_depth_test(false);
        self.device.set_blending(true);
        self.device.use_program(program.program());
        self.device.bind_vertex_array(quad.buffers.vertex_array);

        for rect in rects {
            self.device.set_uniform_mat4(program.uniform("u_transform"), &rect.model_matrix().to_cols_array());
            self.device.set_uniform_vec4(program.uniform("u_color"), rect.color.into());
            quad.draw(&mut self.device, quad.mode);
        }
        rects.len()
    }

    /// Blit the main framebuffer to the default one and swap
    pub(super) fn present(&mut self) -> RenderResult<()> {
        let (width, height) = self.surface_size;
        let program = &self.shaders.post_process;

        self.device.bind_framebuffer(None);
        self.device.set_viewport(width, height);
        self.device.set_depth_test(false);
        self.device.set_blending(false);
        self.device.use_program(program.program());

        if let (Some(quad), Some(color)) = (
            self.resources.mesh(self.resources.builtins().fullscreen_quad),
            self.main_framebuffer.color,
        ) {
            self.device.bind_vertex_array(quad.buffers.vertex_array);
            self.device.bind_texture(POST_PROCESS_INPUT_UNIT, TextureTarget::Texture2d, color);
            self.device.draw_arrays(PrimitiveMode::Triangles, 0, 6);
        }

        self.surface.swap_buffers()
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use super::super::resources::FRAMEBUFFER_CHECKS;
    use super::super::testing::{shader_dir, Call, FakeSurface, RecordingDevice};
    use super::super::ui_projection;
    use super::super::uniforms::{CameraUbo, FrameUbo, LightsUbo, PointLightUbo};
    use super::*;
    use crate::foundation::math::{mat4_to_cols, Mat4, Point3, Quat, Vec3};
    use crate::render::api::RendererConfig;
    use crate::render::camera::{Camera, CameraTransform};
    use crate::render::commands::builtin;
    use crate::render::lighting::{directional_light_space_matrix, point_light_space_matrices};
    use crate::render::Renderer;

    fn renderer() -> Renderer {
        let (surface, _) = FakeSurface::new(800, 600);
        let config = RendererConfig::default().with_shader_dir(shader_dir());
        Renderer::init_with_device(RecordingDevice::new(), Box::new(surface), config).unwrap()
    }

    fn backend(renderer: &mut Renderer) -> &mut OpenGlBackend<RecordingDevice> {
        renderer.backend_mut().as_any_mut().downcast_mut().unwrap()
    }

    fn lights(renderer: &mut Renderer) -> LightsUbo {
        let backend = backend(renderer);
        backend.device.read_uniform(backend.uniforms.lights_buffer(), 0)
    }

    fn writes_at(renderer: &mut Renderer, buffer: fn(&OpenGlBackend<RecordingDevice>) -> u32, at: usize) -> usize {
        let backend = backend(renderer);
        let buffer = buffer(backend);
        backend
            .device
            .count(|call| matches!(call, Call::WriteUniformBuffer { buffer: b, offset, .. } if *b == buffer && *offset == at))
    }

    fn white() -> Vec3 {
        Vec3::new(1.0, 1.0, 1.0)
    }

    fn uploaded_ui_projection(renderer: &mut Renderer) -> [[f32; 4]; 4] {
        let backend = backend(renderer);
        let ubo: CameraUbo = backend.device.read_uniform(backend.uniforms.camera_buffer(), 0);
        ubo.ui_projection
    }

    #[test]
    fn test_ui_projection_written_at_init_and_on_resize() {
        let mut renderer = renderer();
        assert_eq!(uploaded_ui_projection(&mut renderer), mat4_to_cols(&ui_projection((800, 600))));

        renderer.on_resize(1280, 720).unwrap();
        assert_eq!(uploaded_ui_projection(&mut renderer), mat4_to_cols(&ui_projection((1280, 720))));

        // top-left pixel origin, y down
        let corner = ui_projection((1280, 720)).transform_point(&Point3::new(1280.0, 720.0, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_every_target_cleared_once_per_frame() {
        let clear_color = [0.1, 0.2, 0.3, 1.0];
        let (surface, _) = FakeSurface::new(800, 600);
        let config = RendererConfig::default()
            .with_shader_dir(shader_dir())
            .with_clear_color(clear_color);
        let mut renderer = Renderer::init_with_device(RecordingDevice::new(), Box::new(surface), config).unwrap();
        backend(&mut renderer).device.clear_calls();
        renderer.render(0.016).unwrap();

        let backend = backend(&mut renderer);
        let clears: Vec<(Option<u32>, Option<[f32; 4]>, Option<f32>)> = backend
            .device
            .calls
            .windows(2)
            .filter_map(|pair| match pair {
                [Call::BindFramebuffer(target), Call::Clear { color, depth }] => Some((*target, *color, *depth)),
                _ => None,
            })
            .collect();
        // each clear directly follows the bind of its target
        assert_eq!(backend.device.count(|call| matches!(call, Call::Clear { .. })), clears.len());

        let mut expected = vec![
            (Some(backend.main_framebuffer.framebuffer), Some(clear_color), Some(1.0)),
            (Some(backend.directional_shadow.framebuffer), None, Some(1.0)),
        ];
        expected.extend(
            backend
                .point_shadows
                .iter()
                .map(|framebuffer| (Some(framebuffer.framebuffer), None, Some(1.0))),
        );
        assert_eq!(clears.len(), 2 + MAX_POINT_LIGHTS);
        assert_eq!(clears, expected);
    }

    #[test]
    fn test_point_light_matrices_are_uploaded() {
        let mut renderer = renderer();
        let position = Vec3::new(0.0, 5.0, 0.0);
        renderer.set_point_light(0, position, white(), true).unwrap();
        renderer.render(0.016).unwrap();

        let ubo = lights(&mut renderer);
        let expected = point_light_space_matrices(position);
        for face in 0..6 {
            assert_eq!(ubo.points[0].light_space[face], mat4_to_cols(&expected[face]));
        }
        assert_eq!(ubo.points[0].active, 1);
        assert_eq!(&ubo.points[0].position[..3], &[0.0, 5.0, 0.0]);
        assert_eq!(&ubo.points[0].clipping_planes[..2], &[1.0, 25.0]);
        assert_eq!(ubo.points[1].active, 0);

        let active: Vec<usize> = backend(&mut renderer).uniforms.active_point_lights().collect();
        assert_eq!(active, vec![0]);
    }

    #[test]
    fn test_point_light_matrices_only_recomputed_on_move() {
        let mut renderer = renderer();
        let base = offset_of!(LightsUbo, points);
        let matrices = base + offset_of!(PointLightUbo, light_space);
        let planes = base + offset_of!(PointLightUbo, clipping_planes);
        let lights_buffer = |backend: &OpenGlBackend<RecordingDevice>| backend.uniforms.lights_buffer();

        renderer.set_point_light(0, Vec3::new(0.0, 5.0, 0.0), white(), true).unwrap();
        renderer.render(0.016).unwrap();
        renderer.set_point_light(0, Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, 0.0, 0.0), true).unwrap();
        renderer.render(0.016).unwrap();
        assert_eq!(writes_at(&mut renderer, lights_buffer, matrices), 1);

        renderer.set_point_light(0, Vec3::new(2.0, 5.0, 0.0), white(), true).unwrap();
        renderer.render(0.016).unwrap();
        assert_eq!(writes_at(&mut renderer, lights_buffer, matrices), 2);
        assert_eq!(writes_at(&mut renderer, lights_buffer, planes), 1);

        let ubo = lights(&mut renderer);
        assert_eq!(&ubo.points[0].position[..3], &[2.0, 5.0, 0.0]);
    }

    #[test]
    fn test_directional_light_upload() {
        let mut renderer = renderer();
        let direction = Vec3::new(0.0, -1.0, -1.0);
        renderer.set_directional_light(direction, white(), true).unwrap();
        renderer.render(0.016).unwrap();

        let ubo = lights(&mut renderer);
        assert_eq!(ubo.directional.active, 1);
        assert_eq!(
            ubo.directional.light_space,
            mat4_to_cols(&directional_light_space_matrix(direction))
        );
        assert_eq!(&ubo.directional.color[..3], &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_camera_uniforms_written_only_when_dirty() {
        let mut renderer = renderer();
        let view_projection = offset_of!(CameraUbo, view_projection);
        let camera_buffer = |backend: &OpenGlBackend<RecordingDevice>| backend.uniforms.camera_buffer();

        renderer.set_camera(Camera::perspective(
            CameraTransform::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y()),
            60.0,
            0.1,
            100.0,
        ))
        .unwrap();
        renderer.render(0.016).unwrap();
        renderer.render(0.016).unwrap();
        assert_eq!(writes_at(&mut renderer, camera_buffer, view_projection), 1);

        if let Some(camera) = renderer.camera_mut() {
            camera.transform.set_position(Vec3::new(0.0, 1.0, 5.0));
        }
        renderer.render(0.016).unwrap();
        assert_eq!(writes_at(&mut renderer, camera_buffer, view_projection), 2);

        renderer.on_resize(1024, 768).unwrap();
        renderer.render(0.016).unwrap();
        assert_eq!(writes_at(&mut renderer, camera_buffer, view_projection), 3);

        let backend = backend(&mut renderer);
        let ubo: CameraUbo = backend.device.read_uniform(backend.uniforms.camera_buffer(), 0);
        assert_eq!(&ubo.position[..3], &[0.0, 1.0, 5.0]);
        assert_eq!(&ubo.clipping_planes[..2], &[0.1, 100.0]);
    }

    #[test]
    fn test_draws_sorted_back_to_front() {
        let mut renderer = renderer();
        renderer.set_camera(Camera::perspective(
            CameraTransform::new(Vec3::zeros(), Quat::identity()),
            60.0,
            0.1,
            100.0,
        ))
        .unwrap();
        for z in [-2.0, -10.0, -5.0] {
            let transform = Mat4::new_translation(&Vec3::new(0.0, 0.0, z));
            renderer.draw(DrawCommand::new(transform, builtin::CUBE_MESH)).unwrap();
        }
        renderer.render(0.016).unwrap();

        let order: Vec<f32> = backend(&mut renderer)
            .resolved_draws()
            .iter()
            .map(|draw| draw.transform.translation_part().z)
            .collect();
        assert_eq!(order, vec![-10.0, -5.0, -2.0]);
    }

    #[test]
    fn test_frame_uniforms() {
        let mut renderer = renderer();
        renderer.render(0.5).unwrap();
        renderer.render(0.25).unwrap();

        let backend = backend(&mut renderer);
        let ubo: FrameUbo = backend.device.read_uniform(backend.uniforms.frame_buffer(), 0);
        assert_eq!(ubo.frame, 1);
        assert_eq!(ubo.time, 0.75);
        assert_eq!(ubo.delta, 0.25);
        assert_eq!(ubo.resolution, [800.0, 600.0, 1.0 / 800.0, 1.0 / 600.0]);
    }

    #[test]
    fn test_shadow_casters_render_into_every_active_light() {
        let mut renderer = renderer();
        renderer.set_directional_light(Vec3::new(0.0, -1.0, 0.0), white(), true).unwrap();
        renderer.set_point_light(0, Vec3::new(0.0, 5.0, 0.0), white(), true).unwrap();
        renderer.set_point_light(2, Vec3::new(3.0, 5.0, 0.0), white(), true).unwrap();
        renderer
            .draw(
                DrawCommand::new(Mat4::identity(), builtin::CUBE_MESH)
                    .with_flags(DrawFlags::SHADOW_CASTER | DrawFlags::SHADOW_RECEIVER),
            )
            .unwrap();
        renderer.draw(DrawCommand::new(Mat4::identity(), builtin::CUBE_MESH)).unwrap();
        backend(&mut renderer).device.clear_calls();
        renderer.render(0.016).unwrap();

        let device = &backend(&mut renderer).device;
        // 1 directional + 2 point shadow draws, then 2 main-pass draws
        assert_eq!(device.count(|call| matches!(call, Call::DrawElements { count: 36, .. })), 5);
        let point_indices: Vec<i32> = device
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::SetUniformI32 { name, value } if name == "u_point_index" => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(point_indices, vec![0, 2]);
        let receivers: Vec<i32> = device
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::SetUniformI32 { name, value } if name == "u_shadow_receiver" => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(receivers.len(), 2);
        assert!(receivers.contains(&1) && receivers.contains(&0));
        // main pass samples the shadow maps on their fixed units
        for unit in 4..9 {
            assert!(device.calls.iter().any(|call| matches!(call, Call::BindTexture { unit: u, .. } if *u == unit)));
        }
    }

    #[test]
    fn test_frame_presents_main_framebuffer() {
        let mut renderer = renderer();
        backend(&mut renderer).device.clear_calls();
        renderer.render(0.016).unwrap();

        let backend = backend(&mut renderer);
        let color = backend.main_framebuffer.color;
        let device = &backend.device;
        let tail = &device.calls[device.calls.len() - 3..];
        assert!(matches!(tail[0], Call::BindVertexArray(_)));
        assert_eq!(
            tail[1],
            Call::BindTexture {
                unit: POST_PROCESS_INPUT_UNIT,
                target: TextureTarget::Texture2d,
                texture: color.unwrap(),
            }
        );
        assert_eq!(tail[2], Call::DrawArrays { mode: PrimitiveMode::Triangles, count: 6 });
        assert!(device.calls.contains(&Call::BindFramebuffer(None)));
        assert!(device.calls.contains(&Call::Viewport(800, 600)));
    }

    #[test]
    fn test_incomplete_framebuffer_is_fatal() {
        if !FRAMEBUFFER_CHECKS {
            return;
        }
        let (surface, _) = FakeSurface::new(800, 600);
        let mut device = RecordingDevice::new();
        device.fail_framebuffer_checks = true;
        let config = RendererConfig::default().with_shader_dir(shader_dir());
        let err = Renderer::init_with_device(device, Box::new(surface), config).err().unwrap();
        assert!(matches!(err, RenderError::Device(_)));
        assert!(err.is_fatal());
    }
}
