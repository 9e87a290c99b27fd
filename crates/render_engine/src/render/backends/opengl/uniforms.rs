//! Uniform buffer objects of the OpenGL backend
//!
//! Three std140 blocks are shared by every program:
//!
//! | Binding | Block         | Content                                      |
//! |---------|---------------|----------------------------------------------|
//! | 0       | `CameraBlock` | view-projection, UI projection, eye, planes  |
//! | 1       | `LightsBlock` | directional light + 4 point lights           |
//! | 2       | `FrameBlock`  | time, delta, frame index, resolution         |
//!
//! Updates are partial: only the fields that changed are written, at their
//! `offset_of!` offsets. A CPU mirror of the light block answers "is point
//! light N active" without reading back from the GPU.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};

use super::device::{DeviceResult, GpuDevice};
use crate::foundation::math::{mat4_to_cols, Mat4, Vec3};
use crate::render::api::FrameTime;
use crate::render::lighting::{
    directional_light_space_matrix, point_light_space_matrices, DirectionalLight, PointLight,
    CUBE_FACES, MAX_POINT_LIGHTS, POINT_SHADOW_FAR, POINT_SHADOW_NEAR,
};

/// Binding point of the camera block
pub const CAMERA_BINDING: u32 = 0;
/// Binding point of the lights block
pub const LIGHTS_BINDING: u32 = 1;
/// Binding point of the frame block
pub const FRAME_BINDING: u32 = 2;

/// Block names paired with their binding points
pub const UNIFORM_BLOCKS: [(&str, u32); 3] = [
    ("CameraBlock", CAMERA_BINDING),
    ("LightsBlock", LIGHTS_BINDING),
    ("FrameBlock", FRAME_BINDING),
];

/// Camera uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUbo {
    pub view_projection: [[f32; 4]; 4], // 64 bytes
    pub ui_projection: [[f32; 4]; 4],   // 64 bytes - pixel space, origin top-left
    pub position: [f32; 4],             // 16 bytes - xyz + padding
    pub clipping_planes: [f32; 4],      // 16 bytes - near, far, padding
}

/// Directional light block entry
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectionalLightUbo {
    pub light_space: [[f32; 4]; 4], // 64 bytes
    pub direction: [f32; 4],        // 16 bytes - xyz + padding
    pub color: [f32; 4],            // 16 bytes - rgb + padding
    pub active: u32,                // 4 bytes
    pub _padding: [u32; 3],         // 12 bytes - total 112 bytes
}

/// Point light block entry
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PointLightUbo {
    pub light_space: [[[f32; 4]; 4]; CUBE_FACES], // 384 bytes - one per cube face
    pub position: [f32; 4],                       // 16 bytes - xyz + padding
    pub color: [f32; 4],                          // 16 bytes - rgb + padding
    pub clipping_planes: [f32; 4],                // 16 bytes - near, far, padding
    pub active: u32,                              // 4 bytes
    pub _padding: [u32; 3],                       // 12 bytes - total 448 bytes
}

/// Lights uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightsUbo {
    pub directional: DirectionalLightUbo,          // 112 bytes
    pub points: [PointLightUbo; MAX_POINT_LIGHTS], // 4 * 448 = 1792 bytes
}

/// Per-frame scalars
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUbo {
    pub time: f32,             // 4 bytes - seconds since start
    pub delta: f32,            // 4 bytes
    pub frame: u32,            // 4 bytes - wraps
    pub _padding: u32,         // 4 bytes
    pub resolution: [f32; 4],  // 16 bytes - width, height, 1/width, 1/height
}

fn vec4(v: Vec3) -> [f32; 4] {
    [v.x, v.y, v.z, 0.0]
}

fn point_offset(index: usize) -> usize {
    offset_of!(LightsUbo, points) + index * size_of::<PointLightUbo>()
}

/// The three shared uniform buffers and the CPU state behind them
pub struct UniformBuffers<D: GpuDevice> {
    camera: D::Buffer,
    lights: D::Buffer,
    frame: D::Buffer,

    directional: DirectionalLight,
    points: [PointLight; MAX_POINT_LIGHTS],

    /// Whether the light-space matrices of a point light were ever written
    point_matrices_set: [bool; MAX_POINT_LIGHTS],

    /// Near/far planes of a point light never change once uploaded
    clipping_planes_set: [bool; MAX_POINT_LIGHTS],

    directional_matrix_set: bool,
}

impl<D: GpuDevice> UniformBuffers<D> {
    /// Allocate the three blocks at their binding points
    pub fn new(device: &mut D) -> DeviceResult<Self> {
        let camera = device.create_uniform_buffer(CAMERA_BINDING, size_of::<CameraUbo>())?;
        let lights = device
            .create_uniform_buffer(LIGHTS_BINDING, size_of::<LightsUbo>())
            .inspect_err(|_| device.delete_buffer(camera))?;
        let frame = device
            .create_uniform_buffer(FRAME_BINDING, size_of::<FrameUbo>())
            .inspect_err(|_| {
                device.delete_buffer(camera);
                device.delete_buffer(lights);
            })?;
        log::debug!(
            "Created uniform buffers (camera {} B, lights {} B, frame {} B)",
            size_of::<CameraUbo>(),
            size_of::<LightsUbo>(),
            size_of::<FrameUbo>()
        );

        Ok(Self {
            camera,
            lights,
            frame,
            directional: DirectionalLight::default(),
            points: [PointLight::default(); MAX_POINT_LIGHTS],
            point_matrices_set: [false; MAX_POINT_LIGHTS],
            clipping_planes_set: [false; MAX_POINT_LIGHTS],
            directional_matrix_set: false,
        })
    }

    /// Write view-projection, eye position and clipping planes
    pub fn write_camera(&self, device: &mut D, view_projection: &Mat4, position: Vec3, near: f32, far: f32) {
        device.write_uniform_buffer(
            self.camera,
            offset_of!(CameraUbo, view_projection),
            bytemuck::bytes_of(&mat4_to_cols(view_projection)),
        );
        device.write_uniform_buffer(
            self.camera,
            offset_of!(CameraUbo, position),
            bytemuck::bytes_of(&vec4(position)),
        );
        device.write_uniform_buffer(
            self.camera,
            offset_of!(CameraUbo, clipping_planes),
            bytemuck::bytes_of(&[near, far, 0.0, 0.0]),
        );
    }

    /// Write the UI projection sub-region
    pub fn write_ui_projection(&self, device: &mut D, projection: &Mat4) {
        device.write_uniform_buffer(
            self.camera,
            offset_of!(CameraUbo, ui_projection),
            bytemuck::bytes_of(&mat4_to_cols(projection)),
        );
    }

    /// Write the whole frame block
    pub fn write_frame(&self, device: &mut D, time: FrameTime, resolution: (u32, u32)) {
        let (width, height) = (resolution.0.max(1) as f32, resolution.1.max(1) as f32);
        let data = FrameUbo {
            time: time.elapsed,
            delta: time.delta,
            frame: time.frame as u32,
            _padding: 0,
            resolution: [width, height, 1.0 / width, 1.0 / height],
        };
        device.write_uniform_buffer(self.frame, 0, bytemuck::bytes_of(&data));
    }

    /// Update the directional light
    ///
    /// The light-space matrix is only recomputed when the direction changes.
    pub fn set_directional_light(&mut self, device: &mut D, light: DirectionalLight) {
        let base = offset_of!(LightsUbo, directional);

        if !self.directional_matrix_set || light.direction != self.directional.direction {
            let matrix = directional_light_space_matrix(light.direction);
            device.write_uniform_buffer(
                self.lights,
                base + offset_of!(DirectionalLightUbo, light_space),
                bytemuck::bytes_of(&mat4_to_cols(&matrix)),
            );
            device.write_uniform_buffer(
                self.lights,
                base + offset_of!(DirectionalLightUbo, direction),
                bytemuck::bytes_of(&vec4(light.direction)),
            );
            self.directional_matrix_set = true;
        }
        device.write_uniform_buffer(
            self.lights,
            base + offset_of!(DirectionalLightUbo, color),
            bytemuck::bytes_of(&vec4(light.color)),
        );
        device.write_uniform_buffer(
            self.lights,
            base + offset_of!(DirectionalLightUbo, active),
            bytemuck::bytes_of(&u32::from(light.active)),
        );
        self.directional = light;
    }

    /// Update one point light; `index` must be below [`MAX_POINT_LIGHTS`]
    ///
    /// The six light-space matrices are only recomputed when the position
    /// changes, and the clipping planes are uploaded once.
    pub fn set_point_light(&mut self, device: &mut D, index: usize, light: PointLight) {
        let base = point_offset(index);

        if !self.point_matrices_set[index] || light.position != self.points[index].position {
            let matrices = point_light_space_matrices(light.position).map(|m| mat4_to_cols(&m));
            device.write_uniform_buffer(
                self.lights,
                base + offset_of!(PointLightUbo, light_space),
                bytemuck::bytes_of(&matrices),
            );
            device.write_uniform_buffer(
                self.lights,
                base + offset_of!(PointLightUbo, position),
                bytemuck::bytes_of(&vec4(light.position)),
            );
            self.point_matrices_set[index] = true;
        }
        if !self.clipping_planes_set[index] {
            device.write_uniform_buffer(
                self.lights,
                base + offset_of!(PointLightUbo, clipping_planes),
                bytemuck::bytes_of(&[POINT_SHADOW_NEAR, POINT_SHADOW_FAR, 0.0, 0.0]),
            );
            self.clipping_planes_set[index] = true;
        }
        device.write_uniform_buffer(
            self.lights,
            base + offset_of!(PointLightUbo, color),
            bytemuck::bytes_of(&vec4(light.color)),
        );
        device.write_uniform_buffer(
            self.lights,
            base + offset_of!(PointLightUbo, active),
            bytemuck::bytes_of(&u32::from(light.active)),
        );
        self.points[index] = light;
    }

    /// Current directional light
    pub const fn directional_light(&self) -> &DirectionalLight {
        &self.directional
    }

    /// Current state of point light `index`
    pub fn point_light(&self, index: usize) -> Option<&PointLight> {
        self.points.get(index)
    }

    /// Indices of the point lights that are active
    pub fn active_point_lights(&self) -> impl Iterator<Item = usize> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, light)| light.active)
            .map(|(index, _)| index)
    }

    /// Camera block handle
    pub const fn camera_buffer(&self) -> D::Buffer {
        self.camera
    }

    /// Lights block handle
    pub const fn lights_buffer(&self) -> D::Buffer {
        self.lights
    }

    /// Frame block handle
    pub const fn frame_buffer(&self) -> D::Buffer {
        self.frame
    }

    /// Delete the three buffers
    pub fn destroy(&self, device: &mut D) {
        device.delete_buffer(self.camera);
        device.delete_buffer(self.lights);
        device.delete_buffer(self.frame);
    }
}
