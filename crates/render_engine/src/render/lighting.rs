//! Lighting and shadow geometry
//!
//! The renderer supports one directional light and [`MAX_POINT_LIGHTS`] point
//! lights, each with a shadow map. This module holds the backend-agnostic
//! math: the directional light-space matrix and the six cube-face
//! light-space matrices of a point light.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Number of point light slots
pub const MAX_POINT_LIGHTS: usize = 4;

/// Faces of a point light's shadow cube
pub const CUBE_FACES: usize = 6;

/// Near plane of point light shadow projections
pub const POINT_SHADOW_NEAR: f32 = 1.0;
/// Far plane of point light shadow projections
pub const POINT_SHADOW_FAR: f32 = 25.0;
/// Field of view of each cube face in degrees
pub const POINT_SHADOW_FOV_DEGREES: f32 = 90.0;

/// Half-extent of the directional shadow volume
pub const DIRECTIONAL_SHADOW_EXTENT: f32 = 10.0;
/// Near plane of the directional shadow volume
pub const DIRECTIONAL_SHADOW_NEAR: f32 = 1.0;
/// Far plane of the directional shadow volume
pub const DIRECTIONAL_SHADOW_FAR: f32 = 25.0;
/// Distance from the origin the directional shadow is rendered from
pub const DIRECTIONAL_SHADOW_DISTANCE: f32 = 10.0;

/// Look direction and up vector of one cube face, in GL cube map layer order
/// (+X, -X, +Y, -Y, +Z, -Z)
///
/// The Y faces take a Z up vector; a Y up vector would be parallel to the
/// look direction.
pub const CUBE_FACE_DIRECTIONS: [([f32; 3], [f32; 3]); CUBE_FACES] = [
    ([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
];

/// Shared projection of all cube faces
pub fn point_light_projection() -> Mat4 {
    Mat4::perspective_gl(
        utils::deg_to_rad(POINT_SHADOW_FOV_DEGREES),
        1.0,
        POINT_SHADOW_NEAR,
        POINT_SHADOW_FAR,
    )
}

/// View matrices looking down each axis from `position`
pub fn point_light_face_views(position: Vec3) -> [Mat4; CUBE_FACES] {
    CUBE_FACE_DIRECTIONS.map(|(direction, up)| {
        Mat4::look_at(position, position + Vec3::from(direction), Vec3::from(up))
    })
}

/// `projection * view` for each cube face
pub fn point_light_space_matrices(position: Vec3) -> [Mat4; CUBE_FACES] {
    let projection = point_light_projection();
    point_light_face_views(position).map(|view| projection * view)
}

/// Orthographic light-space matrix of a directional light aimed at the origin
///
/// A zero direction is treated as straight down.
pub fn directional_light_space_matrix(direction: Vec3) -> Mat4 {
    let direction = direction.try_normalize(f32::EPSILON).unwrap_or_else(|| -Vec3::y());
    let up = if direction.dot(&Vec3::y()).abs() > 0.99 { Vec3::z() } else { Vec3::y() };
    let eye = -direction * DIRECTIONAL_SHADOW_DISTANCE;

    let projection = Mat4::orthographic(
        -DIRECTIONAL_SHADOW_EXTENT,
        DIRECTIONAL_SHADOW_EXTENT,
        -DIRECTIONAL_SHADOW_EXTENT,
        DIRECTIONAL_SHADOW_EXTENT,
        DIRECTIONAL_SHADOW_NEAR,
        DIRECTIONAL_SHADOW_FAR,
    );
    projection * Mat4::look_at(eye, Vec3::zeros(), up)
}

/// Current state of the directional light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in
    pub direction: Vec3,
    /// Linear RGB color
    pub color: Vec3,
    /// Whether the light contributes
    pub active: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.3),
            color: Vec3::new(1.0, 1.0, 1.0),
            active: false,
        }
    }
}

/// Current state of one point light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// World position
    pub position: Vec3,
    /// Linear RGB color
    pub color: Vec3,
    /// Whether the light contributes and casts shadows
    pub active: bool,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            color: Vec3::new(1.0, 1.0, 1.0),
            active: false,
        }
    }
}
