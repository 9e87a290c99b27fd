//! Math utilities and types
//!
//! Thin layer over `nalgebra` providing the aliases and the pure matrix
//! builders the renderer consumes. Everything here follows OpenGL conventions:
//! right-handed view space looking down -Z and clip-space depth in [-1, 1].

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }
}

/// Extension trait for Mat4 with the builders used by the OpenGL backend
pub trait Mat4Ext {
    /// OpenGL perspective projection (`fov_y` in radians)
    fn perspective_gl(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// OpenGL orthographic projection
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// World-space translation stored in the last column
    fn translation_part(&self) -> Vec3;

    /// Inverse-transpose of the upper 3x3 block, for transforming normals
    ///
    /// Falls back to the plain upper 3x3 block when the matrix is singular.
    fn normal_matrix(&self) -> Mat3;

    /// Column-major flat array, the layout GL uniform uploads expect
    fn to_cols_array(&self) -> [f32; 16];
}

impl Mat4Ext for Mat4 {
    fn perspective_gl(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }

    fn normal_matrix(&self) -> Mat3 {
        let upper: Mat3 = self.fixed_view::<3, 3>(0, 0).into_owned();
        upper
            .try_inverse()
            .map_or(upper, |inverse| inverse.transpose())
    }

    fn to_cols_array(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.as_slice());
        out
    }
}

/// Column-major 4x4 array, the std140 layout of a `mat4`
pub fn mat4_to_cols(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translation_part_reads_last_column() {
        let m = Mat4::new_translation(&Vec3::new(1.0, -2.0, 3.5));
        assert_eq!(m.translation_part(), Vec3::new(1.0, -2.0, 3.5));
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale_is_inverse_scale() {
        let m = Mat4::new_scaling(2.0);
        let n = m.normal_matrix();
        assert_relative_eq!(n[(0, 0)], 0.5, epsilon = 1e-6);
        assert_relative_eq!(n[(1, 1)], 0.5, epsilon = 1e-6);
        assert_relative_eq!(n[(2, 2)], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_normal_matrix_singular_falls_back() {
        let m = Mat4::zeros();
        assert_eq!(m.normal_matrix(), Mat3::zeros());
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Vec3::new(0.0, 5.0, 0.0);
        let view = Mat4::look_at(eye, eye + Vec3::x(), -Vec3::y());
        let p = view.transform_point(&Point3::from(eye));
        assert_relative_eq!(p.coords.norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cols_array_is_column_major() {
        let m = Mat4::new_translation(&Vec3::new(7.0, 8.0, 9.0));
        let cols = m.to_cols_array();
        assert_eq!(&cols[12..15], &[7.0, 8.0, 9.0]);
        assert_eq!(mat4_to_cols(&m)[3][..3], [7.0, 8.0, 9.0]);
    }
}
