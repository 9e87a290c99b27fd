//! # 3D Camera
//!
//! Perspective camera with a dirty-tracked transform. The renderer only
//! recomputes the view-projection matrix when the transform changed or the
//! cached projection was invalidated (resize, camera swap), then clears both
//! flags.
//!
//! ## Coordinate System
//! Right-handed, Y-up. The camera looks down its local -Z axis, so the view is
//! built as `look_at(position, position - forward, up)` where `forward` is the
//! camera's local +Z axis in world space.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Quat, Vec3};
use crate::render::{RenderError, RenderResult};

/// Position and orientation of a camera, with change tracking
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTransform {
    position: Vec3,
    rotation: Quat,
    dirty: bool,
}

impl CameraTransform {
    /// Create a transform; starts dirty so the first frame uploads it
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            dirty: true,
        }
    }

    /// Transform at `position` oriented to look at `target`
    ///
    /// `up` does not need to be perpendicular to the view direction.
    pub fn looking_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let rotation = Quat::face_towards(&(position - target), &up);
        Self::new(position, rotation)
    }

    /// World-space position
    pub const fn world_position(&self) -> Vec3 {
        self.position
    }

    /// Local +Z in world space; the camera looks along its negation
    pub fn world_forward(&self) -> Vec3 {
        self.rotation * Vec3::z()
    }

    /// Local +Y in world space
    pub fn world_up(&self) -> Vec3 {
        self.rotation * Vec3::y()
    }

    /// Orientation
    pub const fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Move the camera
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Rotate the camera
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.dirty = true;
    }

    /// Whether the transform changed since the last upload
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the transform as changed
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Acknowledge that the current state has been uploaded
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl Default for CameraTransform {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Quat::identity())
    }
}

/// Perspective camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Position and orientation
    pub transform: CameraTransform,

    fov_degrees: f32,
    near: f32,
    far: f32,
}

impl Camera {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `transform` - Position and orientation
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(transform: CameraTransform, fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            transform,
            fov_degrees,
            near,
            far,
        }
    }

    /// Vertical field of view in degrees
    pub const fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    /// Near clipping distance
    pub const fn near(&self) -> f32 {
        self.near
    }

    /// Far clipping distance
    pub const fn far(&self) -> f32 {
        self.far
    }

    /// Change the field of view
    ///
    /// # Errors
    /// [`RenderError::InvalidCamera`] when the result would not form a
    /// projection; the camera is left unchanged.
    pub fn set_fov_degrees(&mut self, fov_degrees: f32) -> RenderResult<()> {
        check_projection(fov_degrees, self.near, self.far)?;
        self.fov_degrees = fov_degrees;
        self.transform.mark_dirty();
        Ok(())
    }

    /// Change the clipping planes
    ///
    /// # Errors
    /// [`RenderError::InvalidCamera`] unless `0 < near < far`; the camera is
    /// left unchanged.
    pub fn set_clipping_planes(&mut self, near: f32, far: f32) -> RenderResult<()> {
        check_projection(self.fov_degrees, near, far)?;
        self.near = near;
        self.far = far;
        self.transform.mark_dirty();
        Ok(())
    }

    /// Check that the lens forms a valid perspective projection
    ///
    /// # Errors
    /// [`RenderError::InvalidCamera`] for a non-finite or out of range field
    /// of view, or clipping planes outside `0 < near < far`.
    pub fn validate(&self) -> RenderResult<()> {
        check_projection(self.fov_degrees, self.near, self.far)
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        let position = self.transform.world_position();
        Mat4::look_at(
            position,
            position - self.transform.world_forward(),
            self.transform.world_up(),
        )
    }

    /// View-to-clip matrix for a viewport of the given aspect ratio
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_gl(utils::deg_to_rad(self.fov_degrees), aspect, self.near, self.far)
    }

    /// `projection * view`
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

fn check_projection(fov_degrees: f32, near: f32, far: f32) -> RenderResult<()> {
    if !fov_degrees.is_finite() || fov_degrees <= 0.0 || fov_degrees >= 180.0 {
        return Err(RenderError::InvalidCamera(format!(
            "field of view must be in (0, 180) degrees, got {fov_degrees}"
        )));
    }
    if !near.is_finite() || !far.is_finite() || near <= 0.0 || far <= near {
        return Err(RenderError::InvalidCamera(format!(
            "clipping planes must satisfy 0 < near < far, got near {near} far {far}"
        )));
    }
    Ok(())
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(
            CameraTransform::looking_at(Vec3::new(0.0, 2.0, 5.0), Vec3::zeros(), Vec3::y()),
            60.0,
            0.1,
            100.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Point3, Vec4};
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_camera_looks_down_negative_z() {
        let camera = Camera::perspective(CameraTransform::default(), 90.0, 0.1, 100.0);
        let view = camera.view_matrix();
        let ahead = view.transform_point(&Point3::new(0.0, 0.0, -5.0));
        assert_relative_eq!(ahead.z, -5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_looking_at_centers_target() {
        let transform = CameraTransform::looking_at(Vec3::new(3.0, 4.0, 5.0), Vec3::zeros(), Vec3::y());
        let camera = Camera::perspective(transform, 60.0, 0.1, 100.0);
        let clip = camera.view_projection(16.0 / 9.0) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_setters_mark_dirty() {
        let mut camera = Camera::default();
        assert!(camera.transform.is_dirty());
        camera.transform.mark_clean();
        assert!(!camera.transform.is_dirty());

        camera.transform.set_position(Vec3::new(1.0, 0.0, 0.0));
        assert!(camera.transform.is_dirty());

        camera.transform.mark_clean();
        camera.set_fov_degrees(45.0).unwrap();
        assert!(camera.transform.is_dirty());
    }

    #[test]
    fn test_degenerate_lens_is_rejected() {
        let coincident = Camera::perspective(CameraTransform::default(), 60.0, 1.0, 1.0);
        assert!(matches!(coincident.validate(), Err(RenderError::InvalidCamera(_))));

        let behind = Camera::perspective(CameraTransform::default(), 60.0, -0.1, 100.0);
        assert!(behind.validate().is_err());
        let inverted = Camera::perspective(CameraTransform::default(), 60.0, 10.0, 1.0);
        assert!(inverted.validate().is_err());
        let no_fov = Camera::perspective(CameraTransform::default(), f32::NAN, 0.1, 100.0);
        assert!(no_fov.validate().is_err());
        assert!(Camera::default().validate().is_ok());
    }

    #[test]
    fn test_rejected_setter_leaves_camera_unchanged() {
        let mut camera = Camera::default();
        camera.transform.mark_clean();

        assert!(camera.set_clipping_planes(5.0, 5.0).is_err());
        assert!(camera.set_fov_degrees(0.0).is_err());
        assert_eq!(camera.near(), 0.1);
        assert_eq!(camera.far(), 100.0);
        assert_eq!(camera.fov_degrees(), 60.0);
        assert!(!camera.transform.is_dirty());

        camera.set_clipping_planes(0.5, 50.0).unwrap();
        assert_eq!((camera.near(), camera.far()), (0.5, 50.0));
    }
}
