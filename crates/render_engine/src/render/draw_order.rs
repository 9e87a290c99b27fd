//! Draw ordering
//!
//! Draws are rendered back to front (painter's order) using the squared
//! distance from the object's world position to the camera. This keeps alpha
//! blending correct for transparent objects. Opaque objects are sorted the
//! same way, trading some overdraw for a single ordering rule.

use crate::foundation::math::Vec3;
use crate::render::commands::DrawCommand;

/// Squared distance from a draw's world position to `camera_position`
pub fn sqr_distance(draw: &DrawCommand, camera_position: Vec3) -> f32 {
    (draw.position() - camera_position).norm_squared()
}

/// `a` sorts before `b` when it is farther from the camera
pub fn farther_first(a: &DrawCommand, b: &DrawCommand, camera_position: Vec3) -> bool {
    sqr_distance(a, camera_position) > sqr_distance(b, camera_position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::foundation::sort::quicksort;
    use crate::render::commands::MeshId;

    fn draw_at(position: Vec3) -> DrawCommand {
        DrawCommand::new(Mat4::new_translation(&position), MeshId(10))
    }

    #[test]
    fn test_farther_sorts_first() {
        let camera = Vec3::new(0.0, 0.0, 5.0);
        let near = draw_at(Vec3::new(0.0, 0.0, 4.0));
        let far = draw_at(Vec3::new(0.0, 0.0, -20.0));
        assert!(farther_first(&far, &near, camera));
        assert!(!farther_first(&near, &far, camera));
        assert!(!farther_first(&near, &near, camera));
    }

    #[test]
    fn test_back_to_front_property_over_grid() {
        let camera = Vec3::new(0.5, 1.0, -2.0);
        let mut draws: Vec<DrawCommand> = (0..64)
            .map(|i| {
                let f = i as f32;
                draw_at(Vec3::new((f * 7.3) % 11.0, (f * 3.1) % 5.0, (f * 1.7) % 13.0 - 6.0))
            })
            .collect();

        quicksort(&mut draws, |a, b| farther_first(a, b, camera));

        for pair in draws.windows(2) {
            assert!(sqr_distance(&pair[0], camera) >= sqr_distance(&pair[1], camera));
        }
    }
}
