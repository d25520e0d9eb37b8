//! Viewport basis derived from the screen size.
//!
//! The kernel shoots one ray per pixel from `center` through
//! `pixel00_loc + x * pixel_delta_u + y * pixel_delta_v`, so everything it
//! needs about the camera is captured by [`CameraState`].

use glam::Vec3;

pub const DEFAULT_FOCAL_LENGTH: f32 = 1.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f32 = 2.0;

/// Projection parameters the camera basis is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Distance from the camera center to the viewport plane along -Z.
    pub focal_length: f32,
    /// World-space height of the viewport; the width follows the aspect ratio.
    pub viewport_height: f32,
    /// Eye position.
    pub center: Vec3,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            focal_length: DEFAULT_FOCAL_LENGTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            center: Vec3::ZERO,
        }
    }
}

/// Per-frame camera values mirrored into the kernel uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub center: Vec3,
    pub viewport_u: Vec3,
    pub viewport_v: Vec3,
    pub pixel00_loc: Vec3,
    pub pixel_delta_u: Vec3,
    pub pixel_delta_v: Vec3,
}

/// Derives the viewport basis for a `screen_width` x `screen_height` image.
///
/// Both dimensions must be positive; this is the caller's contract and is
/// only checked in debug builds. [`crate::Resolution`] enforces it at
/// construction, see [`CameraState::for_resolution`].
pub fn build_camera(screen_width: u32, screen_height: u32, projection: Projection) -> CameraState {
    debug_assert!(screen_width > 0 && screen_height > 0);

    let width = screen_width as f32;
    let height = screen_height as f32;
    let aspect_ratio = width / height;
    let viewport_width = projection.viewport_height * aspect_ratio;

    // Image rows grow downwards while world Y grows upwards.
    let viewport_u = Vec3::new(viewport_width, 0.0, 0.0);
    let viewport_v = Vec3::new(0.0, -projection.viewport_height, 0.0);

    let pixel_delta_u = viewport_u / width;
    let pixel_delta_v = viewport_v / height;

    let viewport_upper_left = projection.center
        - Vec3::new(0.0, 0.0, projection.focal_length)
        - viewport_u * 0.5
        - viewport_v * 0.5;
    let pixel00_loc = viewport_upper_left + (pixel_delta_u + pixel_delta_v) * 0.5;

    CameraState {
        center: projection.center,
        viewport_u,
        viewport_v,
        pixel00_loc,
        pixel_delta_u,
        pixel_delta_v,
    }
}

impl CameraState {
    pub fn for_resolution(resolution: crate::Resolution, projection: Projection) -> Self {
        build_camera(resolution.width(), resolution.height(), projection)
    }

    /// World-space point on the viewport for pixel coordinates (`x`, `y`);
    /// fractional coordinates address sub-pixel offsets.
    pub fn sample_point(&self, x: f32, y: f32) -> Vec3 {
        self.pixel00_loc + self.pixel_delta_u * x + self.pixel_delta_v * y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, 1e-4),
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn reference_800x600_basis() {
        let camera = build_camera(800, 600, Projection::default());

        assert_close(camera.center, Vec3::ZERO);
        assert_close(camera.viewport_u, Vec3::new(8.0 / 3.0, 0.0, 0.0));
        assert_close(camera.viewport_v, Vec3::new(0.0, -2.0, 0.0));
        assert_close(camera.pixel_delta_u, Vec3::new(0.003_333, 0.0, 0.0));
        assert_close(camera.pixel_delta_v, Vec3::new(0.0, -0.003_333, 0.0));
        assert_close(camera.pixel00_loc, Vec3::new(-1.331_667, 0.998_333, -1.0));
    }

    #[test]
    fn pixel_deltas_divide_the_viewport_by_resolution() {
        for (width, height) in [(1, 1), (3, 7), (801, 600), (1920, 1080), (64, 4096)] {
            let camera = build_camera(width, height, Projection::default());
            assert_close(camera.pixel_delta_u, camera.viewport_u / width as f32);
            assert_close(camera.pixel_delta_v, camera.viewport_v / height as f32);
        }
    }

    #[test]
    fn first_pixel_is_half_a_step_inside_the_upper_left_corner() {
        let projection = Projection {
            focal_length: 2.5,
            viewport_height: 3.0,
            center: Vec3::new(1.0, -2.0, 4.0),
        };
        let camera = build_camera(640, 480, projection);
        let upper_left = projection.center
            - Vec3::new(0.0, 0.0, projection.focal_length)
            - camera.viewport_u / 2.0
            - camera.viewport_v / 2.0;

        assert_close(
            camera.pixel00_loc,
            upper_left + 0.5 * (camera.pixel_delta_u + camera.pixel_delta_v),
        );
        assert_close(camera.center, projection.center);
    }

    #[test]
    fn last_pixel_mirrors_the_first_around_the_view_axis() {
        let camera = build_camera(800, 600, Projection::default());
        let last = camera.sample_point(799.0, 599.0);
        assert_close(
            last,
            Vec3::new(
                -camera.pixel00_loc.x,
                -camera.pixel00_loc.y,
                camera.pixel00_loc.z,
            ),
        );
    }
}
