use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::math::MathError;

/// Pitch never reaches true vertical so the look-at basis stays regular.
pub const PITCH_LIMIT_DEG: f32 = 89.0;

/// Fly camera state: a world position plus accumulated look angles.
///
/// `yaw` and `pitch` are degrees accumulated from mouse deltas; the forward
/// vector is a pure function of them and is recomputed from scratch on every
/// query, so no drift builds up in the direction itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for Camera {
    fn default() -> Self {
        // Matches the classic spawn: looking down -Z from in front of the
        // scene.
        Self {
            eye: Vec3::new(0.0, 0.0, 6.0),
            yaw: -90.0,
            pitch: 0.0,
        }
    }
}

/// Movement speed and mouse sensitivity applied by [`Camera::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraController {
    /// World units per second.
    pub move_speed: f32,
    /// Degrees per mouse count.
    pub sensitivity: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            move_speed: 2.5,
            sensitivity: 0.1,
        }
    }
}

/// One tick of sampled input handed to the camera transition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub mouse_delta: Vec2,
    pub captured: bool,
}

impl Camera {
    pub fn new(eye: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            eye,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG),
        }
    }

    /// Unit look direction derived from the current yaw/pitch.
    pub fn forward(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
    }

    pub fn up(&self) -> Vec3 {
        Vec3::Y
    }

    /// Advances the camera by one tick of input.
    ///
    /// Look and movement are both gated on the capture flag; while the
    /// pointer is not captured the whole state is frozen. Pitch is clamped to
    /// `[-89, 89]` degrees, which is invariant enforcement rather than an
    /// error.
    pub fn apply(&mut self, input: &FrameInput, controller: &CameraController, dt: f32) {
        if !input.captured {
            return;
        }

        self.yaw += controller.sensitivity * input.mouse_delta.x;
        self.pitch -= controller.sensitivity * input.mouse_delta.y;
        self.pitch = self.pitch.clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);

        let forward = self.forward();
        let strafe = forward.cross(self.up());
        let step = controller.move_speed * dt;
        if input.forward {
            self.eye += step * forward;
        }
        if input.back {
            self.eye -= step * forward;
        }
        if input.left {
            self.eye -= step * strafe;
        }
        if input.right {
            self.eye += step * strafe;
        }
    }

    /// Right-handed view matrix looking along the derived forward vector.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.eye + self.forward(), self.up())
    }
}

/// Perspective projection with the degenerate configurations rejected up
/// front: zero/negative FOV or `near >= far` would produce a singular matrix.
pub fn projection_matrix(fov_deg: f32, aspect: f32, near: f32, far: f32) -> Result<Mat4, MathError> {
    if !(fov_deg > 0.0 && fov_deg < 180.0) || near <= 0.0 || near >= far {
        return Err(MathError::SingularMatrix);
    }
    Ok(Mat4::perspective_rh_gl(
        fov_deg.to_radians(),
        aspect.max(0.01),
        near,
        far,
    ))
}

/// Inverse view-projection with the view translation stripped.
///
/// The result maps fullscreen-quad NDC corners back to world-space ray
/// directions, which is how the shader reconstructs per-pixel view rays for
/// the sky and the analytic bounding volume.
pub fn screen_ray_matrix(view: Mat4, projection: Mat4) -> Result<Mat4, MathError> {
    let mut rotation_only = view;
    rotation_only.w_axis = Vec4::new(0.0, 0.0, 0.0, 1.0);
    let view_proj = projection * rotation_only;
    let det = view_proj.determinant();
    if det == 0.0 || !det.is_finite() {
        return Err(MathError::SingularMatrix);
    }
    Ok(view_proj.inverse())
}

/// Maps an NDC position on the far plane to a world-space unit ray direction.
///
/// CPU-side twin of the shader's reconstruction, used by the headless summary
/// and the tests.
pub fn ray_direction(inv_view_proj: Mat4, ndc: Vec2) -> Result<Vec3, MathError> {
    let world = inv_view_proj * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
    if world.w.abs() < f32::EPSILON {
        return Err(MathError::SingularMatrix);
    }
    crate::math::normalize(world.truncate() / world.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn captured(delta: Vec2) -> FrameInput {
        FrameInput {
            mouse_delta: delta,
            captured: true,
            ..FrameInput::default()
        }
    }

    #[test]
    fn forward_is_unit_length_across_the_clamped_range() {
        let mut yaw = -180.0f32;
        while yaw <= 180.0 {
            let mut pitch = -PITCH_LIMIT_DEG;
            while pitch <= PITCH_LIMIT_DEG {
                let camera = Camera::new(Vec3::ZERO, yaw, pitch);
                assert!((camera.forward().length() - 1.0).abs() < EPS);
                pitch += 13.7;
            }
            yaw += 17.3;
        }
    }

    #[test]
    fn spawn_orientation_looks_down_negative_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), -90.0, 0.0);
        assert!((camera.forward() - Vec3::new(0.0, 0.0, -1.0)).length() < EPS);
    }

    #[test]
    fn mouse_delta_turns_yaw_by_sensitivity() {
        let mut camera = Camera::new(Vec3::ZERO, -90.0, 0.0);
        let controller = CameraController {
            move_speed: 2.5,
            sensitivity: 0.2,
        };
        camera.apply(&captured(Vec2::new(100.0, 0.0)), &controller, 0.016);
        assert!((camera.yaw - -70.0).abs() < EPS);
        let expected = Camera::new(Vec3::ZERO, -70.0, 0.0).forward();
        assert!((camera.forward() - expected).length() < EPS);
    }

    #[test]
    fn pitch_pins_at_the_limit_instead_of_flipping() {
        let mut camera = Camera::default();
        let controller = CameraController {
            move_speed: 2.5,
            sensitivity: 0.2,
        };
        for _ in 0..100 {
            camera.apply(&captured(Vec2::new(0.0, -500.0)), &controller, 0.016);
        }
        assert_eq!(camera.pitch, PITCH_LIMIT_DEG);
        for _ in 0..200 {
            camera.apply(&captured(Vec2::new(0.0, 500.0)), &controller, 0.016);
        }
        assert_eq!(camera.pitch, -PITCH_LIMIT_DEG);
    }

    #[test]
    fn state_is_frozen_while_not_captured() {
        let mut camera = Camera::default();
        let before = camera;
        let input = FrameInput {
            forward: true,
            mouse_delta: Vec2::new(250.0, -250.0),
            captured: false,
            ..FrameInput::default()
        };
        camera.apply(&input, &CameraController::default(), 0.016);
        assert_eq!(camera, before);
    }

    #[test]
    fn movement_translates_along_the_derived_basis() {
        let mut camera = Camera::new(Vec3::ZERO, -90.0, 0.0);
        let controller = CameraController {
            move_speed: 2.0,
            sensitivity: 0.1,
        };
        let input = FrameInput {
            forward: true,
            captured: true,
            ..FrameInput::default()
        };
        camera.apply(&input, &controller, 0.5);
        assert!((camera.eye - Vec3::new(0.0, 0.0, -1.0)).length() < EPS);

        let input = FrameInput {
            right: true,
            captured: true,
            ..FrameInput::default()
        };
        camera.apply(&input, &controller, 0.5);
        // cross((0,0,-1), (0,1,0)) = (1,0,0)
        assert!((camera.eye - Vec3::new(1.0, 0.0, -1.0)).length() < EPS);
    }

    #[test]
    fn projection_rejects_degenerate_configurations() {
        assert_eq!(
            projection_matrix(0.0, 1.8, 2.0, 20.0),
            Err(MathError::SingularMatrix)
        );
        assert_eq!(
            projection_matrix(-45.0, 1.8, 2.0, 20.0),
            Err(MathError::SingularMatrix)
        );
        assert_eq!(
            projection_matrix(45.0, 1.8, 20.0, 20.0),
            Err(MathError::SingularMatrix)
        );
        assert!(projection_matrix(45.0, 1.8, 2.0, 20.0).is_ok());
    }

    #[test]
    fn screen_ray_matrix_rejects_singular_products() {
        let squashed = Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(
            screen_ray_matrix(Mat4::IDENTITY, squashed),
            Err(MathError::SingularMatrix)
        );
    }

    #[test]
    fn screen_ray_matrix_ignores_view_translation() {
        let projection = projection_matrix(45.0, 1.8, 2.0, 20.0).unwrap();
        let at_origin = Camera::new(Vec3::ZERO, -90.0, 0.0);
        let far_away = Camera::new(Vec3::new(50.0, -3.0, 12.0), -90.0, 0.0);
        let a = screen_ray_matrix(at_origin.view_matrix(), projection).unwrap();
        let b = screen_ray_matrix(far_away.view_matrix(), projection).unwrap();
        for ndc in [Vec2::new(-1.0, -1.0), Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)] {
            let da = ray_direction(a, ndc).unwrap();
            let db = ray_direction(b, ndc).unwrap();
            assert!((da - db).length() < 1e-4);
        }
    }

    #[test]
    fn identity_fixture_maps_ndc_corners_straight_through() {
        // With an identity view and an identity-equivalent orthographic
        // projection (near = -1, far = 1), the inverse view-projection is the
        // identity, so the NDC corner (-1, -1) on the far plane maps to the
        // direction of (-1, -1, 1) in the un-rotated camera basis.
        let projection = Mat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        let inv = screen_ray_matrix(Mat4::IDENTITY, projection).unwrap();
        let dir = ray_direction(inv, Vec2::new(-1.0, -1.0)).unwrap();
        // orthographic_rh_gl flips z (maps far = 1 to NDC z = ... with a
        // negated z column), so the fixture direction is (-1, -1, -1)
        // normalized.
        let expected = Vec3::new(-1.0, -1.0, -1.0).normalize();
        assert!((dir - expected).length() < 1e-5);
    }

    #[test]
    fn center_ray_matches_the_camera_forward_vector() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), -90.0, 0.0);
        let projection = projection_matrix(45.0, 1.8, 2.0, 20.0).unwrap();
        let inv = screen_ray_matrix(camera.view_matrix(), projection).unwrap();
        let dir = ray_direction(inv, Vec2::ZERO).unwrap();
        assert!((dir - camera.forward()).length() < 1e-4);
    }
}
