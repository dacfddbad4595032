//! Orthographic camera looking along the sun direction

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use sunview_core::constants::{FAR_PLANE, NEAR_PLANE};
use sunview_core::Resolved;

const MAX_AZ: f32 = 360.0;
const MAX_EL: f32 = 89.999;

/// The sun's viewpoint: azimuth/elevation on a unit sphere around the
/// model origin, orthographic projection with a fixed physical extent.
/// With no perspective the distance to the model is irrelevant, so the
/// camera sits on the unit sphere regardless of model size.
pub struct SunCamera {
    azimuth_deg: f32,
    elevation_deg: f32,
    azimuth_offset_deg: f32,
    elevation_offset_deg: f32,
    /// Orthographic view edge length in meters
    size_m: f32,
}

impl SunCamera {
    pub fn new(resolved: &Resolved) -> Self {
        Self {
            azimuth_deg: 0.0,
            elevation_deg: 0.0,
            azimuth_offset_deg: resolved.scenario.azimuth_offset_deg,
            elevation_offset_deg: resolved.scenario.elevation_offset_deg,
            size_m: resolved.scenario.screen_size_m,
        }
    }

    pub fn azimuth_deg(&self) -> f32 {
        self.azimuth_deg
    }

    pub fn elevation_deg(&self) -> f32 {
        self.elevation_deg
    }

    /// Set absolute angles. The driver path: samples carry already-valid
    /// angles, so no wrapping is applied.
    pub fn orient(&mut self, azimuth_deg: f32, elevation_deg: f32) {
        self.azimuth_deg = azimuth_deg;
        self.elevation_deg = elevation_deg;
    }

    /// Apply a relative rotation, wrapping azimuth at ±360° and clamping
    /// elevation just short of the poles.
    pub fn rotate(&mut self, d_azimuth: f32, d_elevation: f32) {
        self.azimuth_deg += d_azimuth;
        self.elevation_deg += d_elevation;
        if self.azimuth_deg > MAX_AZ {
            self.azimuth_deg -= 360.0;
        }
        if self.azimuth_deg < -MAX_AZ {
            self.azimuth_deg += 360.0;
        }
        self.elevation_deg = self.elevation_deg.clamp(-MAX_EL, MAX_EL);
    }

    /// Camera position on the unit sphere. Z is up in the body frame;
    /// azimuth runs clockwise, matching the attitude data convention.
    pub fn position(&self) -> Vec3 {
        let el = (self.elevation_deg + self.elevation_offset_deg).to_radians();
        let az = (-self.azimuth_deg + self.azimuth_offset_deg).to_radians();
        Vec3::new(
            el.cos() * az.sin(),
            el.cos() * az.cos(),
            el.sin(),
        )
    }

    pub fn view(&self) -> Mat4 {
        // -Z up keeps the rendered orientation of the original tool
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0))
    }

    pub fn projection(&self) -> Mat4 {
        let half = self.size_m / 2.0;
        Mat4::orthographic_rh(-half, half, -half, half, NEAR_PLANE, FAR_PLANE)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Camera uniform buffer data for the GPU
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &SunCamera) -> Self {
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunview_core::Scenario;

    fn camera() -> SunCamera {
        SunCamera::new(&Scenario::default().resolve())
    }

    fn matrices_close(a: Mat4, b: Mat4) -> bool {
        a.to_cols_array()
            .iter()
            .zip(b.to_cols_array().iter())
            .all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn test_full_turn_reproduces_view() {
        let mut a = camera();
        let b = camera();
        a.rotate(360.0, 0.0);
        assert!(matrices_close(a.view_proj(), b.view_proj()));
    }

    #[test]
    fn test_negative_wrap() {
        let mut c = camera();
        c.rotate(-400.0, 0.0);
        assert!((c.azimuth_deg() - (-40.0)).abs() < 1e-4);
    }

    #[test]
    fn test_elevation_clamped_short_of_pole() {
        let mut c = camera();
        c.rotate(0.0, 120.0);
        assert!((c.elevation_deg() - 89.999).abs() < 1e-6);
        c.rotate(0.0, -300.0);
        assert!((c.elevation_deg() + 89.999).abs() < 1e-6);
    }

    #[test]
    fn test_orient_sets_raw_angles() {
        let mut c = camera();
        c.orient(123.5, -45.0);
        assert_eq!(c.azimuth_deg(), 123.5);
        assert_eq!(c.elevation_deg(), -45.0);
    }

    #[test]
    fn test_position_at_zero_points_along_y() {
        let p = camera().position();
        assert!((p - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_position_at_elevation_90_points_along_z() {
        let mut c = camera();
        c.orient(0.0, 90.0);
        assert!((c.position() - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_offsets_shift_position() {
        let mut s = Scenario::default();
        s.azimuth_offset_deg = 90.0;
        let c = SunCamera::new(&s.resolve());
        // azimuth offset of 90° swings the camera from +Y to +X
        assert!((c.position() - Vec3::X).length() < 1e-6);
    }
}
