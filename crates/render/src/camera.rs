use bytemuck::{Pod, Zeroable};
use descent_common::{Color, Transform};
use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FOV_DEGREES: f32 = 45.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 1000.0;

/// Perspective camera settings. Unset fields fall back to the defaults above.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveConfig {
    /// Vertical field of view in degrees.
    pub fov: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
    pub clear_color: Option<Color>,
}

/// Shared camera uniform, bound at group 0 for every draw.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PovUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// Per-object uniform, bound at group 1.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_model: [[f32; 4]; 4],
}

impl ObjectUniforms {
    pub fn new(world: Mat4) -> Self {
        Self {
            model: world.to_cols_array_2d(),
            normal_model: normal_model(world).to_cols_array_2d(),
        }
    }
}

/// Inverse-transpose of a world matrix, for transforming normals.
pub fn normal_model(world: Mat4) -> Mat4 {
    world.inverse().transpose()
}

/// Projection and view matrices for one renderer.
#[derive(Debug, Clone)]
pub struct CameraState {
    pub projection: Mat4,
    pub view: Mat4,
    config: Option<PerspectiveConfig>,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            config: None,
        }
    }
}

impl CameraState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&PerspectiveConfig> {
        self.config.as_ref()
    }

    /// Look along the transform's rotated `-Z`, with its rotated `+Y` as up.
    pub fn set_perspective_pov(&mut self, transform: &Transform, config: PerspectiveConfig, aspect: f32) {
        let rotation = Mat4::from_quat(transform.rotation);
        let forward = (rotation * Vec4::new(0.0, 0.0, -1.0, 0.0)).truncate();
        let up = (rotation * Vec4::new(0.0, 1.0, 0.0, 0.0)).truncate();

        self.view = Mat4::look_at_rh(transform.position, transform.position + forward, up);
        self.config = Some(config);
        self.update_projection(aspect);
    }

    pub fn update_projection(&mut self, aspect: f32) {
        let config = self.config.unwrap_or_default();
        self.projection = Mat4::perspective_rh(
            config.fov.unwrap_or(DEFAULT_FOV_DEGREES).to_radians(),
            aspect,
            config.near.unwrap_or(DEFAULT_NEAR),
            config.far.unwrap_or(DEFAULT_FAR),
        );
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn pov_uniform(&self) -> PovUniform {
        PovUniform {
            view_proj: self.view_projection().to_cols_array_2d(),
        }
    }

    pub fn clear_color(&self) -> Color {
        self.config
            .and_then(|c| c.clear_color)
            .unwrap_or(Color::BLACK)
    }

    /// World-space eye position recovered from the view matrix.
    pub fn eye(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<PovUniform>(), 64);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 128);
    }

    #[test]
    fn origin_facing_forward_is_identity_look_at() {
        let mut camera = CameraState::new();
        camera.set_perspective_pov(&Transform::default(), PerspectiveConfig::default(), 1.0);

        let reference = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        assert!(camera.view.abs_diff_eq(reference, 1e-6));
        assert!(camera.view.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn rotated_pov_looks_along_rotated_axis() {
        let mut camera = CameraState::new();
        let transform = Transform {
            position: Vec3::new(0.0, 5.0, 0.0),
            rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            ..Transform::default()
        };
        camera.set_perspective_pov(&transform, PerspectiveConfig::default(), 1.0);

        // Looking straight down: a point below the eye lands on the view axis.
        let below = camera.view.transform_point3(Vec3::new(0.0, 0.0, 0.0));
        assert!(below.x.abs() < 1e-5);
        assert!(below.y.abs() < 1e-5);
        assert!((below.z + 5.0).abs() < 1e-5);
        assert!(camera.eye().abs_diff_eq(transform.position, 1e-5));
    }

    #[test]
    fn projection_uses_defaults_and_aspect() {
        let mut camera = CameraState::new();
        camera.update_projection(2.0);
        let reference = Mat4::perspective_rh(45f32.to_radians(), 2.0, 0.1, 1000.0);
        assert!(camera.projection.abs_diff_eq(reference, 1e-6));

        camera.update_projection(1.0);
        // x scale is focal / aspect, y scale is focal.
        assert!((camera.projection.x_axis.x - camera.projection.y_axis.y).abs() < 1e-6);
    }

    #[test]
    fn configured_values_override_defaults() {
        let mut camera = CameraState::new();
        let config = PerspectiveConfig {
            fov: Some(90.0),
            near: Some(1.0),
            far: Some(10.0),
            clear_color: Some(Color::rgb(0.1, 0.2, 0.3)),
        };
        camera.set_perspective_pov(&Transform::default(), config, 1.0);
        let reference = Mat4::perspective_rh(90f32.to_radians(), 1.0, 1.0, 10.0);
        assert!(camera.projection.abs_diff_eq(reference, 1e-6));
        assert_eq!(camera.clear_color(), Color::rgb(0.1, 0.2, 0.3));
    }

    #[test]
    fn clear_color_defaults_to_black() {
        assert_eq!(CameraState::new().clear_color(), Color::BLACK);
    }

    #[test]
    fn normal_model_undoes_non_uniform_scale() {
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = normal_model(world);
        assert!((n.x_axis.x - 0.5).abs() < 1e-6);
        assert!((n.y_axis.y - 1.0).abs() < 1e-6);
    }
}
