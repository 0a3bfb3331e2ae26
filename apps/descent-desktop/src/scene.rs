use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use descent_assets::MeshAsset;
use descent_common::Transform;
use descent_render::{FrameRenderer, Material, RenderDevice, RenderableObject};
use descent_render_wgpu::lit_params;
use descent_stream::ChunkTrail;
use glam::{Quat, Vec3};

use crate::config::DesktopConfig;

/// The falling marker, the trail generated around it and the camera
/// following it.
pub struct Scene {
    config: DesktopConfig,
    trail: ChunkTrail,
    mesh: MeshAsset,
    material: Arc<dyn Material>,
    marker_y: f32,
}

impl Scene {
    pub fn new(
        config: DesktopConfig,
        seed: u64,
        mesh: MeshAsset,
        material: Arc<dyn Material>,
    ) -> Self {
        Self {
            config,
            trail: ChunkTrail::new(seed),
            mesh,
            material,
            marker_y: 0.0,
        }
    }

    pub fn marker_y(&self) -> f32 {
        self.marker_y
    }

    pub fn trail(&self) -> &ChunkTrail {
        &self.trail
    }

    /// Camera above the marker, looking straight down the shaft.
    pub fn camera_transform(&self) -> Transform {
        Transform {
            position: Vec3::new(0.0, self.marker_y + self.config.camera_height, 0.0),
            rotation: Quat::from_rotation_x(-FRAC_PI_2),
            ..Transform::default()
        }
    }

    /// Move the marker down by `dt` seconds of fall and mirror the trail's
    /// changes into `renderer`.
    pub fn advance<D: RenderDevice + 'static>(&mut self, dt: f32, renderer: &mut FrameRenderer<D>) {
        self.marker_y -= self.config.fall_speed * dt;
        let update = self.trail.update(self.marker_y, &self.config.map);

        for id in update.despawned {
            renderer.remove_object(id);
        }
        for chunk in update.spawned {
            let object = RenderableObject::new(
                chunk.id,
                self.mesh.clone(),
                self.material.clone(),
                lit_params(self.config.albedo),
            )
            .with_transform(&chunk.transform);
            if let Err(err) = renderer.add_object(object) {
                tracing::warn!(id = %chunk.id, %err, "chunk not added");
            }
        }

        renderer.set_perspective_pov(&self.camera_transform(), self.config.perspective);
    }
}
