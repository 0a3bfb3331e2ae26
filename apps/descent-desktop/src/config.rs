use std::path::Path;

use anyhow::Context;
use descent_common::Color;
use descent_render::PerspectiveConfig;
use descent_stream::MapSettings;
use serde::{Deserialize, Serialize};

/// Desktop settings, read from an optional JSON file. Missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub perspective: PerspectiveConfig,
    pub map: MapSettings,
    /// Marker descent speed in units per second.
    pub fall_speed: f32,
    /// How far above the marker the camera hangs.
    pub camera_height: f32,
    /// Mesh URL for trail chunks, resolved against the assets directory.
    pub mesh: String,
    pub albedo: [f32; 3],
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            perspective: PerspectiveConfig {
                fov: Some(70.0),
                clear_color: Some(Color::rgb(0.01, 0.01, 0.03)),
                ..PerspectiveConfig::default()
            },
            map: MapSettings::default(),
            fall_speed: 6.0,
            camera_height: 2.0,
            mesh: "pentagon.obj".into(),
            albedo: [1.0, 0.5, 0.0],
        }
    }
}

impl DesktopConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}
