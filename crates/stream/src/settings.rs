use serde::{Deserialize, Serialize};

/// Distances controlling how far the trail reaches around the marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    /// How far below the marker the trail is kept generated.
    pub far_distance: f32,
    /// How far above the marker a chunk's lower end may rise before it is
    /// despawned.
    pub despawn_threshold: f32,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            far_distance: 100.0,
            despawn_threshold: 100.0,
        }
    }
}
