use std::f32::consts::PI;

use descent_common::{ObjectId, Transform};
use glam::{Quat, Vec3};

use crate::rng::SplitMix64;
use crate::settings::MapSettings;

/// Upper bound on chunks spawned by a single [`ChunkTrail::update`].
pub const MAX_SPAWNS_PER_UPDATE: usize = 10;

/// Horizontal offset range of a chunk around the trail axis.
const JITTER: f32 = 0.3;
const MIN_LENGTH: f32 = 1.0;
const MAX_EXTRA_LENGTH: f32 = 5.0;

/// One segment of the trail.
///
/// `transform.position.y` is the segment's upper end; it extends `length`
/// units downward. The transform scales a unit-height mesh hanging below its
/// origin to the segment's length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    pub id: ObjectId,
    pub transform: Transform,
    pub length: f32,
}

impl Chunk {
    pub fn top(&self) -> f32 {
        self.transform.position.y
    }

    pub fn bottom(&self) -> f32 {
        self.top() - self.length
    }
}

/// Chunks added and removed by one update, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailUpdate {
    pub spawned: Vec<Chunk>,
    pub despawned: Vec<ObjectId>,
}

impl TrailUpdate {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.despawned.is_empty()
    }
}

/// A downward trail of chunks kept generated around a progress marker.
#[derive(Debug, Clone)]
pub struct ChunkTrail {
    /// Head (highest) first, tail last.
    chunks: Vec<Chunk>,
    rng: SplitMix64,
    next_id: u64,
}

impl ChunkTrail {
    pub fn new(seed: u64) -> Self {
        Self {
            chunks: Vec::new(),
            rng: SplitMix64::new(seed),
            next_id: 1,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn tail(&self) -> Option<&Chunk> {
        self.chunks.last()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Trim chunks left far above the marker, then extend the tail until it
    /// reaches `far_distance` below the marker or the per-update limit.
    pub fn update(&mut self, marker_y: f32, settings: &MapSettings) -> TrailUpdate {
        let mut update = TrailUpdate::default();

        let limit = marker_y + settings.despawn_threshold;
        let tail_index = self.chunks.len().saturating_sub(1);
        let mut index = 0;
        self.chunks.retain(|chunk| {
            let keep = index == tail_index || chunk.bottom() <= limit;
            index += 1;
            if !keep {
                update.despawned.push(chunk.id);
            }
            keep
        });

        for _ in 0..MAX_SPAWNS_PER_UPDATE {
            let top = match self.chunks.last() {
                None => 0.0,
                Some(tail) if tail.top() > marker_y - settings.far_distance => tail.bottom(),
                Some(_) => break,
            };
            let chunk = self.spawn_at(top);
            self.chunks.push(chunk);
            update.spawned.push(chunk);
        }

        if !update.is_empty() {
            tracing::debug!(
                marker_y,
                spawned = update.spawned.len(),
                despawned = update.despawned.len(),
                live = self.chunks.len(),
                "chunk trail updated"
            );
        }
        update
    }

    fn spawn_at(&mut self, top: f32) -> Chunk {
        let x = self.rng.range(-JITTER, JITTER);
        let z = self.rng.range(-JITTER, JITTER);
        let yaw = self.rng.next_f32() * PI;
        let length = MIN_LENGTH + self.rng.next_f32() * MAX_EXTRA_LENGTH;

        let id = ObjectId(self.next_id);
        self.next_id += 1;
        Chunk {
            id,
            transform: Transform {
                position: Vec3::new(x, top, z),
                rotation: Quat::from_rotation_y(yaw),
                scale: Vec3::new(1.0, length, 1.0),
            },
            length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(trail: &mut ChunkTrail, marker_y: f32, settings: &MapSettings) {
        for _ in 0..100 {
            if trail.update(marker_y, settings).is_empty() {
                return;
            }
        }
        panic!("trail never settled");
    }

    #[test]
    fn first_update_spawns_contiguous_chunks_from_origin() {
        let mut trail = ChunkTrail::new(1);
        let update = trail.update(0.0, &MapSettings::default());

        assert_eq!(update.spawned.len(), MAX_SPAWNS_PER_UPDATE);
        assert!(update.despawned.is_empty());
        assert_eq!(update.spawned[0].top(), 0.0);
        for pair in update.spawned.windows(2) {
            assert!((pair[1].top() - pair[0].bottom()).abs() < 1e-5);
        }
    }

    #[test]
    fn spawning_stops_once_tail_is_far_enough() {
        let settings = MapSettings::default();
        let mut trail = ChunkTrail::new(2);
        settle(&mut trail, 0.0, &settings);

        let tail = trail.tail().unwrap();
        assert!(tail.top() <= -settings.far_distance);
        // The chunk before the tail still reached into range.
        let before = trail.chunks()[trail.len() - 2];
        assert!(before.top() > -settings.far_distance);
    }

    #[test]
    fn chunks_far_above_marker_are_despawned() {
        let settings = MapSettings {
            far_distance: 20.0,
            despawn_threshold: 10.0,
        };
        let mut trail = ChunkTrail::new(3);
        settle(&mut trail, 0.0, &settings);
        let first = trail.chunks()[0];
        let old_tail = trail.tail().unwrap().id;

        let marker_y = -60.0;
        let update = trail.update(marker_y, &settings);
        assert!(update.despawned.contains(&first.id));
        for chunk in trail.chunks().iter().filter(|c| c.id < old_tail) {
            assert!(chunk.bottom() <= marker_y + settings.despawn_threshold);
        }
    }

    #[test]
    fn tail_survives_even_when_above_threshold() {
        let settings = MapSettings {
            far_distance: 0.0,
            despawn_threshold: 0.0,
        };
        let mut trail = ChunkTrail::new(4);
        trail.update(0.0, &settings);
        let tail = *trail.tail().unwrap();

        // Marker drops far below: the lone tail is kept and extended.
        let update = trail.update(-1_000.0, &settings);
        assert!(!update.despawned.contains(&tail.id));
        assert_eq!(update.spawned.len(), MAX_SPAWNS_PER_UPDATE);
        assert_eq!(update.spawned[0].top(), tail.bottom());
    }

    #[test]
    fn chunk_parameters_stay_in_range() {
        let mut trail = ChunkTrail::new(5);
        settle(&mut trail, -500.0, &MapSettings::default());
        for chunk in trail.chunks() {
            let p = chunk.transform.position;
            assert!((-JITTER..JITTER).contains(&p.x));
            assert!((-JITTER..JITTER).contains(&p.z));
            assert!((MIN_LENGTH..MIN_LENGTH + MAX_EXTRA_LENGTH).contains(&chunk.length));
            assert_eq!(chunk.transform.scale.y, chunk.length);
            let (axis, angle) = chunk.transform.rotation.to_axis_angle();
            assert!(angle < PI + 1e-4);
            assert!(angle < 1e-6 || (axis.y - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut trail = ChunkTrail::new(6);
        let mut ids = Vec::new();
        for step in 0..20 {
            let update = trail.update(step as f32 * -10.0, &MapSettings::default());
            ids.extend(update.spawned.iter().map(|c| c.id));
        }
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn same_seed_same_trail() {
        let settings = MapSettings::default();
        let mut a = ChunkTrail::new(99);
        let mut b = ChunkTrail::new(99);
        let mut c = ChunkTrail::new(100);
        let ua = a.update(0.0, &settings);
        assert_eq!(ua, b.update(0.0, &settings));
        assert_ne!(ua, c.update(0.0, &settings));
    }
}
