//! Streaming: a procedural trail of chunks that extends ahead of a progress
//! marker and is trimmed behind it.
//!
//! # Invariants
//! - Chunks are contiguous: each new chunk starts where the tail ends.
//! - The tail is never despawned, so the trail always has an anchor to
//!   extend from.
//! - The same seed and marker path yield the same chunks.

mod rng;
mod settings;
mod trail;

pub use rng::SplitMix64;
pub use settings::MapSettings;
pub use trail::{Chunk, ChunkTrail, MAX_SPAWNS_PER_UPDATE, TrailUpdate};

pub fn crate_info() -> &'static str {
    "descent-stream v0.1.0"
}
