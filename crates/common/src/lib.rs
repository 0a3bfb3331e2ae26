//! Shared value types used across the descent crates.
//!
//! # Invariants
//! - Handles are plain data; only the backend that minted a handle can
//!   resolve it to a GPU object.
//! - Surface ids are never reused within a process.

mod error;
mod handles;
mod types;

pub use error::DeviceError;
pub use handles::{
    BindGroupHandle, BindGroupLayoutHandle, BufferHandle, HandleAllocator, PipelineHandle,
    TextureHandle,
};
pub use types::{Color, ObjectId, SurfaceId, Transform};

pub fn crate_info() -> &'static str {
    "descent-common v0.1.0"
}
