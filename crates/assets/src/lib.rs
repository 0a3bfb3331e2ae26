//! Mesh assets: decode model files into vertex data and upload them once per
//! rendering surface.
//!
//! Assets are addressed by URL. Decoding happens at most once per asset; GPU
//! upload happens at most once per (asset, surface) pair, even when several
//! callers ask for the same surface while the upload is still in flight.
//!
//! # Layout
//! - [`decode`]: raw attribute arrays into structured vertices.
//! - [`MeshLoader`]: where raw attributes come from (OBJ files by default).
//! - [`MeshAsset`]: the shared, coalescing handle the renderer consumes.

mod decode;
mod error;
mod loader;
mod mesh_asset;

pub use decode::{MeshData, RawAttributes, Vertex, decode};
pub use error::{AssetError, DecodeError};
pub use loader::{MeshLoader, ObjLoader};
pub use mesh_asset::{LoadFuture, Mesh, MeshAsset, MeshFuture, MeshUploader};

pub fn crate_info() -> &'static str {
    "descent-assets v0.1.0"
}
