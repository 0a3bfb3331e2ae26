use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use descent_common::{BufferHandle, DeviceError, SurfaceId};
use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use parking_lot::Mutex;

use crate::decode::{MeshData, Vertex, decode};
use crate::error::AssetError;
use crate::loader::MeshLoader;

/// Awaitable decode of an asset's CPU-side data. Clones share one load.
pub type LoadFuture = Shared<BoxFuture<'static, Result<Arc<MeshData>, AssetError>>>;

/// Awaitable GPU upload for one surface. Clones share one upload.
pub type MeshFuture = Shared<BoxFuture<'static, Result<Mesh, AssetError>>>;

/// The per-surface GPU side of mesh creation.
pub trait MeshUploader: Send + Sync {
    fn surface_id(&self) -> SurfaceId;

    fn create_vertex_buffer(
        &self,
        label: &str,
        vertices: &[Vertex],
    ) -> Result<BufferHandle, DeviceError>;

    fn release_vertex_buffer(&self, buffer: BufferHandle);
}

/// GPU-resident form of a mesh on one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh {
    pub vertex_buffer: BufferHandle,
    pub vertex_count: u32,
}

enum DataState {
    Idle,
    Loading(LoadFuture),
    Ready(Arc<MeshData>),
}

enum SurfaceSlot {
    Pending(MeshFuture),
    Resident(Mesh),
}

struct Inner {
    url: String,
    loader: Arc<dyn MeshLoader>,
    data: Mutex<DataState>,
    surfaces: Mutex<HashMap<SurfaceId, SurfaceSlot>>,
}

/// A mesh addressed by URL, decoded once and uploaded once per surface.
///
/// Cloning is cheap; clones share all state. The surface side table holds
/// plain [`SurfaceId`] keys and never keeps a surface alive; surfaces that go
/// away must call [`MeshAsset::detach`].
#[derive(Clone)]
pub struct MeshAsset {
    inner: Arc<Inner>,
}

impl fmt::Debug for MeshAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshAsset")
            .field("url", &self.inner.url)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl MeshAsset {
    pub fn new(url: impl Into<String>, loader: Arc<dyn MeshLoader>) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                loader,
                data: Mutex::new(DataState::Idle),
                surfaces: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Whether the CPU-side data is resident.
    pub fn is_loaded(&self) -> bool {
        matches!(*self.inner.data.lock(), DataState::Ready(_))
    }

    /// True when both handles refer to the same asset.
    pub fn ptr_eq(&self, other: &MeshAsset) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fetch and decode the mesh data.
    ///
    /// The loader runs at most once: callers arriving while a load is in
    /// flight await the same operation, and a finished load (successful or
    /// failed) is handed back without fetching again.
    pub fn preload(&self) -> LoadFuture {
        let mut state = self.inner.data.lock();
        match &*state {
            DataState::Ready(data) => future::ready(Ok(data.clone())).boxed().shared(),
            DataState::Loading(load) => load.clone(),
            DataState::Idle => {
                tracing::debug!(url = %self.inner.url, "mesh load started");
                let fetch = self.inner.loader.load(&self.inner.url);
                let url = self.inner.url.clone();
                let weak = Arc::downgrade(&self.inner);
                let load = async move {
                    let raw = fetch.await?;
                    let data = decode(&raw).map_err(|source| AssetError::Decode {
                        url: url.clone(),
                        source,
                    })?;
                    let data = Arc::new(data);
                    if let Some(inner) = weak.upgrade() {
                        *inner.data.lock() = DataState::Ready(data.clone());
                    }
                    tracing::debug!(%url, vertices = data.vertices.len(), "mesh decoded");
                    Ok(data)
                }
                .boxed()
                .shared();
                *state = DataState::Loading(load.clone());
                load
            }
        }
    }

    /// The GPU mesh for `uploader`'s surface, creating it if absent.
    ///
    /// Concurrent calls for one surface converge on a single upload; calls
    /// for different surfaces proceed independently.
    pub fn get(&self, uploader: Arc<dyn MeshUploader>) -> MeshFuture {
        let surface = uploader.surface_id();
        let mut surfaces = self.inner.surfaces.lock();
        match surfaces.get(&surface) {
            Some(SurfaceSlot::Resident(mesh)) => {
                return future::ready(Ok(*mesh)).boxed().shared();
            }
            Some(SurfaceSlot::Pending(pending)) => return pending.clone(),
            None => {}
        }

        let load = self.preload();
        let url = self.inner.url.clone();
        let weak = Arc::downgrade(&self.inner);
        let upload = async move {
            let data = load.await?;
            let vertex_buffer = uploader.create_vertex_buffer(&url, &data.vertices)?;
            let mesh = Mesh {
                vertex_buffer,
                vertex_count: data.vertex_count(),
            };
            let Some(inner) = weak.upgrade() else {
                return Ok(mesh);
            };
            let mut surfaces = inner.surfaces.lock();
            if surfaces.contains_key(&surface) {
                surfaces.insert(surface, SurfaceSlot::Resident(mesh));
                tracing::debug!(%url, surface = surface.0, "mesh resident");
                Ok(mesh)
            } else {
                drop(surfaces);
                uploader.release_vertex_buffer(vertex_buffer);
                Err(AssetError::Detached { url })
            }
        }
        .boxed()
        .shared();

        surfaces.insert(surface, SurfaceSlot::Pending(upload.clone()));
        upload
    }

    /// The mesh for `surface` if it has already been uploaded.
    ///
    /// Never loads, never blocks.
    pub fn peek(&self, surface: SurfaceId) -> Option<Mesh> {
        match self.inner.surfaces.lock().get(&surface) {
            Some(SurfaceSlot::Resident(mesh)) => Some(*mesh),
            _ => None,
        }
    }

    /// Forget everything held for `surface`.
    ///
    /// Returns the resident mesh so the caller can release its buffer. An
    /// upload still in flight releases its own buffer when it completes.
    pub fn detach(&self, surface: SurfaceId) -> Option<Mesh> {
        match self.inner.surfaces.lock().remove(&surface) {
            Some(SurfaceSlot::Resident(mesh)) => Some(mesh),
            _ => None,
        }
    }
}
