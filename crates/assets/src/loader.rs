use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::decode::RawAttributes;
use crate::error::{AssetError, DecodeError};

/// Source of raw vertex attributes for a mesh URL.
///
/// Implementations perform the fetch and parse; the returned future is only
/// ever awaited once per asset.
pub trait MeshLoader: Send + Sync {
    fn load(&self, url: &str) -> BoxFuture<'static, Result<RawAttributes, AssetError>>;
}

/// Loads Wavefront OBJ files from the local filesystem.
///
/// URLs may be plain paths or `file://` URLs; relative paths resolve against
/// the loader's root directory.
#[derive(Debug, Clone)]
pub struct ObjLoader {
    root: PathBuf,
}

impl ObjLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl MeshLoader for ObjLoader {
    fn load(&self, url: &str) -> BoxFuture<'static, Result<RawAttributes, AssetError>> {
        let url = url.to_string();
        let path = self.resolve(&url);
        async move { load_obj_file(&url, &path) }.boxed()
    }
}

fn malformed(url: &str, reason: impl Into<String>) -> AssetError {
    AssetError::Decode {
        url: url.to_string(),
        source: DecodeError::Malformed(reason.into()),
    }
}

/// Parse an OBJ file and flatten every model into non-indexed attribute arrays.
fn load_obj_file(url: &str, path: &Path) -> Result<RawAttributes, AssetError> {
    let _span = tracing::debug_span!("load_obj", url).entered();

    let (models, _materials) =
        tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|err| match err {
            tobj::LoadError::OpenFileFailed | tobj::LoadError::ReadError => AssetError::Load {
                url: url.to_string(),
                reason: format!("{err} ({})", path.display()),
            },
            other => malformed(url, other.to_string()),
        })?;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut texcoords = Vec::new();
    let mut has_normals = true;
    let mut has_texcoords = true;

    for model in &models {
        let mesh = &model.mesh;
        has_normals &= !mesh.normals.is_empty();
        has_texcoords &= !mesh.texcoords.is_empty();

        for &index in &mesh.indices {
            let i = index as usize;
            let position = mesh
                .positions
                .get(3 * i..3 * i + 3)
                .ok_or_else(|| malformed(url, format!("index {i} out of range in {}", model.name)))?;
            positions.extend_from_slice(position);

            if let Some(normal) = mesh.normals.get(3 * i..3 * i + 3) {
                normals.extend_from_slice(normal);
            }
            if let Some(uv) = mesh.texcoords.get(2 * i..2 * i + 2) {
                texcoords.extend_from_slice(uv);
            }
        }
    }

    tracing::debug!(
        models = models.len(),
        vertices = positions.len() / 3,
        "obj flattened"
    );

    Ok(RawAttributes {
        positions: Some(positions),
        normals: has_normals.then_some(normals),
        texcoords: has_texcoords.then_some(texcoords),
    })
}
