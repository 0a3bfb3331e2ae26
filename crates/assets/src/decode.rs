use bytemuck::{Pod, Zeroable};

use crate::error::DecodeError;

/// One interleaved vertex as laid out in a GPU vertex buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Flat attribute arrays as produced by a model loader.
///
/// Positions and normals carry 3 components per vertex, texture coordinates 2.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAttributes {
    pub positions: Option<Vec<f32>>,
    pub normals: Option<Vec<f32>>,
    pub texcoords: Option<Vec<f32>>,
}

/// Decoded CPU-side mesh, shared by every surface the asset is drawn on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
}

impl MeshData {
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Axis-aligned bounds of all positions, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(mut lo, mut hi), v| {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(v.position[axis]);
                hi[axis] = hi[axis].max(v.position[axis]);
            }
            (lo, hi)
        }))
    }
}

fn attribute<'a>(values: &'a Option<Vec<f32>>, name: &'static str) -> Result<&'a [f32], DecodeError> {
    values.as_deref().ok_or(DecodeError::MissingAttribute(name))
}

fn check_count(
    values: &[f32],
    name: &'static str,
    components: usize,
    expected: usize,
) -> Result<(), DecodeError> {
    if values.len() % components != 0 {
        return Err(DecodeError::Misaligned {
            attribute: name,
            len: values.len(),
            components,
        });
    }
    let found = values.len() / components;
    if found != expected {
        return Err(DecodeError::CountMismatch {
            attribute: name,
            expected,
            found,
        });
    }
    Ok(())
}

/// Build one vertex per index `i` from `[3i, 3i+3)` of positions and normals
/// and `[2i, 2i+2)` of texture coordinates.
pub fn decode(raw: &RawAttributes) -> Result<MeshData, DecodeError> {
    let positions = attribute(&raw.positions, "POSITION")?;
    let normals = attribute(&raw.normals, "NORMAL")?;
    let texcoords = attribute(&raw.texcoords, "TEXCOORD_0")?;

    let vertex_count = positions.len() / 3;
    check_count(positions, "POSITION", 3, vertex_count)?;
    check_count(normals, "NORMAL", 3, vertex_count)?;
    check_count(texcoords, "TEXCOORD_0", 2, vertex_count)?;

    let vertices = positions
        .chunks_exact(3)
        .zip(normals.chunks_exact(3))
        .zip(texcoords.chunks_exact(2))
        .map(|((p, n), t)| Vertex {
            position: [p[0], p[1], p[2]],
            normal: [n[0], n[1], n[2]],
            uv: [t[0], t[1]],
        })
        .collect();

    Ok(MeshData { vertices })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> RawAttributes {
        RawAttributes {
            positions: Some(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            normals: Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
            texcoords: Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
        }
    }

    #[test]
    fn vertex_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn decode_slices_per_vertex() {
        let data = decode(&triangle()).unwrap();
        assert_eq!(data.vertex_count(), 3);
        assert_eq!(data.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(data.vertices[2].normal, [0.0, 0.0, 1.0]);
        assert_eq!(data.vertices[2].uv, [0.0, 1.0]);
    }

    #[test]
    fn decode_requires_every_attribute() {
        let mut raw = triangle();
        raw.texcoords = None;
        assert_eq!(
            decode(&raw),
            Err(DecodeError::MissingAttribute("TEXCOORD_0"))
        );

        let mut raw = triangle();
        raw.normals = None;
        assert_eq!(decode(&raw), Err(DecodeError::MissingAttribute("NORMAL")));
    }

    #[test]
    fn decode_rejects_short_normals() {
        let mut raw = triangle();
        raw.normals = Some(vec![0.0, 0.0, 1.0]);
        assert!(matches!(
            decode(&raw),
            Err(DecodeError::CountMismatch {
                attribute: "NORMAL",
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn decode_rejects_ragged_positions() {
        let mut raw = triangle();
        raw.positions = Some(vec![0.0; 4]);
        assert!(matches!(
            decode(&raw),
            Err(DecodeError::Misaligned { attribute: "POSITION", .. })
        ));
    }

    #[test]
    fn bounds_cover_all_positions() {
        let data = decode(&triangle()).unwrap();
        let (lo, hi) = data.bounds().unwrap();
        assert_eq!(lo, [0.0, 0.0, 0.0]);
        assert_eq!(hi, [1.0, 1.0, 0.0]);
        assert!(MeshData::default().bounds().is_none());
    }
}
