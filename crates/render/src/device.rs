use descent_assets::{MeshUploader, Vertex};
use descent_common::{
    BindGroupHandle, BindGroupLayoutHandle, BufferHandle, Color, DeviceError, PipelineHandle,
    TextureHandle,
};

/// Texture formats the renderer negotiates with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Depth32Float,
}

/// Component format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Vertex buffer layout a material's pipeline expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Layout of [`Vertex`]: position, normal, uv at locations 0, 1, 2.
    pub fn mesh() -> Self {
        Self {
            stride: std::mem::size_of::<Vertex>() as u64,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                },
                VertexAttribute {
                    location: 1,
                    format: VertexFormat::Float32x3,
                    offset: 12,
                },
                VertexAttribute {
                    location: 2,
                    format: VertexFormat::Float32x2,
                    offset: 24,
                },
            ],
        }
    }
}

/// Everything a backend needs to build one render pipeline.
///
/// Bind groups are fixed: 0 = shared camera, 1 = per-object transforms,
/// 2 = material parameters.
#[derive(Debug, Clone)]
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    pub shader: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub vertex_layout: &'a VertexLayout,
    pub bind_group_layouts: [BindGroupLayoutHandle; 3],
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
}

/// Attachment behavior at the start of a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    Clear(V),
    Load,
}

impl<V> LoadOp<V> {
    pub fn is_clear(&self) -> bool {
        matches!(self, LoadOp::Clear(_))
    }
}

/// One recorded draw against the surface's current color texture and the
/// given depth target.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub label: String,
    pub pipeline: PipelineHandle,
    pub bind_groups: [BindGroupHandle; 3],
    pub vertex_buffer: BufferHandle,
    pub vertex_count: u32,
    pub depth_target: TextureHandle,
    pub color_load: LoadOp<Color>,
    pub depth_load: LoadOp<f32>,
}

/// A releasable GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Buffer(BufferHandle),
    BindGroup(BindGroupHandle),
    Texture(TextureHandle),
    Pipeline(PipelineHandle),
}

/// GPU device bound to one presentation surface.
///
/// All resources are addressed by handles minted by the implementation.
/// Draws target the surface's current color texture, acquired on the first
/// draw of a frame; [`RenderDevice::submit`] flushes queued writes and
/// presents whatever was drawn.
pub trait RenderDevice: MeshUploader + Send + Sync {
    /// Presentation format of the surface.
    fn surface_format(&self) -> TextureFormat;

    /// Layout of a bind group holding one uniform buffer at binding 0.
    fn uniform_layout(&self) -> BindGroupLayoutHandle;

    fn create_uniform_buffer(&self, label: &str, size: u64) -> Result<BufferHandle, DeviceError>;

    fn write_buffer(&self, buffer: BufferHandle, data: &[u8]) -> Result<(), DeviceError>;

    fn create_bind_group(
        &self,
        label: &str,
        layout: BindGroupLayoutHandle,
        buffer: BufferHandle,
    ) -> Result<BindGroupHandle, DeviceError>;

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<PipelineHandle, DeviceError>;

    fn create_depth_texture(&self, width: u32, height: u32) -> Result<TextureHandle, DeviceError>;

    /// Reconfigure the presentation surface for a new size.
    fn configure_surface(&self, width: u32, height: u32) -> Result<(), DeviceError>;

    fn release(&self, resource: Resource);

    fn encode_draw(&self, draw: &DrawCall) -> Result<(), DeviceError>;

    fn submit(&self) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_layout_matches_vertex() {
        let layout = VertexLayout::mesh();
        assert_eq!(layout.stride, 32);
        let last = layout.attributes.last().unwrap();
        assert_eq!(last.offset + 8, layout.stride);
    }

    #[test]
    fn load_op_reports_clear() {
        assert!(LoadOp::Clear(1.0_f32).is_clear());
        assert!(!LoadOp::<f32>::Load.is_clear());
    }
}
