use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use descent_common::{BindGroupLayoutHandle, DeviceError, PipelineHandle, SurfaceId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::device::{PipelineDesc, RenderDevice, Resource, TextureFormat, VertexLayout};
use crate::viewport::Viewport;

/// Shader-side type of one material parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    F32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl ParamKind {
    /// Alignment under WGSL uniform address space rules.
    fn align(self) -> u64 {
        match self {
            ParamKind::F32 => 4,
            ParamKind::Vec2 => 8,
            ParamKind::Vec3 | ParamKind::Vec4 | ParamKind::Mat4 => 16,
        }
    }

    fn size(self) -> u64 {
        match self {
            ParamKind::F32 => 4,
            ParamKind::Vec2 => 8,
            ParamKind::Vec3 => 12,
            ParamKind::Vec4 => 16,
            ParamKind::Mat4 => 64,
        }
    }
}

/// A concrete parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    F32(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::F32(_) => ParamKind::F32,
            ParamValue::Vec2(_) => ParamKind::Vec2,
            ParamValue::Vec3(_) => ParamKind::Vec3,
            ParamValue::Vec4(_) => ParamKind::Vec4,
            ParamValue::Mat4(_) => ParamKind::Mat4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            ParamValue::F32(v) => bytemuck::bytes_of(v),
            ParamValue::Vec2(v) => bytemuck::bytes_of(v),
            ParamValue::Vec3(v) => bytemuck::bytes_of(v),
            ParamValue::Vec4(v) => bytemuck::bytes_of(v),
            ParamValue::Mat4(v) => bytemuck::bytes_of(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("missing parameter `{0}`")]
    Missing(String),
    #[error("parameter `{name}` is {found:?}, schema expects {expected:?}")]
    KindMismatch {
        name: String,
        expected: ParamKind,
        found: ParamKind,
    },
    #[error("parameter `{0}` is not part of the schema")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamField {
    pub name: String,
    pub kind: ParamKind,
    pub offset: u64,
}

/// Byte layout of a material's parameter uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamsSchema {
    fields: Vec<ParamField>,
    size: u64,
}

impl Default for ParamsSchema {
    fn default() -> Self {
        Self::new(Vec::<(String, ParamKind)>::new())
    }
}

impl ParamsSchema {
    /// Lay out fields in order with WGSL uniform alignment.
    pub fn new<N: Into<String>>(fields: impl IntoIterator<Item = (N, ParamKind)>) -> Self {
        let mut offset: u64 = 0;
        let fields: Vec<ParamField> = fields
            .into_iter()
            .map(|(name, kind)| {
                offset = offset.next_multiple_of(kind.align());
                let field = ParamField {
                    name: name.into(),
                    kind,
                    offset,
                };
                offset += kind.size();
                field
            })
            .collect();
        // Uniform structs are 16-byte aligned; bindings must not be empty.
        let size = offset.next_multiple_of(16).max(16);
        Self { fields, size }
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    /// Size in bytes of the uniform buffer backing this schema.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn encode(&self, params: &MaterialParams) -> Result<Vec<u8>, ParamsError> {
        if let Some(name) = params
            .0
            .keys()
            .find(|name| !self.fields.iter().any(|f| &f.name == *name))
        {
            return Err(ParamsError::Unknown(name.clone()));
        }

        let mut out = vec![0u8; self.size() as usize];
        for field in &self.fields {
            let value = params
                .get(&field.name)
                .ok_or_else(|| ParamsError::Missing(field.name.clone()))?;
            if value.kind() != field.kind {
                return Err(ParamsError::KindMismatch {
                    name: field.name.clone(),
                    expected: field.kind,
                    found: value.kind(),
                });
            }
            let start = field.offset as usize;
            let bytes = value.bytes();
            out[start..start + bytes.len()].copy_from_slice(bytes);
        }
        Ok(out)
    }
}

/// Named parameter values for one object, matched against its material's
/// schema at upload time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialParams(BTreeMap<String, ParamValue>);

impl MaterialParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }
}

/// How an object is shaded.
///
/// A material owns its parameter schema; the renderer sizes each object's
/// parameter buffer from the schema of the material the object had when it
/// was first drawn. An object's material must not change while registered.
pub trait Material: Send + Sync + fmt::Debug {
    fn label(&self) -> &str;

    fn params_schema(&self) -> &ParamsSchema;

    fn vertex_layout(&self) -> &VertexLayout;

    fn params_layout(&self, device: &dyn RenderDevice) -> BindGroupLayoutHandle {
        device.uniform_layout()
    }

    /// Pipeline for drawing into `format` on `device`'s surface.
    fn pipeline(
        &self,
        device: &dyn RenderDevice,
        format: TextureFormat,
    ) -> Result<PipelineHandle, DeviceError>;

    /// Forget and release everything cached for `device`'s surface.
    fn release_surface(&self, _device: &dyn RenderDevice) {}
}

/// A material defined by WGSL source, compiled lazily per surface and format.
pub struct ShaderMaterial {
    label: String,
    shader: Cow<'static, str>,
    schema: ParamsSchema,
    vertex_layout: VertexLayout,
    pipelines: Mutex<HashMap<(SurfaceId, TextureFormat), PipelineHandle>>,
}

impl fmt::Debug for ShaderMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderMaterial")
            .field("label", &self.label)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl ShaderMaterial {
    pub const VERTEX_ENTRY: &'static str = "vs_main";
    pub const FRAGMENT_ENTRY: &'static str = "fs_main";

    pub fn new(
        label: impl Into<String>,
        shader: impl Into<Cow<'static, str>>,
        schema: ParamsSchema,
    ) -> Self {
        Self {
            label: label.into(),
            shader: shader.into(),
            schema,
            vertex_layout: VertexLayout::mesh(),
            pipelines: Mutex::new(HashMap::new()),
        }
    }
}

impl Material for ShaderMaterial {
    fn label(&self) -> &str {
        &self.label
    }

    fn params_schema(&self) -> &ParamsSchema {
        &self.schema
    }

    fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    fn pipeline(
        &self,
        device: &dyn RenderDevice,
        format: TextureFormat,
    ) -> Result<PipelineHandle, DeviceError> {
        let key = (device.surface_id(), format);
        let mut pipelines = self.pipelines.lock();
        if let Some(pipeline) = pipelines.get(&key) {
            return Ok(*pipeline);
        }

        let layout = device.uniform_layout();
        let pipeline = device.create_pipeline(&PipelineDesc {
            label: &self.label,
            shader: &self.shader,
            vertex_entry: Self::VERTEX_ENTRY,
            fragment_entry: Self::FRAGMENT_ENTRY,
            vertex_layout: &self.vertex_layout,
            bind_group_layouts: [layout, layout, self.params_layout(device)],
            color_format: format,
            depth_format: Viewport::DEPTH_FORMAT,
        })?;
        tracing::debug!(material = %self.label, ?format, "pipeline created");
        pipelines.insert(key, pipeline);
        Ok(pipeline)
    }

    fn release_surface(&self, device: &dyn RenderDevice) {
        let surface = device.surface_id();
        self.pipelines.lock().retain(|(owner, _), pipeline| {
            if *owner != surface {
                return true;
            }
            device.release(Resource::Pipeline(*pipeline));
            false
        });
    }
}
