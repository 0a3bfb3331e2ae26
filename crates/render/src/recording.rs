use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use descent_assets::{MeshUploader, Vertex};
use descent_common::{
    BindGroupHandle, BindGroupLayoutHandle, BufferHandle, DeviceError, HandleAllocator,
    PipelineHandle, SurfaceId, TextureHandle,
};
use parking_lot::Mutex;

use crate::device::{DrawCall, PipelineDesc, RenderDevice, Resource, TextureFormat};

/// One operation observed by a [`RecordingDevice`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateVertexBuffer { buffer: BufferHandle, vertices: usize },
    CreateUniformBuffer { buffer: BufferHandle, size: u64 },
    WriteBuffer { buffer: BufferHandle, data: Vec<u8> },
    CreateBindGroup { bind_group: BindGroupHandle, buffer: BufferHandle },
    CreatePipeline { pipeline: PipelineHandle, label: String, format: TextureFormat },
    CreateDepthTexture { texture: TextureHandle, width: u32, height: u32 },
    ConfigureSurface { width: u32, height: u32 },
    Release(Resource),
    Draw(DrawCall),
    Submit { draws: usize },
}

#[derive(Default)]
struct RecorderState {
    commands: Vec<DeviceCommand>,
    buffers: HashMap<BufferHandle, u64>,
    bind_groups: HashSet<BindGroupHandle>,
    textures: HashSet<TextureHandle>,
    pipelines: HashSet<PipelineHandle>,
    draws_this_frame: usize,
    failing_uniform_buffers: usize,
    failing_depth_textures: usize,
    surface_size: Option<(u32, u32)>,
    surface_lost: bool,
}

/// A [`RenderDevice`] that validates handles and records every call instead
/// of talking to a GPU.
///
/// Used wherever no adapter is available: tests, and the CLI's frame dump.
pub struct RecordingDevice {
    surface: SurfaceId,
    format: TextureFormat,
    handles: HandleAllocator,
    uniform_layout: BindGroupLayoutHandle,
    state: Mutex<RecorderState>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        let handles = HandleAllocator::new();
        let uniform_layout = handles.layout();
        Self {
            surface: SurfaceId::next(),
            format: TextureFormat::Bgra8UnormSrgb,
            handles,
            uniform_layout,
            state: Mutex::new(RecorderState::default()),
        }
    }

    /// Make the next `count` uniform buffer creations fail with
    /// [`DeviceError::OutOfMemory`].
    pub fn fail_next_uniform_buffers(&self, count: usize) {
        self.state.lock().failing_uniform_buffers = count;
    }

    /// Make the next `count` depth texture creations fail with
    /// [`DeviceError::OutOfMemory`].
    pub fn fail_next_depth_textures(&self, count: usize) {
        self.state.lock().failing_depth_textures = count;
    }

    /// Simulate a lost presentation surface: draws fail until cleared.
    pub fn set_surface_lost(&self, lost: bool) {
        self.state.lock().surface_lost = lost;
    }

    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.state.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.state
            .lock()
            .commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw(draw) => Some(draw.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every payload written to `buffer`, oldest first.
    pub fn writes_to(&self, buffer: BufferHandle) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::WriteBuffer { buffer: b, data } if *b == buffer => {
                    Some(data.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn submit_count(&self) -> usize {
        self.state
            .lock()
            .commands
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Submit { .. }))
            .count()
    }

    pub fn is_live(&self, resource: Resource) -> bool {
        let state = self.state.lock();
        match resource {
            Resource::Buffer(b) => state.buffers.contains_key(&b),
            Resource::BindGroup(g) => state.bind_groups.contains(&g),
            Resource::Texture(t) => state.textures.contains(&t),
            Resource::Pipeline(p) => state.pipelines.contains(&p),
        }
    }

    /// Number of live buffers, bind groups, textures and pipelines.
    pub fn live_resources(&self) -> usize {
        let state = self.state.lock();
        state.buffers.len()
            + state.bind_groups.len()
            + state.textures.len()
            + state.pipelines.len()
    }

    /// Size the surface was last configured to.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.state.lock().surface_size
    }

    /// Human-readable dump of the command log.
    pub fn trace(&self) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        for command in &state.commands {
            let _ = match command {
                DeviceCommand::WriteBuffer { buffer, data } => {
                    writeln!(out, "write {buffer} ({} bytes)", data.len())
                }
                DeviceCommand::Draw(draw) => writeln!(
                    out,
                    "draw {} vertices={} color={} depth={}",
                    draw.label,
                    draw.vertex_count,
                    if draw.color_load.is_clear() { "clear" } else { "load" },
                    if draw.depth_load.is_clear() { "clear" } else { "load" },
                ),
                other => writeln!(out, "{other:?}"),
            };
        }
        out
    }

    fn record(state: &mut RecorderState, command: DeviceCommand) {
        state.commands.push(command);
    }
}

impl MeshUploader for RecordingDevice {
    fn surface_id(&self) -> SurfaceId {
        self.surface
    }

    fn create_vertex_buffer(
        &self,
        _label: &str,
        vertices: &[Vertex],
    ) -> Result<BufferHandle, DeviceError> {
        if vertices.is_empty() {
            return Err(DeviceError::Validation("empty vertex buffer".into()));
        }
        let buffer = self.handles.buffer();
        let size = std::mem::size_of_val(vertices) as u64;
        let mut state = self.state.lock();
        state.buffers.insert(buffer, size);
        Self::record(
            &mut state,
            DeviceCommand::CreateVertexBuffer {
                buffer,
                vertices: vertices.len(),
            },
        );
        Ok(buffer)
    }

    fn release_vertex_buffer(&self, buffer: BufferHandle) {
        self.release(Resource::Buffer(buffer));
    }
}

impl RenderDevice for RecordingDevice {
    fn surface_format(&self) -> TextureFormat {
        self.format
    }

    fn uniform_layout(&self) -> BindGroupLayoutHandle {
        self.uniform_layout
    }

    fn create_uniform_buffer(&self, label: &str, size: u64) -> Result<BufferHandle, DeviceError> {
        let mut state = self.state.lock();
        if state.failing_uniform_buffers > 0 {
            state.failing_uniform_buffers -= 1;
            return Err(DeviceError::OutOfMemory(label.to_string()));
        }
        if size == 0 {
            return Err(DeviceError::Validation(format!("{label}: zero-sized buffer")));
        }
        let buffer = self.handles.buffer();
        state.buffers.insert(buffer, size);
        Self::record(&mut state, DeviceCommand::CreateUniformBuffer { buffer, size });
        Ok(buffer)
    }

    fn write_buffer(&self, buffer: BufferHandle, data: &[u8]) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        let size = *state
            .buffers
            .get(&buffer)
            .ok_or_else(|| DeviceError::UnknownHandle(buffer.to_string()))?;
        if data.len() as u64 > size {
            return Err(DeviceError::Validation(format!(
                "{} bytes written to {size}-byte {buffer}",
                data.len()
            )));
        }
        Self::record(
            &mut state,
            DeviceCommand::WriteBuffer {
                buffer,
                data: data.to_vec(),
            },
        );
        Ok(())
    }

    fn create_bind_group(
        &self,
        _label: &str,
        layout: BindGroupLayoutHandle,
        buffer: BufferHandle,
    ) -> Result<BindGroupHandle, DeviceError> {
        if layout != self.uniform_layout {
            return Err(DeviceError::UnknownHandle(layout.to_string()));
        }
        let mut state = self.state.lock();
        if !state.buffers.contains_key(&buffer) {
            return Err(DeviceError::UnknownHandle(buffer.to_string()));
        }
        let bind_group = self.handles.bind_group();
        state.bind_groups.insert(bind_group);
        Self::record(&mut state, DeviceCommand::CreateBindGroup { bind_group, buffer });
        Ok(bind_group)
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<PipelineHandle, DeviceError> {
        if desc.shader.is_empty() {
            return Err(DeviceError::Validation(format!("{}: empty shader", desc.label)));
        }
        let pipeline = self.handles.pipeline();
        let mut state = self.state.lock();
        state.pipelines.insert(pipeline);
        Self::record(
            &mut state,
            DeviceCommand::CreatePipeline {
                pipeline,
                label: desc.label.to_string(),
                format: desc.color_format,
            },
        );
        Ok(pipeline)
    }

    fn create_depth_texture(&self, width: u32, height: u32) -> Result<TextureHandle, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::ZeroSized { width, height });
        }
        let mut state = self.state.lock();
        if state.failing_depth_textures > 0 {
            state.failing_depth_textures -= 1;
            return Err(DeviceError::OutOfMemory(format!("{width}x{height} depth texture")));
        }
        let texture = self.handles.texture();
        state.textures.insert(texture);
        Self::record(
            &mut state,
            DeviceCommand::CreateDepthTexture {
                texture,
                width,
                height,
            },
        );
        Ok(texture)
    }

    fn configure_surface(&self, width: u32, height: u32) -> Result<(), DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::ZeroSized { width, height });
        }
        let mut state = self.state.lock();
        state.surface_size = Some((width, height));
        Self::record(&mut state, DeviceCommand::ConfigureSurface { width, height });
        Ok(())
    }

    fn release(&self, resource: Resource) {
        let mut state = self.state.lock();
        let removed = match resource {
            Resource::Buffer(b) => state.buffers.remove(&b).is_some(),
            Resource::BindGroup(g) => state.bind_groups.remove(&g),
            Resource::Texture(t) => state.textures.remove(&t),
            Resource::Pipeline(p) => state.pipelines.remove(&p),
        };
        if removed {
            Self::record(&mut state, DeviceCommand::Release(resource));
        }
    }

    fn encode_draw(&self, draw: &DrawCall) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if state.surface_lost {
            return Err(DeviceError::SurfaceUnavailable("surface lost".into()));
        }
        if !state.pipelines.contains(&draw.pipeline) {
            return Err(DeviceError::UnknownHandle(draw.pipeline.to_string()));
        }
        if let Some(group) = draw
            .bind_groups
            .iter()
            .find(|g| !state.bind_groups.contains(*g))
        {
            return Err(DeviceError::UnknownHandle(group.to_string()));
        }
        if !state.buffers.contains_key(&draw.vertex_buffer) {
            return Err(DeviceError::UnknownHandle(draw.vertex_buffer.to_string()));
        }
        if !state.textures.contains(&draw.depth_target) {
            return Err(DeviceError::UnknownHandle(draw.depth_target.to_string()));
        }
        state.draws_this_frame += 1;
        Self::record(&mut state, DeviceCommand::Draw(draw.clone()));
        Ok(())
    }

    fn submit(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        let draws = std::mem::take(&mut state.draws_this_frame);
        Self::record(&mut state, DeviceCommand::Submit { draws });
        Ok(())
    }
}
