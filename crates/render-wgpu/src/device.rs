use std::collections::HashMap;

use descent_assets::{MeshUploader, Vertex};
use descent_common::{
    BindGroupHandle, BindGroupLayoutHandle, BufferHandle, DeviceError, HandleAllocator,
    PipelineHandle, SurfaceId, TextureHandle,
};
use descent_render::{DrawCall, PipelineDesc, RenderDevice, Resource, TextureFormat, Viewport};
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use crate::convert;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no GPU adapter can present to this surface")]
    NoAdapter,
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface supports no 8-bit color format")]
    NoSurfaceFormat,
}

#[derive(Default)]
struct ResourceTable {
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    bind_groups: HashMap<BindGroupHandle, wgpu::BindGroup>,
    pipelines: HashMap<PipelineHandle, wgpu::RenderPipeline>,
    depth_targets: HashMap<TextureHandle, wgpu::TextureView>,
}

/// The surface texture being drawn into, acquired on the first draw of a
/// frame and presented on submit.
struct Frame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

/// [`RenderDevice`] backed by a wgpu device presenting to one surface.
pub struct WgpuDevice {
    id: SurfaceId,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: Mutex<wgpu::SurfaceConfiguration>,
    format: TextureFormat,
    adapter_info: wgpu::AdapterInfo,
    handles: HandleAllocator,
    uniform_layout_handle: BindGroupLayoutHandle,
    uniform_layout: wgpu::BindGroupLayout,
    resources: Mutex<ResourceTable>,
    frame: Mutex<Option<Frame>>,
    // Error scopes are per device. Held around every device call made while
    // a scope may be open elsewhere: scoped creations, pass encoding, surface
    // configuration and submission. Lock order: resources, scope_lock, frame.
    scope_lock: Mutex<()>,
}

impl WgpuDevice {
    /// Bring up an adapter, device and queue able to present to `target`.
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, SetupError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(target)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SetupError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("descent_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let supported: Vec<(wgpu::TextureFormat, TextureFormat)> = caps
            .formats
            .iter()
            .filter_map(|f| convert::surface_format(*f).map(|ours| (*f, ours)))
            .collect();
        let (surface_format, format) = supported
            .iter()
            .find(|(f, _)| f.is_srgb())
            .or_else(|| supported.first())
            .copied()
            .ok_or(SetupError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let adapter_info = adapter.get_info();
        tracing::info!(
            backend = adapter_info.backend.to_str(),
            adapter = %adapter_info.name,
            ?format,
            "GPU initialized"
        );

        let handles = HandleAllocator::new();
        let uniform_layout_handle = handles.layout();
        Ok(Self {
            id: SurfaceId::next(),
            device,
            queue,
            surface,
            config: Mutex::new(config),
            format,
            adapter_info,
            handles,
            uniform_layout_handle,
            uniform_layout,
            resources: Mutex::new(ResourceTable::default()),
            frame: Mutex::new(None),
            scope_lock: Mutex::new(()),
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Run a resource creation inside validation and out-of-memory error
    /// scopes, turning captured errors into [`DeviceError`]s.
    fn scoped<T>(&self, what: &str, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, DeviceError> {
        let _guard = self.scope_lock.lock();
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match (validation, out_of_memory) {
            (Some(err), _) => Err(DeviceError::Validation(format!("{what}: {err}"))),
            (None, Some(err)) => Err(DeviceError::OutOfMemory(format!("{what}: {err}"))),
            (None, None) => Ok(value),
        }
    }

    fn acquire_frame(&self) -> Result<Frame, DeviceError> {
        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                // Reconfigure so the next frame can acquire again.
                self.surface.configure(&self.device, &self.config.lock());
                return Err(DeviceError::SurfaceUnavailable(err.to_string()));
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(DeviceError::OutOfMemory("surface texture".into()));
            }
            Err(err) => return Err(DeviceError::SurfaceUnavailable(err.to_string())),
        };
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        Ok(Frame {
            texture,
            view,
            encoder,
        })
    }

    fn layout(&self, handle: BindGroupLayoutHandle) -> Result<&wgpu::BindGroupLayout, DeviceError> {
        if handle == self.uniform_layout_handle {
            Ok(&self.uniform_layout)
        } else {
            Err(DeviceError::UnknownHandle(handle.to_string()))
        }
    }
}

impl MeshUploader for WgpuDevice {
    fn surface_id(&self) -> SurfaceId {
        self.id
    }

    fn create_vertex_buffer(
        &self,
        label: &str,
        vertices: &[Vertex],
    ) -> Result<BufferHandle, DeviceError> {
        if vertices.is_empty() {
            return Err(DeviceError::Validation(format!("{label}: empty vertex buffer")));
        }
        let buffer = self.scoped(label, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        })?;
        let handle = self.handles.buffer();
        self.resources.lock().buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn release_vertex_buffer(&self, buffer: BufferHandle) {
        self.release(Resource::Buffer(buffer));
    }
}

impl RenderDevice for WgpuDevice {
    fn surface_format(&self) -> TextureFormat {
        self.format
    }

    fn uniform_layout(&self) -> BindGroupLayoutHandle {
        self.uniform_layout_handle
    }

    fn create_uniform_buffer(&self, label: &str, size: u64) -> Result<BufferHandle, DeviceError> {
        let buffer = self.scoped(label, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;
        let handle = self.handles.buffer();
        self.resources.lock().buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn write_buffer(&self, buffer: BufferHandle, data: &[u8]) -> Result<(), DeviceError> {
        let resources = self.resources.lock();
        let target = resources
            .buffers
            .get(&buffer)
            .ok_or_else(|| DeviceError::UnknownHandle(buffer.to_string()))?;
        if data.len() as u64 > target.size() {
            return Err(DeviceError::Validation(format!(
                "{} bytes written to {}-byte {buffer}",
                data.len(),
                target.size()
            )));
        }
        self.queue.write_buffer(target, 0, data);
        Ok(())
    }

    fn create_bind_group(
        &self,
        label: &str,
        layout: BindGroupLayoutHandle,
        buffer: BufferHandle,
    ) -> Result<BindGroupHandle, DeviceError> {
        let layout = self.layout(layout)?;
        let mut resources = self.resources.lock();
        let bind_group = {
            let buffer = resources
                .buffers
                .get(&buffer)
                .ok_or_else(|| DeviceError::UnknownHandle(buffer.to_string()))?;
            self.scoped(label, |device| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(label),
                    layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })?
        };
        let handle = self.handles.bind_group();
        resources.bind_groups.insert(handle, bind_group);
        Ok(handle)
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<PipelineHandle, DeviceError> {
        let layouts = desc
            .bind_group_layouts
            .iter()
            .map(|handle| self.layout(*handle))
            .collect::<Result<Vec<_>, _>>()?;
        let attributes: Vec<wgpu::VertexAttribute> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attr| wgpu::VertexAttribute {
                format: convert::vertex_format(attr.format),
                offset: attr.offset,
                shader_location: attr.location,
            })
            .collect();

        let pipeline = self.scoped(desc.label, |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.shader.into()),
            });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some(desc.vertex_entry),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: desc.vertex_layout.stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(desc.fragment_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: convert::texture_format(desc.color_format),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: convert::texture_format(desc.depth_format),
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        })?;

        let handle = self.handles.pipeline();
        self.resources.lock().pipelines.insert(handle, pipeline);
        Ok(handle)
    }

    fn create_depth_texture(&self, width: u32, height: u32) -> Result<TextureHandle, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::ZeroSized { width, height });
        }
        let view = self.scoped("depth_texture", |device| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("depth_texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: convert::texture_format(Viewport::DEPTH_FORMAT),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            texture.create_view(&Default::default())
        })?;
        let handle = self.handles.texture();
        self.resources.lock().depth_targets.insert(handle, view);
        Ok(handle)
    }

    fn configure_surface(&self, width: u32, height: u32) -> Result<(), DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::ZeroSized { width, height });
        }
        let _scope = self.scope_lock.lock();
        // A texture acquired at the old size must not outlive the reconfigure.
        self.frame.lock().take();
        let mut config = self.config.lock();
        config.width = width;
        config.height = height;
        self.surface.configure(&self.device, &config);
        Ok(())
    }

    fn release(&self, resource: Resource) {
        let mut resources = self.resources.lock();
        let released = match resource {
            Resource::Buffer(handle) => resources.buffers.remove(&handle).is_some(),
            Resource::BindGroup(handle) => resources.bind_groups.remove(&handle).is_some(),
            Resource::Texture(handle) => resources.depth_targets.remove(&handle).is_some(),
            Resource::Pipeline(handle) => resources.pipelines.remove(&handle).is_some(),
        };
        if !released {
            tracing::trace!(?resource, "release of unknown resource ignored");
        }
    }

    fn encode_draw(&self, draw: &DrawCall) -> Result<(), DeviceError> {
        let resources = self.resources.lock();
        let pipeline = resources
            .pipelines
            .get(&draw.pipeline)
            .ok_or_else(|| DeviceError::UnknownHandle(draw.pipeline.to_string()))?;
        let bind_groups = draw
            .bind_groups
            .iter()
            .map(|handle| {
                resources
                    .bind_groups
                    .get(handle)
                    .ok_or_else(|| DeviceError::UnknownHandle(handle.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let vertex_buffer = resources
            .buffers
            .get(&draw.vertex_buffer)
            .ok_or_else(|| DeviceError::UnknownHandle(draw.vertex_buffer.to_string()))?;
        let depth = resources
            .depth_targets
            .get(&draw.depth_target)
            .ok_or_else(|| DeviceError::UnknownHandle(draw.depth_target.to_string()))?;

        let _scope = self.scope_lock.lock();
        let mut slot = self.frame.lock();
        if slot.is_none() {
            *slot = Some(self.acquire_frame()?);
        }
        let Some(frame) = slot.as_mut() else {
            return Err(DeviceError::SurfaceUnavailable("no frame in flight".into()));
        };

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&draw.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: convert::color_load(draw.color_load),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: convert::depth_load(draw.depth_load),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        pass.set_pipeline(pipeline);
        for (index, bind_group) in bind_groups.into_iter().enumerate() {
            pass.set_bind_group(index as u32, bind_group, &[]);
        }
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.draw(0..draw.vertex_count, 0..1);
        Ok(())
    }

    fn submit(&self) -> Result<(), DeviceError> {
        let _scope = self.scope_lock.lock();
        match self.frame.lock().take() {
            Some(frame) => {
                self.queue.submit(std::iter::once(frame.encoder.finish()));
                frame.texture.present();
            }
            // Nothing drawn: flush queued buffer writes without presenting.
            None => {
                self.queue.submit(std::iter::empty());
            }
        }
        Ok(())
    }
}
