use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use descent_assets::{MeshAsset, MeshUploader};
use descent_common::{
    BindGroupHandle, BufferHandle, DeviceError, ObjectId, SurfaceId, Transform,
};
use futures::task::{Spawn, SpawnExt};
use glam::Mat4;

use crate::camera::{CameraState, ObjectUniforms, PerspectiveConfig, PovUniform};
use crate::canvas::{Canvas, ResizeSubscription};
use crate::device::{DrawCall, LoadOp, RenderDevice, Resource, TextureFormat};
use crate::material::{Material, MaterialParams, ParamsError, ParamsSchema};
use crate::viewport::Viewport;

/// Depth value the first draw of a frame clears to.
const CLEAR_DEPTH: f32 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("{0} is already registered")]
    DuplicateObject(ObjectId),
    #[error("parameters of {id} do not match its material: {source}")]
    Params {
        id: ObjectId,
        #[source]
        source: ParamsError,
    },
}

/// Something the renderer draws: a mesh, a placement and a material.
#[derive(Debug, Clone)]
pub struct RenderableObject {
    pub id: ObjectId,
    pub mesh: MeshAsset,
    pub world_matrix: Mat4,
    pub material: Arc<dyn Material>,
    pub params: MaterialParams,
}

impl RenderableObject {
    pub fn new(
        id: ObjectId,
        mesh: MeshAsset,
        material: Arc<dyn Material>,
        params: MaterialParams,
    ) -> Self {
        Self {
            id,
            mesh,
            world_matrix: Mat4::IDENTITY,
            material,
            params,
        }
    }

    pub fn with_transform(mut self, transform: &Transform) -> Self {
        self.world_matrix = transform.matrix();
        self
    }
}

/// What one call to [`FrameRenderer::render`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Objects drawn, in draw order.
    pub drawn: Vec<ObjectId>,
    /// Objects skipped because their mesh is not resident yet.
    pub not_ready: usize,
    /// Objects skipped because of a device or parameter error.
    pub failed: usize,
    /// Whether a draw cleared the color and depth targets.
    pub cleared: bool,
}

/// GPU resources created for one object on first use.
struct ObjectResources {
    uniforms_buffer: BufferHandle,
    uniforms_bind_group: BindGroupHandle,
    params_buffer: BufferHandle,
    params_bind_group: BindGroupHandle,
    params_schema: ParamsSchema,
}

impl ObjectResources {
    fn create(device: &dyn RenderDevice, object: &RenderableObject) -> Result<Self, DeviceError> {
        let label = object.id.to_string();
        let schema = object.material.params_schema().clone();
        let release_all = |resources: &[Resource]| {
            for resource in resources {
                device.release(*resource);
            }
        };

        let uniforms_buffer = device.create_uniform_buffer(
            &format!("{label} uniforms"),
            std::mem::size_of::<ObjectUniforms>() as u64,
        )?;
        let uniforms_bind_group = device
            .create_bind_group(&label, device.uniform_layout(), uniforms_buffer)
            .inspect_err(|_| release_all(&[Resource::Buffer(uniforms_buffer)]))?;
        let params_buffer = device
            .create_uniform_buffer(&format!("{label} params"), schema.size())
            .inspect_err(|_| {
                release_all(&[
                    Resource::BindGroup(uniforms_bind_group),
                    Resource::Buffer(uniforms_buffer),
                ])
            })?;
        let params_bind_group = device
            .create_bind_group(&label, object.material.params_layout(device), params_buffer)
            .inspect_err(|_| {
                release_all(&[
                    Resource::Buffer(params_buffer),
                    Resource::BindGroup(uniforms_bind_group),
                    Resource::Buffer(uniforms_buffer),
                ])
            })?;

        Ok(Self {
            uniforms_buffer,
            uniforms_bind_group,
            params_buffer,
            params_bind_group,
            params_schema: schema,
        })
    }

    fn release(&self, device: &dyn RenderDevice) {
        device.release(Resource::BindGroup(self.params_bind_group));
        device.release(Resource::Buffer(self.params_buffer));
        device.release(Resource::BindGroup(self.uniforms_bind_group));
        device.release(Resource::Buffer(self.uniforms_buffer));
    }
}

/// Per-frame renderer bound to one surface.
///
/// Objects are drawn in registration order. Meshes that are still loading
/// are requested in the background on `spawner` and drawn from the first
/// frame after they become resident. Only one renderer should be bound to
/// a given surface at a time.
pub struct FrameRenderer<D: RenderDevice + 'static> {
    device: Arc<D>,
    resize: ResizeSubscription,
    pending_size: Option<(u32, u32)>,
    spawner: Box<dyn Spawn>,
    format: TextureFormat,
    viewport: Viewport,
    camera: CameraState,
    pov_buffer: BufferHandle,
    pov_bind_group: BindGroupHandle,
    objects: Vec<RenderableObject>,
    resources: HashMap<ObjectId, ObjectResources>,
    requested: Vec<MeshAsset>,
    materials: Vec<Arc<dyn Material>>,
}

impl<D: RenderDevice + 'static> FrameRenderer<D> {
    pub fn new(
        device: Arc<D>,
        canvas: &Canvas,
        spawner: Box<dyn Spawn>,
    ) -> Result<Self, RenderError> {
        let (width, height) = canvas.size();
        let format = device.surface_format();
        device.configure_surface(width, height)?;
        let viewport = Viewport::new(&*device, width, height)?;

        let pov_buffer = device
            .create_uniform_buffer("pov", std::mem::size_of::<PovUniform>() as u64)
            .inspect_err(|_| viewport.release(&*device))?;
        let pov_bind_group = device
            .create_bind_group("pov", device.uniform_layout(), pov_buffer)
            .inspect_err(|_| {
                device.release(Resource::Buffer(pov_buffer));
                viewport.release(&*device);
            })?;

        let mut camera = CameraState::new();
        camera.update_projection(viewport.aspect());

        tracing::info!(
            surface = device.surface_id().0,
            width,
            height,
            ?format,
            "frame renderer ready"
        );

        Ok(Self {
            device,
            resize: canvas.subscribe(),
            pending_size: None,
            spawner,
            format,
            viewport,
            camera,
            pov_buffer,
            pov_bind_group,
            objects: Vec::new(),
            resources: HashMap::new(),
            requested: Vec::new(),
            materials: Vec::new(),
        })
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.device.surface_id()
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn objects(&self) -> &[RenderableObject] {
        &self.objects
    }

    /// Register an object. Its mesh is requested for this surface right
    /// away if it is not resident.
    pub fn add_object(&mut self, object: RenderableObject) -> Result<(), RenderError> {
        if self.objects.iter().any(|o| o.id == object.id) {
            return Err(RenderError::DuplicateObject(object.id));
        }
        self.request_mesh(&object.mesh);
        if !self
            .materials
            .iter()
            .any(|m| std::ptr::addr_eq(Arc::as_ptr(m), Arc::as_ptr(&object.material)))
        {
            self.materials.push(object.material.clone());
        }
        tracing::debug!(id = %object.id, mesh = object.mesh.url(), "object added");
        self.objects.push(object);
        Ok(())
    }

    /// Unregister an object and release its GPU resources. Returns whether
    /// the object was registered.
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.id != id);
        if let Some(resources) = self.resources.remove(&id) {
            resources.release(&*self.device);
        }
        let removed = self.objects.len() != before;
        if removed {
            tracing::debug!(%id, "object removed");
        }
        removed
    }

    pub fn set_world_matrix(&mut self, id: ObjectId, world_matrix: Mat4) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(object) => {
                object.world_matrix = world_matrix;
                true
            }
            None => false,
        }
    }

    pub fn set_params(&mut self, id: ObjectId, params: MaterialParams) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(object) => {
                object.params = params;
                true
            }
            None => false,
        }
    }

    /// Place the camera at `transform`, looking down its local -Z.
    pub fn set_perspective_pov(&mut self, transform: &Transform, config: PerspectiveConfig) {
        self.camera
            .set_perspective_pov(transform, config, self.viewport.aspect());
    }

    /// Compose and submit one frame.
    ///
    /// Per-object failures skip that object and are logged; the frame is
    /// still submitted. A lost surface ends draw assembly early, submits the
    /// draws already encoded and returns the error.
    pub fn render(&mut self) -> Result<FrameReport, RenderError> {
        let _span = tracing::info_span!("render_frame", objects = self.objects.len()).entered();

        self.apply_pending_resize()?;

        let device: &dyn RenderDevice = &*self.device;
        device.write_buffer(self.pov_buffer, bytemuck::bytes_of(&self.camera.pov_uniform()))?;

        let mut report = FrameReport::default();
        let mut failed = HashSet::new();
        for object in &self.objects {
            if let Err(err) = upload_object(device, &mut self.resources, object) {
                tracing::warn!(id = %object.id, %err, "object skipped");
                failed.insert(object.id);
            }
        }

        let surface = device.surface_id();
        let depth_target = self.viewport.depth_view();
        let clear_color = self.camera.clear_color();
        let mut aborted = None;
        for object in &self.objects {
            if failed.contains(&object.id) {
                report.failed += 1;
                continue;
            }
            let Some(mesh) = object.mesh.peek(surface) else {
                report.not_ready += 1;
                continue;
            };
            let Some(resources) = self.resources.get(&object.id) else {
                report.failed += 1;
                continue;
            };
            let pipeline = match object.material.pipeline(device, self.format) {
                Ok(pipeline) => pipeline,
                Err(err) => {
                    tracing::warn!(id = %object.id, material = object.material.label(), %err, "pipeline unavailable");
                    report.failed += 1;
                    continue;
                }
            };

            let first = !report.cleared;
            let draw = DrawCall {
                label: object.id.to_string(),
                pipeline,
                bind_groups: [
                    self.pov_bind_group,
                    resources.uniforms_bind_group,
                    resources.params_bind_group,
                ],
                vertex_buffer: mesh.vertex_buffer,
                vertex_count: mesh.vertex_count,
                depth_target,
                color_load: if first { LoadOp::Clear(clear_color) } else { LoadOp::Load },
                depth_load: if first { LoadOp::Clear(CLEAR_DEPTH) } else { LoadOp::Load },
            };
            match device.encode_draw(&draw) {
                Ok(()) => {
                    tracing::trace!(id = %object.id, vertices = mesh.vertex_count, first, "draw");
                    report.cleared = true;
                    report.drawn.push(object.id);
                }
                Err(err @ DeviceError::SurfaceUnavailable(_)) => {
                    tracing::warn!(%err, "surface unavailable, ending frame early");
                    aborted = Some(err);
                    break;
                }
                Err(err) => {
                    tracing::warn!(id = %object.id, %err, "draw failed");
                    report.failed += 1;
                }
            }
        }

        device.submit()?;
        if let Some(err) = aborted {
            return Err(err.into());
        }

        tracing::trace!(
            drawn = report.drawn.len(),
            not_ready = report.not_ready,
            failed = report.failed,
            "frame submitted"
        );
        Ok(report)
    }

    /// Apply the latest canvas size, if it changed since the last call.
    ///
    /// The depth target is recreated before the surface is reconfigured. A
    /// size that fails to apply stays pending and is retried on the next
    /// call, so the surface and depth target never stay mismatched.
    pub fn apply_pending_resize(&mut self) -> Result<(), RenderError> {
        if let Some(size) = self.resize.latest() {
            self.pending_size = Some(size);
        }
        let Some((width, height)) = self.pending_size else {
            return Ok(());
        };
        self.viewport.resize(&*self.device, width, height)?;
        self.device.configure_surface(width, height)?;
        self.pending_size = None;
        self.camera.update_projection(self.viewport.aspect());
        tracing::debug!(width, height, "canvas resized");
        Ok(())
    }

    fn request_mesh(&mut self, mesh: &MeshAsset) {
        if self.requested.iter().any(|m| m.ptr_eq(mesh)) {
            return;
        }
        self.requested.push(mesh.clone());
        if mesh.peek(self.device.surface_id()).is_some() {
            return;
        }

        let uploader: Arc<dyn MeshUploader> = self.device.clone();
        let pending = mesh.get(uploader);
        let url = mesh.url().to_string();
        let task = async move {
            match pending.await {
                Ok(mesh) => tracing::debug!(%url, vertices = mesh.vertex_count, "mesh resident"),
                Err(err) => tracing::warn!(%url, %err, "mesh unavailable"),
            }
        };
        if let Err(err) = self.spawner.spawn(task) {
            tracing::error!(url = mesh.url(), %err, "could not spawn mesh request");
        }
    }
}

impl<D: RenderDevice + 'static> Drop for FrameRenderer<D> {
    fn drop(&mut self) {
        let device: &dyn RenderDevice = &*self.device;
        for (_, resources) in self.resources.drain() {
            resources.release(device);
        }
        let surface = device.surface_id();
        for mesh in self.requested.drain(..) {
            if let Some(resident) = mesh.detach(surface) {
                device.release_vertex_buffer(resident.vertex_buffer);
            }
        }
        for material in self.materials.drain(..) {
            material.release_surface(device);
        }
        device.release(Resource::BindGroup(self.pov_bind_group));
        device.release(Resource::Buffer(self.pov_buffer));
        self.viewport.release(device);
        tracing::debug!(surface = surface.0, "frame renderer released");
    }
}

/// Write an object's uniforms and parameters, creating its resources on
/// first use.
fn upload_object(
    device: &dyn RenderDevice,
    cache: &mut HashMap<ObjectId, ObjectResources>,
    object: &RenderableObject,
) -> Result<(), RenderError> {
    let resources = match cache.entry(object.id) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            let resources = ObjectResources::create(device, object)?;
            tracing::debug!(id = %object.id, material = object.material.label(), "object resources created");
            entry.insert(resources)
        }
    };

    let uniforms = ObjectUniforms::new(object.world_matrix);
    device.write_buffer(resources.uniforms_buffer, bytemuck::bytes_of(&uniforms))?;

    let params = resources
        .params_schema
        .encode(&object.params)
        .map_err(|source| RenderError::Params {
            id: object.id,
            source,
        })?;
    device.write_buffer(resources.params_buffer, &params)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{ParamKind, ParamValue, ShaderMaterial};
    use crate::recording::{DeviceCommand, RecordingDevice};
    use descent_assets::{AssetError, MeshLoader, RawAttributes};
    use descent_common::Color;
    use futures::FutureExt;
    use futures::executor::LocalPool;
    use futures::future::BoxFuture;
    use glam::Vec3;

    struct StaticLoader;

    impl MeshLoader for StaticLoader {
        fn load(&self, _url: &str) -> BoxFuture<'static, Result<RawAttributes, AssetError>> {
            let raw = RawAttributes {
                positions: Some(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
                normals: Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
                texcoords: Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
            };
            futures::future::ready(Ok(raw)).boxed()
        }
    }

    struct NeverLoader;

    impl MeshLoader for NeverLoader {
        fn load(&self, _url: &str) -> BoxFuture<'static, Result<RawAttributes, AssetError>> {
            futures::future::pending().boxed()
        }
    }

    struct MissingLoader;

    impl MeshLoader for MissingLoader {
        fn load(&self, url: &str) -> BoxFuture<'static, Result<RawAttributes, AssetError>> {
            let err = AssetError::Load {
                url: url.to_string(),
                reason: "not found".into(),
            };
            futures::future::ready(Err(err)).boxed()
        }
    }

    struct Fixture {
        pool: LocalPool,
        device: Arc<RecordingDevice>,
        canvas: Canvas,
        renderer: FrameRenderer<RecordingDevice>,
        material: Arc<dyn Material>,
    }

    impl Fixture {
        fn new() -> Self {
            let pool = LocalPool::new();
            let device = Arc::new(RecordingDevice::new());
            let canvas = Canvas::new(800, 600);
            let renderer =
                FrameRenderer::new(device.clone(), &canvas, Box::new(pool.spawner())).unwrap();
            let material: Arc<dyn Material> = Arc::new(ShaderMaterial::new(
                "flat",
                "// test shader",
                ParamsSchema::new([("albedo", ParamKind::Vec3)]),
            ));
            Self {
                pool,
                device,
                canvas,
                renderer,
                material,
            }
        }

        fn object(&self, id: u64, mesh: &MeshAsset) -> RenderableObject {
            RenderableObject::new(
                ObjectId(id),
                mesh.clone(),
                self.material.clone(),
                MaterialParams::new().with("albedo", ParamValue::Vec3([1.0, 0.0, 0.0])),
            )
        }

        fn add(&mut self, id: u64, mesh: &MeshAsset) {
            let object = self.object(id, mesh);
            self.renderer.add_object(object).unwrap();
        }

        fn settle(&mut self) {
            self.pool.run_until_stalled();
        }
    }

    fn ready_mesh(url: &str) -> MeshAsset {
        MeshAsset::new(url, Arc::new(StaticLoader))
    }

    fn ids(values: &[u64]) -> Vec<ObjectId> {
        values.iter().copied().map(ObjectId).collect()
    }

    #[test]
    fn empty_frame_writes_camera_and_submits_without_drawing() {
        let mut fx = Fixture::new();
        let report = fx.renderer.render().unwrap();

        assert!(report.drawn.is_empty());
        assert!(!report.cleared);
        assert!(fx.device.draws().is_empty());
        assert_eq!(fx.device.submit_count(), 1);
        assert_eq!(fx.device.writes_to(fx.renderer.pov_buffer).len(), 1);
    }

    #[test]
    fn ready_objects_draw_in_registration_order() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        let stuck = MeshAsset::new("stuck.obj", Arc::new(NeverLoader));
        let cone = ready_mesh("cone.obj");
        fx.add(1, &cube);
        fx.add(2, &stuck);
        fx.add(3, &cube);
        fx.add(4, &cone);
        fx.settle();

        let report = fx.renderer.render().unwrap();
        assert_eq!(report.drawn, ids(&[1, 3, 4]));
        assert_eq!(report.not_ready, 1);
        assert!(report.cleared);

        let draws = fx.device.draws();
        let labels: Vec<&str> = draws.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["object#1", "object#3", "object#4"]);
        assert!(draws[0].color_load.is_clear());
        assert!(draws[0].depth_load.is_clear());
        assert!(draws[1..].iter().all(|d| !d.color_load.is_clear() && !d.depth_load.is_clear()));
        assert_eq!(draws[0].vertex_buffer, draws[1].vertex_buffer);
        assert_ne!(draws[0].vertex_buffer, draws[2].vertex_buffer);
    }

    #[test]
    fn objects_are_not_drawn_before_their_mesh_arrives() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);

        let report = fx.renderer.render().unwrap();
        assert!(report.drawn.is_empty());
        assert_eq!(report.not_ready, 1);

        fx.settle();
        let report = fx.renderer.render().unwrap();
        assert_eq!(report.drawn, ids(&[1]));
    }

    #[test]
    fn uniforms_are_written_before_the_first_draw() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        let stuck = MeshAsset::new("stuck.obj", Arc::new(NeverLoader));
        fx.add(1, &cube);
        fx.add(2, &stuck);
        fx.settle();
        fx.device.clear_commands();

        fx.renderer.render().unwrap();
        let commands = fx.device.commands();
        let first_draw = commands
            .iter()
            .position(|c| matches!(c, DeviceCommand::Draw(_)))
            .unwrap();
        let last_write = commands
            .iter()
            .rposition(|c| matches!(c, DeviceCommand::WriteBuffer { .. }))
            .unwrap();
        assert!(last_write < first_draw);
        assert!(matches!(
            &commands[0],
            DeviceCommand::WriteBuffer { buffer, .. } if *buffer == fx.renderer.pov_buffer
        ));

        // The not-ready object still had its uniforms uploaded.
        let pending = &fx.renderer.resources[&ObjectId(2)];
        let writes = fx.device.writes_to(pending.uniforms_buffer);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), std::mem::size_of::<ObjectUniforms>());
    }

    #[test]
    fn object_uniforms_track_world_matrix() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        fx.settle();
        fx.renderer.render().unwrap();

        let moved = Mat4::from_translation(Vec3::new(0.0, -4.0, 0.0));
        assert!(fx.renderer.set_world_matrix(ObjectId(1), moved));
        fx.renderer.render().unwrap();

        let buffer = fx.renderer.resources[&ObjectId(1)].uniforms_buffer;
        let writes = fx.device.writes_to(buffer);
        assert_eq!(writes.len(), 2);
        let uniforms: &ObjectUniforms = bytemuck::from_bytes(&writes[1]);
        assert_eq!(uniforms.model, moved.to_cols_array_2d());
    }

    #[test]
    fn resources_are_created_once_per_object() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        fx.add(2, &cube);
        fx.settle();
        fx.device.clear_commands();

        for _ in 0..3 {
            fx.renderer.render().unwrap();
        }
        let created = fx
            .device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::CreateUniformBuffer { .. }))
            .count();
        assert_eq!(created, 4);
    }

    #[test]
    fn removed_objects_are_not_drawn_and_release_resources() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        fx.add(2, &cube);
        fx.settle();
        fx.renderer.render().unwrap();

        let buffer = fx.renderer.resources[&ObjectId(1)].uniforms_buffer;
        assert!(fx.renderer.remove_object(ObjectId(1)));
        assert!(!fx.renderer.remove_object(ObjectId(1)));
        assert!(!fx.device.is_live(Resource::Buffer(buffer)));

        fx.device.clear_commands();
        let report = fx.renderer.render().unwrap();
        assert_eq!(report.drawn, ids(&[2]));
        assert!(fx.device.draws()[0].color_load.is_clear());
    }

    #[test]
    fn add_then_remove_before_render_draws_nothing() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(7, &cube);
        fx.settle();
        fx.renderer.remove_object(ObjectId(7));

        let report = fx.renderer.render().unwrap();
        assert!(report.drawn.is_empty());
        assert!(fx.device.draws().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        let again = fx.object(1, &cube);
        assert!(matches!(
            fx.renderer.add_object(again),
            Err(RenderError::DuplicateObject(ObjectId(1)))
        ));
        assert_eq!(fx.renderer.objects().len(), 1);
    }

    #[test]
    fn device_error_skips_only_the_affected_object() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        fx.add(2, &cube);
        fx.settle();

        fx.device.fail_next_uniform_buffers(1);
        let report = fx.renderer.render().unwrap();
        assert_eq!(report.drawn, ids(&[2]));
        assert_eq!(report.failed, 1);
        assert!(fx.device.draws()[0].color_load.is_clear());

        let report = fx.renderer.render().unwrap();
        assert_eq!(report.drawn, ids(&[1, 2]));
    }

    #[test]
    fn mismatched_params_skip_the_object() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        let mut wrong = fx.object(2, &cube);
        wrong.params = MaterialParams::new().with("albedo", ParamValue::F32(1.0));
        fx.renderer.add_object(wrong).unwrap();
        fx.settle();

        let report = fx.renderer.render().unwrap();
        assert_eq!(report.drawn, ids(&[1]));
        assert_eq!(report.failed, 1);

        assert!(fx.renderer.set_params(
            ObjectId(2),
            MaterialParams::new().with("albedo", ParamValue::Vec3([0.0, 1.0, 0.0]))
        ));
        let report = fx.renderer.render().unwrap();
        assert_eq!(report.drawn, ids(&[1, 2]));
    }

    #[test]
    fn failed_mesh_load_never_draws() {
        let mut fx = Fixture::new();
        let missing = MeshAsset::new("missing.obj", Arc::new(MissingLoader));
        fx.add(1, &missing);
        fx.settle();

        let report = fx.renderer.render().unwrap();
        assert!(report.drawn.is_empty());
        assert_eq!(report.not_ready, 1);
    }

    #[test]
    fn resize_updates_projection_and_depth_target() {
        let mut fx = Fixture::new();
        let old_depth = fx.renderer.viewport().depth_view();

        fx.canvas.resize(1000, 500);
        fx.canvas.resize(1600, 800);
        fx.renderer.render().unwrap();

        assert_eq!(fx.renderer.viewport().size(), (1600, 800));
        assert!(!fx.device.is_live(Resource::Texture(old_depth)));
        let projection = fx.renderer.camera().projection;
        assert!((projection.y_axis.y / projection.x_axis.x - 2.0).abs() < 1e-4);

        let commands = fx.device.commands();
        assert!(commands.contains(&DeviceCommand::ConfigureSurface {
            width: 1600,
            height: 800
        }));
        let depth_textures = commands
            .iter()
            .filter(|c| matches!(c, DeviceCommand::CreateDepthTexture { .. }))
            .count();
        assert_eq!(depth_textures, 2);
    }

    #[test]
    fn failed_resize_keeps_surface_and_depth_in_step() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        fx.settle();

        fx.device.fail_next_depth_textures(1);
        fx.canvas.resize(1024, 768);
        assert!(matches!(
            fx.renderer.render(),
            Err(RenderError::Device(DeviceError::OutOfMemory(_)))
        ));
        assert_eq!(fx.renderer.viewport().size(), (800, 600));
        assert_eq!(fx.device.surface_size(), Some((800, 600)));
        assert!(fx.device.draws().is_empty());

        // The size stays pending and lands on the next frame.
        assert_eq!(fx.renderer.render().unwrap().drawn, ids(&[1]));
        assert_eq!(fx.renderer.viewport().size(), (1024, 768));
        assert_eq!(fx.device.surface_size(), Some((1024, 768)));
    }

    #[test]
    fn camera_pov_is_uploaded_each_frame() {
        let mut fx = Fixture::new();
        let config = PerspectiveConfig {
            fov: Some(60.0),
            clear_color: Some(Color::rgb(0.1, 0.2, 0.3)),
            ..PerspectiveConfig::default()
        };
        fx.renderer
            .set_perspective_pov(&Transform::from_position(Vec3::new(0.0, 2.0, 5.0)), config);
        fx.renderer.render().unwrap();

        let writes = fx.device.writes_to(fx.renderer.pov_buffer);
        let pov: &PovUniform = bytemuck::from_bytes(&writes[0]);
        assert_eq!(
            pov.view_proj,
            fx.renderer.camera().view_projection().to_cols_array_2d()
        );

        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        fx.settle();
        fx.renderer.render().unwrap();
        assert_eq!(
            fx.device.draws()[0].color_load,
            LoadOp::Clear(Color::rgb(0.1, 0.2, 0.3))
        );
    }

    #[test]
    fn lost_surface_submits_and_reports() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        fx.settle();

        fx.device.set_surface_lost(true);
        let result = fx.renderer.render();
        assert!(matches!(
            result,
            Err(RenderError::Device(DeviceError::SurfaceUnavailable(_)))
        ));
        assert_eq!(fx.device.submit_count(), 1);

        fx.device.set_surface_lost(false);
        assert_eq!(fx.renderer.render().unwrap().drawn, ids(&[1]));
    }

    #[test]
    fn drop_releases_everything() {
        let mut fx = Fixture::new();
        let cube = ready_mesh("cube.obj");
        fx.add(1, &cube);
        fx.add(2, &ready_mesh("cone.obj"));
        fx.settle();
        fx.renderer.render().unwrap();
        assert_eq!(fx.canvas.subscriber_count(), 1);

        let Fixture {
            device,
            canvas,
            renderer,
            ..
        } = fx;
        let surface = renderer.surface_id();
        drop(renderer);

        assert_eq!(canvas.subscriber_count(), 0);
        assert_eq!(device.live_resources(), 0);
        assert!(cube.peek(surface).is_none());
        let pipelines_released = device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Release(Resource::Pipeline(_))))
            .count();
        assert_eq!(pipelines_released, 1);
    }
}
