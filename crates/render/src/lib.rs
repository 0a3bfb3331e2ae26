//! Frame renderer: per-object GPU resources, camera state and the ordered
//! draw sequence that composes one frame.
//!
//! # Invariants
//! - The camera uniform is written before any per-object work, and every
//!   object's uniforms are written before the first draw of the frame.
//! - The first draw emitted in a frame clears color and depth; later draws
//!   load them.
//! - Objects whose mesh is not resident on this surface are skipped, never
//!   waited on.
//!
//! The renderer talks to the GPU only through [`RenderDevice`]. The wgpu
//! backend lives in `descent-render-wgpu`; [`RecordingDevice`] stands in
//! wherever no adapter is available.

mod camera;
mod canvas;
mod device;
mod material;
mod recording;
mod renderer;
mod viewport;

pub use camera::{
    CameraState, DEFAULT_FAR, DEFAULT_FOV_DEGREES, DEFAULT_NEAR, ObjectUniforms,
    PerspectiveConfig, PovUniform, normal_model,
};
pub use canvas::{Canvas, ResizeSubscription};
pub use device::{
    DrawCall, LoadOp, PipelineDesc, RenderDevice, Resource, TextureFormat, VertexAttribute,
    VertexFormat, VertexLayout,
};
pub use material::{
    Material, MaterialParams, ParamField, ParamKind, ParamValue, ParamsError, ParamsSchema,
    ShaderMaterial,
};
pub use recording::{DeviceCommand, RecordingDevice};
pub use renderer::{FrameRenderer, FrameReport, RenderError, RenderableObject};
pub use viewport::Viewport;

pub fn crate_info() -> &'static str {
    "descent-render v0.1.0"
}
