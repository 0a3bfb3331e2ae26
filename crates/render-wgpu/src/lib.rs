//! wgpu backend for the descent frame renderer.
//!
//! [`WgpuDevice`] implements [`descent_render::RenderDevice`] over one
//! presentation surface. Resources live in handle tables; each draw is
//! encoded as its own render pass against the frame's surface texture.
//!
//! # Invariants
//! - The surface texture is acquired on the first draw of a frame and
//!   presented on submit; a frame with no draws presents nothing.
//! - Resource creation errors are captured with error scopes and reported
//!   as `DeviceError`s instead of panicking the device.

mod convert;
mod device;
mod material;
mod shaders;

pub use device::{SetupError, WgpuDevice};
pub use material::{ALBEDO, lit_material, lit_params};
pub use shaders::LIT_SHADER;

pub fn crate_info() -> &'static str {
    "descent-render-wgpu v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("wgpu"));
    }
}
