use descent_common::{DeviceError, TextureHandle};

use crate::device::{RenderDevice, Resource, TextureFormat};

/// Depth target sized to the canvas.
#[derive(Debug)]
pub struct Viewport {
    depth: TextureHandle,
    width: u32,
    height: u32,
}

impl Viewport {
    pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

    pub fn new(device: &dyn RenderDevice, width: u32, height: u32) -> Result<Self, DeviceError> {
        let depth = Self::create_depth(device, width, height)?;
        Ok(Self {
            depth,
            width,
            height,
        })
    }

    /// Recreate the depth target at a new size. On failure the previous
    /// target stays in place.
    pub fn resize(
        &mut self,
        device: &dyn RenderDevice,
        width: u32,
        height: u32,
    ) -> Result<(), DeviceError> {
        let depth = Self::create_depth(device, width, height)?;
        device.release(Resource::Texture(self.depth));
        self.depth = depth;
        self.width = width;
        self.height = height;
        tracing::debug!(width, height, "viewport resized");
        Ok(())
    }

    pub fn depth_view(&self) -> TextureHandle {
        self.depth
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn release(&self, device: &dyn RenderDevice) {
        device.release(Resource::Texture(self.depth));
    }

    fn create_depth(
        device: &dyn RenderDevice,
        width: u32,
        height: u32,
    ) -> Result<TextureHandle, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::ZeroSized { width, height });
        }
        device.create_depth_texture(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingDevice;

    #[test]
    fn resize_recreates_depth_target() {
        let device = RecordingDevice::new();
        let mut viewport = Viewport::new(&device, 640, 480).unwrap();
        let old = viewport.depth_view();

        viewport.resize(&device, 1280, 720).unwrap();
        assert_ne!(viewport.depth_view(), old);
        assert_eq!(viewport.size(), (1280, 720));
        assert!(!device.is_live(Resource::Texture(old)));
        assert!(device.is_live(Resource::Texture(viewport.depth_view())));
    }

    #[test]
    fn zero_size_is_rejected_and_keeps_previous_target() {
        let device = RecordingDevice::new();
        assert!(matches!(
            Viewport::new(&device, 0, 0),
            Err(DeviceError::ZeroSized { .. })
        ));

        let mut viewport = Viewport::new(&device, 64, 64).unwrap();
        let before = viewport.depth_view();
        assert!(viewport.resize(&device, 64, 0).is_err());
        assert_eq!(viewport.depth_view(), before);
        assert_eq!(viewport.size(), (64, 64));
        assert!(device.is_live(Resource::Texture(before)));
    }
}
