use descent_common::Color;
use descent_render::{LoadOp, TextureFormat, VertexFormat};

pub(crate) fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

/// The renderer-side color format for a surface format, if supported.
pub(crate) fn surface_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    match format {
        wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
        _ => None,
    }
}

pub(crate) fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

pub(crate) fn color_load(op: LoadOp<Color>) -> wgpu::LoadOp<wgpu::Color> {
    match op {
        LoadOp::Clear(c) => wgpu::LoadOp::Clear(wgpu::Color {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }),
        LoadOp::Load => wgpu::LoadOp::Load,
    }
}

pub(crate) fn depth_load(op: LoadOp<f32>) -> wgpu::LoadOp<f32> {
    match op {
        LoadOp::Clear(depth) => wgpu::LoadOp::Clear(depth),
        LoadOp::Load => wgpu::LoadOp::Load,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_formats_round_trip_through_surface_negotiation() {
        for format in [
            TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb,
        ] {
            assert_eq!(surface_format(texture_format(format)), Some(format));
        }
        assert_eq!(surface_format(wgpu::TextureFormat::Rgba16Float), None);
    }

    #[test]
    fn depth_is_never_a_surface_format() {
        assert_eq!(surface_format(texture_format(TextureFormat::Depth32Float)), None);
    }

    #[test]
    fn load_ops_carry_clear_values() {
        assert_eq!(
            color_load(LoadOp::Clear(Color::rgb(0.5, 0.25, 0.0))),
            wgpu::LoadOp::Clear(wgpu::Color {
                r: 0.5,
                g: 0.25,
                b: 0.0,
                a: 1.0
            })
        );
        assert_eq!(depth_load(LoadOp::Load), wgpu::LoadOp::Load);
    }
}
