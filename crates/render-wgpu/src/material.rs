use descent_render::{MaterialParams, ParamKind, ParamValue, ParamsSchema, ShaderMaterial};

use crate::shaders;

/// Name of the single parameter of [`lit_material`].
pub const ALBEDO: &str = "albedo";

/// Diffuse-lit material with a flat albedo color.
pub fn lit_material() -> ShaderMaterial {
    ShaderMaterial::new(
        "lit",
        shaders::LIT_SHADER,
        ParamsSchema::new([(ALBEDO, ParamKind::Vec3)]),
    )
}

pub fn lit_params(albedo: [f32; 3]) -> MaterialParams {
    MaterialParams::new().with(ALBEDO, ParamValue::Vec3(albedo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use descent_render::Material;

    #[test]
    fn lit_params_match_schema() {
        let material = lit_material();
        let bytes = material
            .params_schema()
            .encode(&lit_params([0.2, 0.4, 0.6]))
            .unwrap();
        assert_eq!(bytes.len(), 16);
        let floats: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(&floats[..3], &[0.2, 0.4, 0.6]);
    }

    #[test]
    fn shader_declares_expected_entry_points() {
        assert!(shaders::LIT_SHADER.contains(&format!("fn {}", ShaderMaterial::VERTEX_ENTRY)));
        assert!(shaders::LIT_SHADER.contains(&format!("fn {}", ShaderMaterial::FRAGMENT_ENTRY)));
        assert!(shaders::LIT_SHADER.contains("@group(2) @binding(0)"));
    }
}
