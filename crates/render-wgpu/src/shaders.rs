/// WGSL shader for lit, single-color meshes.
///
/// Group 0 holds the camera, group 1 the object transforms and group 2 the
/// material parameters, matching the frame renderer's bind group order.
pub const LIT_SHADER: &str = r#"
struct Pov {
    view_proj: mat4x4<f32>,
};

struct ObjectUniforms {
    model: mat4x4<f32>,
    normal_model: mat4x4<f32>,
};

struct LitParams {
    albedo: vec3<f32>,
};

@group(0) @binding(0)
var<uniform> pov: Pov;

@group(1) @binding(0)
var<uniform> transforms: ObjectUniforms;

@group(2) @binding(0)
var<uniform> params: LitParams;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world_pos = transforms.model * vec4<f32>(vertex.position, 1.0);
    let world_normal = (transforms.normal_model * vec4<f32>(vertex.normal, 0.0)).xyz;

    var out: VertexOutput;
    out.clip_position = pov.view_proj * world_pos;
    out.world_normal = normalize(world_normal);
    out.uv = vertex.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.3, 1.0, 0.5));
    let ambient = 0.3;
    let diffuse = max(dot(normalize(in.world_normal), light_dir), 0.0);
    // Darken toward the mesh's far edge so long shafts read as depth.
    let shade = mix(1.0, 0.8, clamp(in.uv.y, 0.0, 1.0));
    let lighting = (ambient + diffuse * 0.7) * shade;
    return vec4<f32>(params.albedo * lighting, 1.0);
}
"#;
