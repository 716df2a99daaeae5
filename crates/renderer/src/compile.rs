//! GLSL sources for every pipeline plus the compile step that turns them into
//! `wgpu` shader modules.
//!
//! All programs go through naga's GLSL frontend. Compilation runs inside a
//! validation error scope so a broken shader surfaces as
//! [`RenderError::ShaderCompilation`] during construction instead of a panic
//! on the first draw.

use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::error::RenderError;

/// A linked vertex + fragment program, kept as source until a device exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgram {
    pub label: &'static str,
    pub vertex: &'static str,
    pub fragment: &'static str,
}

/// Portal surface: MVP vertex transform and the noise-driven fragment.
pub const PORTAL_PROGRAM: ShaderProgram = ShaderProgram {
    label: "portal",
    vertex: PORTAL_VERTEX_GLSL,
    fragment: PORTAL_FRAGMENT_GLSL,
};

/// Luminosity high-pass feeding the bloom mip chain.
pub const BLOOM_HIGH_PASS_PROGRAM: ShaderProgram = ShaderProgram {
    label: "bloom high pass",
    vertex: FULLSCREEN_VERTEX_GLSL,
    fragment: BLOOM_HIGH_PASS_GLSL,
};

/// One direction of the separable Gaussian blur.
pub const BLOOM_BLUR_PROGRAM: ShaderProgram = ShaderProgram {
    label: "bloom blur",
    vertex: FULLSCREEN_VERTEX_GLSL,
    fragment: BLOOM_BLUR_GLSL,
};

/// Adds the weighted mip chain back onto the scene and writes the surface.
pub const BLOOM_COMPOSITE_PROGRAM: ShaderProgram = ShaderProgram {
    label: "bloom composite",
    vertex: FULLSCREEN_VERTEX_GLSL,
    fragment: BLOOM_COMPOSITE_GLSL,
};

/// Both stages of a [`ShaderProgram`] compiled for one device.
pub(crate) struct CompiledProgram {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

pub(crate) fn compile_program(
    device: &wgpu::Device,
    program: &ShaderProgram,
) -> Result<CompiledProgram, RenderError> {
    let vertex = compile_stage(device, program.label, program.vertex, ShaderStage::Vertex)?;
    let fragment = compile_stage(
        device,
        program.label,
        program.fragment,
        ShaderStage::Fragment,
    )?;
    tracing::debug!(program = program.label, "compiled shader program");
    Ok(CompiledProgram { vertex, fragment })
}

fn compile_stage(
    device: &wgpu::Device,
    label: &str,
    source: &'static str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(RenderError::ShaderCompilation {
            program: label.to_string(),
            stage: stage_name(stage),
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}

fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        _ => "compute",
    }
}

/// Uniform block shared by both portal stages. Must match `PortalUniforms` in
/// `gpu/uniforms.rs`.
const PORTAL_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec3 position;
layout(location = 1) in vec2 uv;

layout(location = 0) out vec2 vUv;
layout(location = 1) out vec3 vPosition;

layout(std140, set = 0, binding = 0) uniform PortalParams {
    mat4 projection;
    mat4 view;
    mat4 model;
    float time;
} params;

void main() {
    vUv = uv;
    vPosition = position;
    gl_Position = params.projection * params.view * params.model * vec4(position, 1.0);
}
";

const PORTAL_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 vUv;
layout(location = 1) in vec3 vPosition;

layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform PortalParams {
    mat4 projection;
    mat4 view;
    mat4 model;
    float time;
} params;

const float K1 = 0.366025404;
const float K2 = 0.211324865;

vec2 hash2(vec2 p) {
    vec2 q = vec2(dot(p, vec2(127.1, 311.7)), dot(p, vec2(269.5, 183.3)));
    return vec2(-1.0) + 2.0 * fract(sin(q) * 43758.5453123);
}

float noise(vec2 p) {
    vec2 i = floor(p + vec2((p.x + p.y) * K1));
    vec2 a = p - i + vec2((i.x + i.y) * K2);
    vec2 o = vec2(0.0, 1.0);
    if (a.x > a.y) {
        o = vec2(1.0, 0.0);
    }
    vec2 b = a - o + vec2(K2);
    vec2 c = a - vec2(1.0) + vec2(2.0 * K2);

    vec3 h = max(vec3(0.5) - vec3(dot(a, a), dot(b, b), dot(c, c)), vec3(0.0));
    vec3 n = h * h * h * h * vec3(dot(a, hash2(i)), dot(b, hash2(i + o)), dot(c, hash2(i + vec2(1.0))));

    return dot(n, vec3(70.0));
}

void main() {
    float t = params.time;
    vec2 uv = vUv - vec2(0.5);

    float distortion = noise(uv * 3.0 + vec2(t * 0.2)) * 0.2;
    uv += vec2(distortion);

    float radius = length(uv);

    vec3 baseColor = vec3(0.3, 0.0, 0.3);
    float noiseValue = noise(uv * 5.0 + vec2(t * 0.3)) * 0.5 + 0.5;
    float circle = smoothstep(0.5 + distortion, 0.48 + distortion, radius);
    float pulse = sin(t * 2.0) * 0.05 + 0.95;

    vec3 color = mix(baseColor, baseColor * 3.0, vec3(noiseValue * pulse));
    color += vec3(0.1, 0.0, 0.2) * noise(uv * 8.0 + vec2(t * 0.5));
    color *= circle;

    outColor = vec4(color, circle);
}
";

/// Full-screen triangle; `v_uv` follows wgpu's top-left texture origin.
const FULLSCREEN_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

void main() {
    int index = int(gl_VertexIndex);
    vec2 corner = vec2(float((index << 1) & 2), float(index & 2));
    vec2 pos = corner * 2.0 - vec2(1.0);
    v_uv = vec2(corner.x, 1.0 - corner.y);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Block shared by all bloom passes. Must match `BloomUniforms` in
/// `gpu/uniforms.rs`.
const BLOOM_HIGH_PASS_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform BloomParams {
    vec2 texel_size;
    vec2 direction;
    float threshold;
    float smooth_width;
    float kernel_radius;
    float sigma;
    float strength;
    float radius;
} params;

layout(set = 0, binding = 1) uniform texture2D source_texture;
layout(set = 0, binding = 2) uniform sampler source_sampler;

void main() {
    vec4 texel = textureLod(sampler2D(source_texture, source_sampler), v_uv, 0.0);
    float luma = dot(texel.rgb, vec3(0.299, 0.587, 0.114));
    float weight = smoothstep(params.threshold, params.threshold + params.smooth_width, luma);
    outColor = mix(vec4(0.0), texel, vec4(weight));
}
";

const BLOOM_BLUR_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform BloomParams {
    vec2 texel_size;
    vec2 direction;
    float threshold;
    float smooth_width;
    float kernel_radius;
    float sigma;
    float strength;
    float radius;
} params;

layout(set = 0, binding = 1) uniform texture2D source_texture;
layout(set = 0, binding = 2) uniform sampler source_sampler;

float gaussian(float x, float sigma) {
    return 0.39894 * exp(-0.5 * x * x / (sigma * sigma)) / sigma;
}

void main() {
    float weight_sum = gaussian(0.0, params.sigma);
    vec3 sum = textureLod(sampler2D(source_texture, source_sampler), v_uv, 0.0).rgb * weight_sum;
    int kernel = int(params.kernel_radius);
    for (int i = 1; i < kernel; i++) {
        float x = float(i);
        float w = gaussian(x, params.sigma);
        vec2 offset = params.direction * params.texel_size * x;
        vec3 a = textureLod(sampler2D(source_texture, source_sampler), v_uv + offset, 0.0).rgb;
        vec3 b = textureLod(sampler2D(source_texture, source_sampler), v_uv - offset, 0.0).rgb;
        sum += (a + b) * w;
        weight_sum += 2.0 * w;
    }
    outColor = vec4(sum / weight_sum, 1.0);
}
";

const BLOOM_COMPOSITE_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform BloomParams {
    vec2 texel_size;
    vec2 direction;
    float threshold;
    float smooth_width;
    float kernel_radius;
    float sigma;
    float strength;
    float radius;
} params;

layout(set = 0, binding = 1) uniform texture2D scene_texture;
layout(set = 0, binding = 2) uniform sampler source_sampler;
layout(set = 0, binding = 3) uniform texture2D bloom_mip0;
layout(set = 0, binding = 4) uniform texture2D bloom_mip1;
layout(set = 0, binding = 5) uniform texture2D bloom_mip2;
layout(set = 0, binding = 6) uniform texture2D bloom_mip3;
layout(set = 0, binding = 7) uniform texture2D bloom_mip4;

float level_factor(float factor) {
    return mix(factor, 1.2 - factor, params.radius);
}

void main() {
    vec4 scene = textureLod(sampler2D(scene_texture, source_sampler), v_uv, 0.0);
    vec3 bloom = level_factor(1.0) * textureLod(sampler2D(bloom_mip0, source_sampler), v_uv, 0.0).rgb
        + level_factor(0.8) * textureLod(sampler2D(bloom_mip1, source_sampler), v_uv, 0.0).rgb
        + level_factor(0.6) * textureLod(sampler2D(bloom_mip2, source_sampler), v_uv, 0.0).rgb
        + level_factor(0.4) * textureLod(sampler2D(bloom_mip3, source_sampler), v_uv, 0.0).rgb
        + level_factor(0.2) * textureLod(sampler2D(bloom_mip4, source_sampler), v_uv, 0.0).rgb;
    outColor = vec4(scene.rgb + params.strength * bloom, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::naga;

    fn validate(source: &str, stage: ShaderStage) {
        let mut frontend = naga::front::glsl::Frontend::default();
        let module = frontend
            .parse(&naga::front::glsl::Options::from(stage), source)
            .unwrap_or_else(|err| panic!("GLSL parse failed: {err:?}"));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("validation failed: {err:?}"));
    }

    #[test]
    fn every_program_passes_naga_validation() {
        for program in [
            PORTAL_PROGRAM,
            BLOOM_HIGH_PASS_PROGRAM,
            BLOOM_BLUR_PROGRAM,
            BLOOM_COMPOSITE_PROGRAM,
        ] {
            validate(program.vertex, ShaderStage::Vertex);
            validate(program.fragment, ShaderStage::Fragment);
        }
    }

    #[test]
    fn portal_fragment_uses_the_cpu_constants() {
        let source = PORTAL_PROGRAM.fragment;
        assert!(source.contains("0.366025404"));
        assert!(source.contains("0.211324865"));
        assert!(source.contains("vec2(127.1, 311.7)"));
        assert!(source.contains("vec2(269.5, 183.3)"));
        assert!(source.contains("43758.5453123"));
        assert!(source.contains("smoothstep(0.5 + distortion, 0.48 + distortion, radius)"));
    }

    #[test]
    fn programs_target_glsl_450() {
        for source in [
            PORTAL_VERTEX_GLSL,
            PORTAL_FRAGMENT_GLSL,
            FULLSCREEN_VERTEX_GLSL,
            BLOOM_HIGH_PASS_GLSL,
            BLOOM_BLUR_GLSL,
            BLOOM_COMPOSITE_GLSL,
        ] {
            assert!(source.starts_with("#version 450"));
        }
    }
}
