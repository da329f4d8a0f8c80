//! GLSL sources for the full-screen passes and their compilation.

use std::borrow::Cow;
use std::fmt;

use wgpu::naga::ShaderStage;

use crate::error::FluidError;
use crate::types::FilterStrategy;

/// The fragment programs that make up one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    Clear,
    Display,
    Splat,
    Advection,
    Divergence,
    Curl,
    Vorticity,
    Pressure,
    GradientSubtract,
}

impl Program {
    pub const ALL: [Program; 9] = [
        Program::Clear,
        Program::Display,
        Program::Splat,
        Program::Advection,
        Program::Divergence,
        Program::Curl,
        Program::Vorticity,
        Program::Pressure,
        Program::GradientSubtract,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Program::Clear => "clear",
            Program::Display => "display",
            Program::Splat => "splat",
            Program::Advection => "advection",
            Program::Divergence => "divergence",
            Program::Curl => "curl",
            Program::Vorticity => "vorticity",
            Program::Pressure => "pressure",
            Program::GradientSubtract => "gradient subtract",
        }
    }

    /// Texture names bound by the program, in binding order.
    pub fn inputs(self) -> &'static [&'static str] {
        match self {
            Program::Clear | Program::Display => &["uTexture"],
            Program::Splat => &["uTarget"],
            Program::Advection => &["uVelocity", "uSource"],
            Program::Divergence | Program::Curl => &["uVelocity"],
            Program::Vorticity => &["uVelocity", "uCurl"],
            Program::Pressure => &["uPressure", "uDivergence"],
            Program::GradientSubtract => &["uPressure", "uVelocity"],
        }
    }

    fn body(self) -> &'static str {
        match self {
            Program::Clear => CLEAR_GLSL,
            Program::Display => DISPLAY_GLSL,
            Program::Splat => SPLAT_GLSL,
            Program::Advection => ADVECTION_GLSL,
            Program::Divergence => DIVERGENCE_GLSL,
            Program::Curl => CURL_GLSL,
            Program::Vorticity => VORTICITY_GLSL,
            Program::Pressure => PRESSURE_GLSL,
            Program::GradientSubtract => GRADIENT_SUBTRACT_GLSL,
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compiles the shared full-screen triangle vertex stage.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule, FluidError> {
    let source = format!("{VERSION}{PARAMS_GLSL}{VERTEX_GLSL}");
    compile(device, "inkflow vertex", source, ShaderStage::Vertex, "vertex")
}

/// Compiles one pass program for the given filtering path.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    program: Program,
    filter: FilterStrategy,
) -> Result<wgpu::ShaderModule, FluidError> {
    let source = fragment_source(program, filter);
    let label = format!("inkflow {program} fragment");
    compile(device, &label, source, ShaderStage::Fragment, program.name())
}

/// Assembles the complete fragment source for `program`.
pub(crate) fn fragment_source(program: Program, filter: FilterStrategy) -> String {
    let mut source = String::from(VERSION);
    if filter == FilterStrategy::Manual {
        source.push_str("#define MANUAL_FILTERING 1\n");
    }
    source.push_str(PARAMS_GLSL);
    source.push_str(FRAGMENT_IO_GLSL);
    for (slot, name) in program.inputs().iter().enumerate() {
        source.push_str(&format!(
            "layout(set = 1, binding = {texture}) uniform texture2D inkflow_texture{slot};\n\
             layout(set = 1, binding = {sampler}) uniform sampler inkflow_sampler{slot};\n\
             #define {name} sampler2D(inkflow_texture{slot}, inkflow_sampler{slot})\n",
            texture = slot * 2,
            sampler = slot * 2 + 1,
        ));
    }
    source.push_str(program.body());
    source
}

fn compile(
    device: &wgpu::Device,
    label: &str,
    source: String,
    stage: ShaderStage,
    program: &'static str,
) -> Result<wgpu::ShaderModule, FluidError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source),
            stage,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(module),
        Some(err) => {
            let diagnostic = err.to_string();
            tracing::error!(program, %diagnostic, "shader build failed");
            Err(FluidError::ShaderBuild {
                program,
                diagnostic,
            })
        }
    }
}

const VERSION: &str = "#version 450\n";

/// Uniform block shared by every stage; mirrors `PassUniforms`.
const PARAMS_GLSL: &str = r"
layout(std140, set = 0, binding = 0) uniform PassParams {
    vec2 texelSize;
    vec2 sourceTexelSize;
    vec4 color;
    vec2 point;
    float aspectRatio;
    float radius;
    float dt;
    float dissipation;
    float curl;
    float value;
    float transparent;
    float premultiply;
    float _pad0;
    float _pad1;
} params;
";

/// Full-screen triangle emitting texture-space coordinates with row 0 at the
/// top, plus the four neighbour coordinates one texel away.
const VERTEX_GLSL: &str = r"
layout(location = 0) out vec2 vUv;
layout(location = 1) out vec2 vL;
layout(location = 2) out vec2 vR;
layout(location = 3) out vec2 vT;
layout(location = 4) out vec2 vB;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    vUv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    vL = vUv - vec2(params.texelSize.x, 0.0);
    vR = vUv + vec2(params.texelSize.x, 0.0);
    vT = vUv + vec2(0.0, params.texelSize.y);
    vB = vUv - vec2(0.0, params.texelSize.y);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

const FRAGMENT_IO_GLSL: &str = r"
layout(location = 0) in vec2 vUv;
layout(location = 1) in vec2 vL;
layout(location = 2) in vec2 vR;
layout(location = 3) in vec2 vT;
layout(location = 4) in vec2 vB;
layout(location = 0) out vec4 outColor;
";

const CLEAR_GLSL: &str = r"
void main() {
    outColor = params.value * texture(uTexture, vUv);
}
";

const DISPLAY_GLSL: &str = r"
void main() {
    vec3 c = texture(uTexture, vUv).rgb;
    float alpha = 1.0;
    if (params.transparent > 0.5) {
        alpha = max(c.r, max(c.g, c.b));
    }
    vec3 rgb = c + params.color.rgb;
    if (params.premultiply > 0.5) {
        rgb *= alpha;
    }
    outColor = vec4(rgb, alpha);
}
";

const SPLAT_GLSL: &str = r"
void main() {
    vec2 p = vUv - params.point;
    p.x *= params.aspectRatio;
    vec3 splat = exp(-dot(p, p) / params.radius) * params.color.rgb;
    vec3 base = texture(uTarget, vUv).xyz;
    outColor = vec4(base + splat, 1.0);
}
";

const ADVECTION_GLSL: &str = r"
#ifdef MANUAL_FILTERING
vec4 sampleVelocity(vec2 uv) {
    vec2 tsize = params.texelSize;
    vec2 st = uv / tsize - 0.5;
    vec2 iuv = floor(st);
    vec2 fuv = fract(st);
    vec4 a = texture(uVelocity, (iuv + vec2(0.5, 0.5)) * tsize);
    vec4 b = texture(uVelocity, (iuv + vec2(1.5, 0.5)) * tsize);
    vec4 c = texture(uVelocity, (iuv + vec2(0.5, 1.5)) * tsize);
    vec4 d = texture(uVelocity, (iuv + vec2(1.5, 1.5)) * tsize);
    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}

vec4 sampleSource(vec2 uv) {
    vec2 tsize = params.sourceTexelSize;
    vec2 st = uv / tsize - 0.5;
    vec2 iuv = floor(st);
    vec2 fuv = fract(st);
    vec4 a = texture(uSource, (iuv + vec2(0.5, 0.5)) * tsize);
    vec4 b = texture(uSource, (iuv + vec2(1.5, 0.5)) * tsize);
    vec4 c = texture(uSource, (iuv + vec2(0.5, 1.5)) * tsize);
    vec4 d = texture(uSource, (iuv + vec2(1.5, 1.5)) * tsize);
    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}
#else
vec4 sampleVelocity(vec2 uv) {
    return texture(uVelocity, uv);
}

vec4 sampleSource(vec2 uv) {
    return texture(uSource, uv);
}
#endif

void main() {
    vec2 coord = vUv - params.dt * sampleVelocity(vUv).xy * params.texelSize;
    vec4 result = sampleSource(coord);
    float decay = 1.0 + params.dissipation * params.dt;
    outColor = result / decay;
}
";

const DIVERGENCE_GLSL: &str = r"
void main() {
    float L = texture(uVelocity, vL).x;
    float R = texture(uVelocity, vR).x;
    float T = texture(uVelocity, vT).y;
    float B = texture(uVelocity, vB).y;

    vec2 C = texture(uVelocity, vUv).xy;
    if (vL.x < 0.0) { L = -C.x; }
    if (vR.x > 1.0) { R = -C.x; }
    if (vT.y > 1.0) { T = -C.y; }
    if (vB.y < 0.0) { B = -C.y; }

    float div = 0.5 * (R - L + T - B);
    outColor = vec4(div, 0.0, 0.0, 1.0);
}
";

const CURL_GLSL: &str = r"
void main() {
    float L = texture(uVelocity, vL).y;
    float R = texture(uVelocity, vR).y;
    float T = texture(uVelocity, vT).x;
    float B = texture(uVelocity, vB).x;
    float vorticity = R - L - T + B;
    outColor = vec4(0.5 * vorticity, 0.0, 0.0, 1.0);
}
";

const VORTICITY_GLSL: &str = r"
void main() {
    float L = texture(uCurl, vL).x;
    float R = texture(uCurl, vR).x;
    float T = texture(uCurl, vT).x;
    float B = texture(uCurl, vB).x;
    float C = texture(uCurl, vUv).x;

    vec2 force = 0.5 * vec2(abs(T) - abs(B), abs(R) - abs(L));
    force /= length(force) + 0.0001;
    force *= params.curl * C;
    force.y *= -1.0;

    vec2 velocity = texture(uVelocity, vUv).xy;
    velocity += force * params.dt;
    velocity = clamp(velocity, vec2(-1000.0), vec2(1000.0));
    outColor = vec4(velocity, 0.0, 1.0);
}
";

const PRESSURE_GLSL: &str = r"
void main() {
    float L = texture(uPressure, vL).x;
    float R = texture(uPressure, vR).x;
    float T = texture(uPressure, vT).x;
    float B = texture(uPressure, vB).x;
    float divergence = texture(uDivergence, vUv).x;
    float pressure = (L + R + B + T - divergence) * 0.25;
    outColor = vec4(pressure, 0.0, 0.0, 1.0);
}
";

const GRADIENT_SUBTRACT_GLSL: &str = r"
void main() {
    float L = texture(uPressure, vL).x;
    float R = texture(uPressure, vR).x;
    float T = texture(uPressure, vT).x;
    float B = texture(uPressure, vB).x;
    vec2 velocity = texture(uVelocity, vUv).xy;
    velocity -= 0.5 * vec2(R - L, T - B);
    outColor = vec4(velocity, 0.0, 1.0);
}
";
