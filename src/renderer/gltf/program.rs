use crate::renderer::device::{Device, Handle, UniformLocation};
use crate::renderer::gl;
use anyhow::Context;

/// The vertex attribute location of the POSITION attribute of glTF models.
pub const ATTR_LOC_POSITION: gl::types::GLuint = 0;
/// The vertex attribute location of the NORMAL attribute of glTF models.
pub const ATTR_LOC_NORMAL: gl::types::GLuint = 1;
/// The vertex attribute location of the TEXCOORD_0 attribute of glTF models.
pub const ATTR_LOC_TEXCOORD_0: gl::types::GLuint = 2;

/// Texture units used by the material and environment samplers.
pub const TEXTURE_UNIT_BASE_COLOR: u32 = 0;
pub const TEXTURE_UNIT_METALLIC_ROUGHNESS: u32 = 1;
pub const TEXTURE_UNIT_EMISSIVE: u32 = 2;
pub const TEXTURE_UNIT_OCCLUSION: u32 = 3;
pub const TEXTURE_UNIT_NORMAL: u32 = 4;
pub const TEXTURE_UNIT_ENVIRONMENT: u32 = 5;

const PBR_VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec3 NORMAL;
layout(location = 2) in vec2 TEXCOORD_0;
uniform mat4 uModelViewProjMatrix;
uniform mat4 uModelViewMatrix;
uniform mat4 uNormalMatrix;
out vec3 vViewSpacePosition;
out vec3 vViewSpaceNormal;
out vec2 vTexCoords;
void main() {
    vViewSpacePosition = vec3(uModelViewMatrix * vec4(POSITION, 1.0));
    // Unbound NORMALs read as zero, the fragment shader falls back to face normals.
    vViewSpaceNormal = vec3(uNormalMatrix * vec4(NORMAL, 0.0));
    vTexCoords = TEXCOORD_0;
    gl_Position = uModelViewProjMatrix * vec4(POSITION, 1.0);
}
"#;
const PBR_FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;
in vec3 vViewSpacePosition;
in vec3 vViewSpaceNormal;
in vec2 vTexCoords;
out vec4 FRAG_COLOR;

uniform vec3 uLightDirection;
uniform vec3 uLightIntensity;

uniform vec4 uBaseColorFactor;
uniform sampler2D uBaseColorTexture;
uniform float uMetallicFactor;
uniform float uRoughnessFactor;
uniform sampler2D uMetallicRoughnessTexture;
uniform int uHasMetallicRoughnessTexture;
uniform vec3 uEmissiveFactor;
uniform sampler2D uEmissiveTexture;
uniform int uHasEmissiveTexture;
uniform float uOcclusionStrength;
uniform sampler2D uOcclusionTexture;
uniform int uHasOcclusionTexture;
uniform float uNormalScale;
uniform sampler2D uNormalTexture;
uniform int uHasNormalTexture;

uniform samplerCube uEnvironmentMap;
uniform int uHasEnvironmentMap;
uniform mat4 uViewToWorldMatrix;

const float GAMMA = 2.2;
const float M_1_PI = 1.0 / 3.141592653589793;

vec3 linearToSrgb(vec3 color) {
    return pow(color, vec3(1.0 / GAMMA));
}

vec4 srgbToLinear(vec4 color) {
    return vec4(pow(color.rgb, vec3(GAMMA)), color.a);
}

vec3 surfaceNormal() {
    vec3 dpdx = dFdx(vViewSpacePosition);
    vec3 dpdy = dFdy(vViewSpacePosition);
    vec3 n = vViewSpaceNormal;
    if (dot(n, n) < 1e-8) {
        n = cross(dpdx, dpdy);
    }
    n = normalize(n);
    if (uHasNormalTexture == 1) {
        vec2 dtdx = dFdx(vTexCoords);
        vec2 dtdy = dFdy(vTexCoords);
        vec3 t = dpdx * dtdy.y - dpdy * dtdx.y;
        if (dot(t, t) > 1e-12) {
            t = normalize(t - n * dot(n, t));
            vec3 b = cross(n, t);
            vec3 tangentNormal = texture(uNormalTexture, vTexCoords).xyz * 2.0 - 1.0;
            tangentNormal.xy *= uNormalScale;
            n = normalize(mat3(t, b, n) * tangentNormal);
        }
    }
    return n;
}

void main() {
    vec3 N = surfaceNormal();
    vec3 L = normalize(uLightDirection);
    vec3 V = normalize(-vViewSpacePosition);
    vec3 H = normalize(L + V);

    vec4 baseColor = uBaseColorFactor * srgbToLinear(texture(uBaseColorTexture, vTexCoords));
    float metallic = uMetallicFactor;
    float roughness = uRoughnessFactor;
    if (uHasMetallicRoughnessTexture == 1) {
        vec4 metallicRoughness = texture(uMetallicRoughnessTexture, vTexCoords);
        metallic *= metallicRoughness.b;
        roughness *= metallicRoughness.g;
    }

    vec3 dielectricSpecular = vec3(0.04);
    vec3 cDiff = mix(baseColor.rgb * (1.0 - dielectricSpecular.r), vec3(0.0), metallic);
    vec3 F0 = mix(dielectricSpecular, baseColor.rgb, metallic);
    float alpha = roughness * roughness;
    float alphaSquared = alpha * alpha;

    float VdotH = clamp(dot(V, H), 0.0, 1.0);
    float NdotL = clamp(dot(N, L), 0.0, 1.0);
    float NdotV = clamp(dot(N, V), 0.0, 1.0);
    float NdotH = clamp(dot(N, H), 0.0, 1.0);

    float schlick = pow(1.0 - VdotH, 5.0);
    vec3 F = F0 + (vec3(1.0) - F0) * schlick;

    float visDenominator = NdotL * sqrt(NdotV * NdotV * (1.0 - alphaSquared) + alphaSquared)
        + NdotV * sqrt(NdotL * NdotL * (1.0 - alphaSquared) + alphaSquared);
    float Vis = visDenominator > 0.0 ? 0.5 / visDenominator : 0.0;
    float dDenominator = NdotH * NdotH * (alphaSquared - 1.0) + 1.0;
    float D = M_1_PI * alphaSquared / max(dDenominator * dDenominator, 1e-6);

    vec3 diffuse = (vec3(1.0) - F) * cDiff * M_1_PI;
    vec3 specular = F * Vis * D;
    vec3 color = (diffuse + specular) * uLightIntensity * NdotL;

    if (uHasEnvironmentMap == 1) {
        mat3 viewToWorld = mat3(uViewToWorldMatrix);
        vec3 irradiance = texture(uEnvironmentMap, viewToWorld * N).rgb;
        vec3 radiance = texture(uEnvironmentMap, viewToWorld * reflect(-V, N)).rgb;
        color += cDiff * irradiance + F0 * radiance * (1.0 - roughness);
    }

    if (uHasOcclusionTexture == 1) {
        float occlusion = texture(uOcclusionTexture, vTexCoords).r;
        color = mix(color, color * occlusion, uOcclusionStrength);
    }

    vec3 emissive = uEmissiveFactor;
    if (uHasEmissiveTexture == 1) {
        emissive *= srgbToLinear(texture(uEmissiveTexture, vTexCoords)).rgb;
    }
    color += emissive;

    // The framebuffer is not SRGB, so we transform the linear color to close-enough-to-srgb.
    FRAG_COLOR = vec4(linearToSrgb(color), baseColor.a);
}
"#;

const CUBE_VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
uniform mat4 uModelProjMatrix;
uniform mat4 uModelViewMatrix;
out vec3 vDirection;
void main() {
    vDirection = POSITION;
    // Only the rotation of the view matters, the cube is infinitely far away.
    vec4 position = uModelProjMatrix * mat4(mat3(uModelViewMatrix)) * vec4(POSITION, 1.0);
    gl_Position = position.xyww;
}
"#;
const SKYBOX_FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;
in vec3 vDirection;
out vec4 FRAG_COLOR;
uniform samplerCube uEnvironmentMap;
void main() {
    vec3 color = texture(uEnvironmentMap, vDirection).rgb;
    FRAG_COLOR = vec4(pow(clamp(color, 0.0, 1.0), vec3(1.0 / 2.2)), 1.0);
}
"#;
const EQUIRECTANGULAR_FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;
in vec3 vDirection;
out vec4 FRAG_COLOR;
uniform sampler2D uEquirectangularMap;
const vec2 INV_ATAN = vec2(0.15915494, 0.31830989);
void main() {
    vec3 direction = normalize(vDirection);
    vec2 uv = vec2(atan(direction.z, direction.x), asin(direction.y)) * INV_ATAN + 0.5;
    FRAG_COLOR = vec4(texture(uEquirectangularMap, uv).rgb, 1.0);
}
"#;

/// Uniform locations of the glTF shader. `None` for uniforms the linked
/// program doesn't use, writes to those are skipped.
#[derive(Debug, Clone, Default)]
pub struct PbrUniforms {
    pub model_view_proj_matrix: Option<UniformLocation>,
    pub model_view_matrix: Option<UniformLocation>,
    pub normal_matrix: Option<UniformLocation>,
    pub light_direction: Option<UniformLocation>,
    pub light_intensity: Option<UniformLocation>,
    pub base_color_texture: Option<UniformLocation>,
    pub base_color_factor: Option<UniformLocation>,
    pub metallic_roughness_texture: Option<UniformLocation>,
    pub has_metallic_roughness_texture: Option<UniformLocation>,
    pub metallic_factor: Option<UniformLocation>,
    pub roughness_factor: Option<UniformLocation>,
    pub emissive_texture: Option<UniformLocation>,
    pub has_emissive_texture: Option<UniformLocation>,
    pub emissive_factor: Option<UniformLocation>,
    pub occlusion_texture: Option<UniformLocation>,
    pub has_occlusion_texture: Option<UniformLocation>,
    pub occlusion_strength: Option<UniformLocation>,
    pub normal_texture: Option<UniformLocation>,
    pub has_normal_texture: Option<UniformLocation>,
    pub normal_scale: Option<UniformLocation>,
    pub environment_map: Option<UniformLocation>,
    pub has_environment_map: Option<UniformLocation>,
    pub view_to_world_matrix: Option<UniformLocation>,
}

pub struct PbrProgram {
    pub program: Handle,
    pub uniforms: PbrUniforms,
}

/// A program that draws the unit cube: the skybox and the equirectangular
/// to cube map projection share this layout.
pub struct CubeProgram {
    pub program: Handle,
    pub map: Option<UniformLocation>,
    pub projection_matrix: Option<UniformLocation>,
    pub view_matrix: Option<UniformLocation>,
}

fn link_program(vertex_source: &str, fragment_source: &str) -> anyhow::Result<Handle> {
    let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, vertex_source)?;
    let fragment_shader = match gl::create_shader(gl::FRAGMENT_SHADER, fragment_source) {
        Ok(shader) => shader,
        Err(err) => {
            gl::call!(gl::DeleteShader(vertex_shader));
            return Err(err);
        }
    };
    let program = gl::create_program(&[vertex_shader, fragment_shader]);
    gl::call!(gl::DeleteShader(vertex_shader));
    gl::call!(gl::DeleteShader(fragment_shader));
    program
}

/// Compiles and returns the shader program which should be used to render the
/// glTF models.
pub fn create_pbr_program() -> anyhow::Result<PbrProgram> {
    let program = link_program(PBR_VERTEX_SHADER, PBR_FRAGMENT_SHADER).context("glTF shader")?;
    let location = |name| gl::get_uniform_location(program, name);
    let uniforms = PbrUniforms {
        model_view_proj_matrix: location("uModelViewProjMatrix"),
        model_view_matrix: location("uModelViewMatrix"),
        normal_matrix: location("uNormalMatrix"),
        light_direction: location("uLightDirection"),
        light_intensity: location("uLightIntensity"),
        base_color_texture: location("uBaseColorTexture"),
        base_color_factor: location("uBaseColorFactor"),
        metallic_roughness_texture: location("uMetallicRoughnessTexture"),
        has_metallic_roughness_texture: location("uHasMetallicRoughnessTexture"),
        metallic_factor: location("uMetallicFactor"),
        roughness_factor: location("uRoughnessFactor"),
        emissive_texture: location("uEmissiveTexture"),
        has_emissive_texture: location("uHasEmissiveTexture"),
        emissive_factor: location("uEmissiveFactor"),
        occlusion_texture: location("uOcclusionTexture"),
        has_occlusion_texture: location("uHasOcclusionTexture"),
        occlusion_strength: location("uOcclusionStrength"),
        normal_texture: location("uNormalTexture"),
        has_normal_texture: location("uHasNormalTexture"),
        normal_scale: location("uNormalScale"),
        environment_map: location("uEnvironmentMap"),
        has_environment_map: location("uHasEnvironmentMap"),
        view_to_world_matrix: location("uViewToWorldMatrix"),
    };
    Ok(PbrProgram { program, uniforms })
}

fn create_cube_program(fragment_source: &str, map_name: &str) -> anyhow::Result<CubeProgram> {
    let program = link_program(CUBE_VERTEX_SHADER, fragment_source)?;
    Ok(CubeProgram {
        program,
        map: gl::get_uniform_location(program, map_name),
        projection_matrix: gl::get_uniform_location(program, "uModelProjMatrix"),
        view_matrix: gl::get_uniform_location(program, "uModelViewMatrix"),
    })
}

/// The program drawing the environment cube map as the background.
pub fn create_skybox_program() -> anyhow::Result<CubeProgram> {
    create_cube_program(SKYBOX_FRAGMENT_SHADER, "uEnvironmentMap").context("skybox shader")
}

/// The program projecting an equirectangular panorama onto cube map faces.
pub fn create_equirectangular_program() -> anyhow::Result<CubeProgram> {
    create_cube_program(EQUIRECTANGULAR_FRAGMENT_SHADER, "uEquirectangularMap")
        .context("equirectangular projection shader")
}

/// Every program the renderer draws with.
pub struct Programs {
    pub pbr: PbrProgram,
    pub skybox: CubeProgram,
    pub equirectangular: CubeProgram,
}

impl Programs {
    pub fn create() -> anyhow::Result<Programs> {
        let pbr = create_pbr_program()?;
        let skybox = create_skybox_program().map_err(|err| {
            gl::call!(gl::DeleteProgram(pbr.program));
            err
        })?;
        let equirectangular = create_equirectangular_program().map_err(|err| {
            gl::call!(gl::DeleteProgram(pbr.program));
            gl::call!(gl::DeleteProgram(skybox.program));
            err
        })?;
        Ok(Programs {
            pbr,
            skybox,
            equirectangular,
        })
    }

    pub fn release(self, device: &mut impl Device) {
        device.delete_program(self.pbr.program);
        device.delete_program(self.skybox.program);
        device.delete_program(self.equirectangular.program);
    }
}
