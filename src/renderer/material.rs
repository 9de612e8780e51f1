use glam::{Vec3, Vec4};

use crate::renderer::device::{Device, Handle, TextureTarget, Uniform, UniformLocation};
use crate::renderer::gltf::{self, PbrUniforms, SceneDescription, SceneError, TextureRef};
use crate::renderer::resources::SceneResources;

/// Everything one draw call needs bound for its material: a texture handle
/// (or none) per texture slot, plus the scalar factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialBinding {
    /// Never empty, the white texture stands in when the material has none.
    pub base_color_texture: Handle,
    pub base_color_factor: Vec4,
    pub metallic_roughness_texture: Option<Handle>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_texture: Option<Handle>,
    pub emissive_factor: Vec3,
    pub occlusion_texture: Option<Handle>,
    pub occlusion_strength: f32,
    pub normal_texture: Option<Handle>,
    pub normal_scale: f32,
}

impl MaterialBinding {
    /// Used for primitives without a material, and for every primitive of a
    /// scene without textures.
    pub fn neutral(white_texture: Handle) -> MaterialBinding {
        MaterialBinding {
            base_color_texture: white_texture,
            base_color_factor: Vec4::ONE,
            metallic_roughness_texture: None,
            metallic_factor: 0.0,
            roughness_factor: 0.0,
            emissive_texture: None,
            emissive_factor: Vec3::ZERO,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            normal_texture: None,
            normal_scale: 1.0,
        }
    }

    pub fn resolve(
        scene: &SceneDescription,
        resources: &SceneResources,
        material_index: Option<usize>,
    ) -> Result<MaterialBinding, SceneError> {
        let neutral = MaterialBinding::neutral(resources.white_texture);
        let Some(material_index) = material_index else {
            return Ok(neutral);
        };
        let material = scene.material(material_index)?;
        if scene.textures.is_empty() {
            return Ok(neutral);
        }
        // Only TEXCOORD_0 is bound, textures mapped through other sets stay unbound.
        let texture = |texture_ref: Option<TextureRef>| -> Result<Option<Handle>, SceneError> {
            match texture_ref {
                Some(texture_ref) if texture_ref.tex_coord == 0 => resources.texture(texture_ref.index).map(Some),
                _ => Ok(None),
            }
        };
        Ok(MaterialBinding {
            base_color_texture: texture(material.base_color_texture)?.unwrap_or(resources.white_texture),
            base_color_factor: material.base_color_factor,
            metallic_roughness_texture: texture(material.metallic_roughness_texture)?,
            metallic_factor: material.metallic_factor,
            roughness_factor: material.roughness_factor,
            emissive_texture: texture(material.emissive_texture)?,
            emissive_factor: material.emissive_factor,
            occlusion_texture: texture(material.occlusion_texture)?,
            occlusion_strength: material.occlusion_strength,
            normal_texture: texture(material.normal_texture)?,
            normal_scale: material.normal_scale,
        })
    }

    pub fn apply(&self, device: &mut impl Device, uniforms: &PbrUniforms) {
        bind_sampler(
            device,
            gltf::TEXTURE_UNIT_BASE_COLOR,
            Some(self.base_color_texture),
            uniforms.base_color_texture,
            None,
        );
        device.uniform(uniforms.base_color_factor, Uniform::Vec4(self.base_color_factor));

        bind_sampler(
            device,
            gltf::TEXTURE_UNIT_METALLIC_ROUGHNESS,
            self.metallic_roughness_texture,
            uniforms.metallic_roughness_texture,
            uniforms.has_metallic_roughness_texture,
        );
        device.uniform(uniforms.metallic_factor, Uniform::Float(self.metallic_factor));
        device.uniform(uniforms.roughness_factor, Uniform::Float(self.roughness_factor));

        bind_sampler(
            device,
            gltf::TEXTURE_UNIT_EMISSIVE,
            self.emissive_texture,
            uniforms.emissive_texture,
            uniforms.has_emissive_texture,
        );
        device.uniform(uniforms.emissive_factor, Uniform::Vec3(self.emissive_factor));

        bind_sampler(
            device,
            gltf::TEXTURE_UNIT_OCCLUSION,
            self.occlusion_texture,
            uniforms.occlusion_texture,
            uniforms.has_occlusion_texture,
        );
        device.uniform(uniforms.occlusion_strength, Uniform::Float(self.occlusion_strength));

        bind_sampler(
            device,
            gltf::TEXTURE_UNIT_NORMAL,
            self.normal_texture,
            uniforms.normal_texture,
            uniforms.has_normal_texture,
        );
        device.uniform(uniforms.normal_scale, Uniform::Float(self.normal_scale));
    }
}

fn bind_sampler(
    device: &mut impl Device,
    unit: u32,
    texture: Option<Handle>,
    sampler: Option<UniformLocation>,
    has_texture: Option<UniformLocation>,
) {
    device.bind_texture(unit, TextureTarget::Texture2d, texture);
    device.uniform(sampler, Uniform::Int(unit as i32));
    device.uniform(has_texture, Uniform::Int(texture.is_some() as i32));
}
