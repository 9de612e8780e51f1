use crate::renderer::device::{Device, Handle, PixelData, PixelFormat, SamplerState, VertexAttribute};
use crate::renderer::gl;
use crate::renderer::gltf::{self, SceneDescription, SceneError};

/// The vertex arrays of one mesh, `vertex_arrays[begin..begin + count]`,
/// one per primitive in the mesh's primitive order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaoRange {
    pub begin: usize,
    pub count: usize,
}

/// The vertex attributes the glTF shader reads, and where it reads them.
const VERTEX_ATTRIBUTES: [(&str, gl::types::GLuint); 3] = [
    ("POSITION", gltf::ATTR_LOC_POSITION),
    ("NORMAL", gltf::ATTR_LOC_NORMAL),
    ("TEXCOORD_0", gltf::ATTR_LOC_TEXCOORD_0),
];

/// Every GPU object created for one [`SceneDescription`]. Built once after
/// loading, released once at shutdown or when the scene is replaced.
#[derive(Debug)]
pub struct SceneResources {
    /// Index-aligned with [`SceneDescription::buffers`].
    pub buffers: Vec<Handle>,
    /// Index-aligned with [`SceneDescription::textures`].
    pub textures: Vec<Handle>,
    pub vertex_arrays: Vec<Handle>,
    /// Index-aligned with [`SceneDescription::meshes`].
    pub vao_ranges: Vec<VaoRange>,
    /// 1x1 white texture standing in for missing base color textures.
    pub white_texture: Handle,
}

impl SceneResources {
    pub fn build(device: &mut impl Device, scene: &SceneDescription) -> Result<SceneResources, SceneError> {
        let buffers = build_buffers(device, scene);
        let textures = match build_textures(device, scene) {
            Ok(textures) => textures,
            Err(err) => {
                device.delete_buffers(&buffers);
                return Err(err);
            }
        };
        let (vertex_arrays, vao_ranges) = match build_vertex_arrays(device, scene, &buffers) {
            Ok(vertex_arrays) => vertex_arrays,
            Err(err) => {
                device.delete_textures(&textures);
                device.delete_buffers(&buffers);
                return Err(err);
            }
        };
        let white_texture = create_white_texture(device);
        log::debug!(
            "uploaded {} buffers, {} textures and {} vertex arrays",
            buffers.len(),
            textures.len(),
            vertex_arrays.len(),
        );
        Ok(SceneResources {
            buffers,
            textures,
            vertex_arrays,
            vao_ranges,
            white_texture,
        })
    }

    /// The vertex arrays of the mesh's primitives, in primitive order.
    pub fn mesh_vertex_arrays(&self, mesh_index: usize) -> Result<&[Handle], SceneError> {
        let range = self.vao_ranges.get(mesh_index).ok_or(SceneError::InvalidReference {
            kind: "mesh",
            index: mesh_index,
            len: self.vao_ranges.len(),
        })?;
        Ok(&self.vertex_arrays[range.begin..range.begin + range.count])
    }

    pub fn texture(&self, texture_index: usize) -> Result<Handle, SceneError> {
        self.textures
            .get(texture_index)
            .copied()
            .ok_or(SceneError::InvalidReference {
                kind: "texture",
                index: texture_index,
                len: self.textures.len(),
            })
    }

    pub fn release(self, device: &mut impl Device) {
        device.delete_vertex_arrays(&self.vertex_arrays);
        device.delete_buffers(&self.buffers);
        let mut textures = self.textures;
        textures.push(self.white_texture);
        device.delete_textures(&textures);
    }
}

/// Uploads every buffer as-is into a static GPU buffer.
pub fn build_buffers(device: &mut impl Device, scene: &SceneDescription) -> Vec<Handle> {
    scene
        .buffers
        .iter()
        .map(|buffer| device.create_buffer(buffer))
        .collect()
}

/// Uploads every texture's image with its sampler's parameters, or linear
/// filtering and repeat wrapping if the texture has no sampler. Nothing is
/// uploaded unless every texture is valid.
pub fn build_textures(device: &mut impl Device, scene: &SceneDescription) -> Result<Vec<Handle>, SceneError> {
    let mut uploads = Vec::with_capacity(scene.textures.len());
    for (i, texture) in scene.textures.iter().enumerate() {
        let source = texture.source.ok_or(SceneError::TextureWithoutSource(i))?;
        let image = scene.image(source)?;
        let expected = image.width as usize * image.height as usize * 4;
        if image.pixels.len() != expected {
            return Err(SceneError::ImageSizeMismatch {
                image: source,
                expected,
                actual: image.pixels.len(),
            });
        }
        let sampler = match texture.sampler {
            Some(sampler) => SamplerState::from(scene.sampler(sampler)?),
            None => SamplerState::LINEAR_REPEAT,
        };
        let pixels = PixelData {
            width: image.width,
            height: image.height,
            format: PixelFormat::Rgba8,
            pixels: &image.pixels,
        };
        uploads.push((pixels, sampler));
    }
    Ok(uploads
        .iter()
        .map(|(pixels, sampler)| device.create_texture_2d(pixels, sampler))
        .collect())
}

/// Creates one vertex array per primitive, with POSITION, NORMAL and
/// TEXCOORD_0 bound to their fixed attribute locations and the index
/// buffer, if any, as the element buffer. Nothing is created unless every
/// primitive is valid.
pub fn build_vertex_arrays(
    device: &mut impl Device,
    scene: &SceneDescription,
    buffers: &[Handle],
) -> Result<(Vec<Handle>, Vec<VaoRange>), SceneError> {
    let buffer_handle = |buffer: usize| {
        buffers.get(buffer).copied().ok_or(SceneError::InvalidReference {
            kind: "buffer",
            index: buffer,
            len: buffers.len(),
        })
    };

    let mut layouts = Vec::new();
    let mut vao_ranges = Vec::with_capacity(scene.meshes.len());
    for mesh in &scene.meshes {
        let begin = layouts.len();
        for primitive in &mesh.primitives {
            let mut attributes = Vec::with_capacity(VERTEX_ATTRIBUTES.len());
            for (semantic, slot) in VERTEX_ATTRIBUTES {
                let Some(accessor_index) = primitive.attribute(semantic) else {
                    continue;
                };
                let (accessor, view) = scene.accessor_view(accessor_index)?;
                attributes.push(VertexAttribute {
                    slot,
                    buffer: buffer_handle(view.buffer)?,
                    components: accessor.kind.component_count() as i32,
                    component_type: accessor.component_type.gl_enum(),
                    normalized: accessor.normalized,
                    stride: view.byte_stride as i32,
                    byte_offset: scene.accessor_byte_offset(accessor_index)?,
                });
            }
            let element_buffer = match primitive.indices {
                Some(indices) => Some(buffer_handle(scene.accessor_view(indices)?.1.buffer)?),
                None => None,
            };
            layouts.push((attributes, element_buffer));
        }
        vao_ranges.push(VaoRange {
            begin,
            count: mesh.primitives.len(),
        });
    }
    let vertex_arrays = layouts
        .iter()
        .map(|(attributes, element_buffer)| device.create_vertex_array(attributes, *element_buffer))
        .collect();
    Ok((vertex_arrays, vao_ranges))
}

pub fn create_white_texture(device: &mut impl Device) -> Handle {
    let pixels = PixelData {
        width: 1,
        height: 1,
        format: PixelFormat::Rgba8,
        pixels: &[0xFF; 4],
    };
    device.create_texture_2d(&pixels, &SamplerState::LINEAR_REPEAT)
}
