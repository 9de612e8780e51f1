use std::collections::BTreeMap;

use crate::renderer::gl;
use glam::{Mat4, Quat, Vec3, Vec4};

mod loader;
mod program;

pub use loader::{load_gltf, load_gltf_file};
pub use program::*;

/// A fully parsed glTF asset. Everything refers to everything else by index,
/// the renderer resolves those indices with the accessor methods below, which
/// turn out-of-range references into [`SceneError::InvalidReference`].
#[derive(Debug, Default)]
pub struct SceneDescription {
    pub default_scene: Option<usize>,
    pub scenes: Vec<Scene>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub images: Vec<Image>,
    pub samplers: Vec<Sampler>,
    pub accessors: Vec<Accessor>,
    pub buffer_views: Vec<BufferView>,
    pub buffers: Vec<Vec<u8>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("{kind} index {index} is out of range ({len} {kind}s in the scene)")]
    InvalidReference {
        kind: &'static str,
        index: usize,
        len: usize,
    },
    #[error("accessor {0} has no buffer view")]
    AccessorWithoutBufferView(usize),
    #[error("accessor {0} starts past the end of its buffer")]
    AccessorOutOfBounds(usize),
    #[error("texture {0} has no source image")]
    TextureWithoutSource(usize),
    #[error("image {image} has {actual} bytes of pixels, expected {expected}")]
    ImageSizeMismatch {
        image: usize,
        expected: usize,
        actual: usize,
    },
    #[error("node {0} was reached twice, the node hierarchy is not a tree")]
    NodeRevisited(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub node_indices: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub mesh_index: Option<usize>,
    pub child_node_indices: Vec<usize>,
    pub transform: NodeTransform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeTransform {
    Matrix(Mat4),
    Trs {
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    },
}

impl NodeTransform {
    pub const IDENTITY: NodeTransform = NodeTransform::Matrix(Mat4::IDENTITY);

    pub fn local_matrix(&self) -> Mat4 {
        match *self {
            NodeTransform::Matrix(matrix) => matrix,
            NodeTransform::Trs {
                translation,
                rotation,
                scale,
            } => Mat4::from_scale_rotation_translation(scale, rotation, translation),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone)]
pub struct Primitive {
    /// Attribute semantic to accessor index. Kept sorted by name so that "the
    /// first attribute" is the same on every run for the same asset.
    pub attributes: BTreeMap<String, usize>,
    pub indices: Option<usize>,
    pub mode: Topology,
    pub material_index: Option<usize>,
}

impl Primitive {
    pub fn attribute(&self, semantic: &str) -> Option<usize> {
        self.attributes.get(semantic).copied()
    }

    pub fn first_attribute(&self) -> Option<usize> {
        self.attributes.values().next().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    pub fn from_gltf(mode: usize) -> Option<Topology> {
        Some(match mode {
            0 => Topology::Points,
            1 => Topology::Lines,
            2 => Topology::LineLoop,
            3 => Topology::LineStrip,
            4 => Topology::Triangles,
            5 => Topology::TriangleStrip,
            6 => Topology::TriangleFan,
            _ => return None,
        })
    }

    pub fn gl_enum(self) -> gl::types::GLenum {
        match self {
            Topology::Points => gl::POINTS,
            Topology::Lines => gl::LINES,
            Topology::LineLoop => gl::LINE_LOOP,
            Topology::LineStrip => gl::LINE_STRIP,
            Topology::Triangles => gl::TRIANGLES,
            Topology::TriangleStrip => gl::TRIANGLE_STRIP,
            Topology::TriangleFan => gl::TRIANGLE_FAN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub base_color_factor: Vec4,
    pub base_color_texture: Option<TextureRef>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureRef>,
    pub emissive_factor: Vec3,
    pub emissive_texture: Option<TextureRef>,
    pub occlusion_texture: Option<TextureRef>,
    pub occlusion_strength: f32,
    pub normal_texture: Option<TextureRef>,
    pub normal_scale: f32,
}

impl Default for Material {
    /// The glTF defaults for a material that omits every property.
    fn default() -> Self {
        Material {
            base_color_factor: Vec4::ONE,
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            emissive_factor: Vec3::ZERO,
            emissive_texture: None,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            normal_texture: None,
            normal_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRef {
    pub index: usize,
    pub tex_coord: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Texture {
    pub source: Option<usize>,
    pub sampler: Option<usize>,
}

/// Decoded texture image, always tightly packed RGBA8.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampler {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            wrap_s: Wrap::Repeat,
            wrap_t: Wrap::Repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl Filter {
    pub fn from_gltf(filter: usize) -> Option<Filter> {
        Some(match filter {
            9728 => Filter::Nearest,
            9729 => Filter::Linear,
            9984 => Filter::NearestMipmapNearest,
            9985 => Filter::LinearMipmapNearest,
            9986 => Filter::NearestMipmapLinear,
            9987 => Filter::LinearMipmapLinear,
            _ => return None,
        })
    }

    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Filter::Nearest | Filter::Linear)
    }

    pub fn gl_enum(self) -> gl::types::GLenum {
        match self {
            Filter::Nearest => gl::NEAREST,
            Filter::Linear => gl::LINEAR,
            Filter::NearestMipmapNearest => gl::NEAREST_MIPMAP_NEAREST,
            Filter::LinearMipmapNearest => gl::LINEAR_MIPMAP_NEAREST,
            Filter::NearestMipmapLinear => gl::NEAREST_MIPMAP_LINEAR,
            Filter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

impl Wrap {
    pub fn from_gltf(wrap: usize) -> Option<Wrap> {
        Some(match wrap {
            10497 => Wrap::Repeat,
            33648 => Wrap::MirroredRepeat,
            33071 => Wrap::ClampToEdge,
            _ => return None,
        })
    }

    pub fn gl_enum(self) -> gl::types::GLenum {
        match self {
            Wrap::Repeat => gl::REPEAT,
            Wrap::MirroredRepeat => gl::MIRRORED_REPEAT,
            Wrap::ClampToEdge => gl::CLAMP_TO_EDGE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub kind: AccessorKind,
    pub count: usize,
    pub normalized: bool,
    pub min: Option<Vec<f32>>,
    pub max: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub fn from_gltf(component_type: usize) -> Option<ComponentType> {
        Some(match component_type {
            5120 => ComponentType::Byte,
            5121 => ComponentType::UnsignedByte,
            5122 => ComponentType::Short,
            5123 => ComponentType::UnsignedShort,
            5125 => ComponentType::UnsignedInt,
            5126 => ComponentType::Float,
            _ => return None,
        })
    }

    pub fn gl_enum(self) -> gl::types::GLenum {
        match self {
            ComponentType::Byte => gl::BYTE,
            ComponentType::UnsignedByte => gl::UNSIGNED_BYTE,
            ComponentType::Short => gl::SHORT,
            ComponentType::UnsignedShort => gl::UNSIGNED_SHORT,
            ComponentType::UnsignedInt => gl::UNSIGNED_INT,
            ComponentType::Float => gl::FLOAT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorKind {
    pub fn from_gltf(kind: &str) -> Option<AccessorKind> {
        Some(match kind {
            "SCALAR" => AccessorKind::Scalar,
            "VEC2" => AccessorKind::Vec2,
            "VEC3" => AccessorKind::Vec3,
            "VEC4" => AccessorKind::Vec4,
            "MAT2" => AccessorKind::Mat2,
            "MAT3" => AccessorKind::Mat3,
            "MAT4" => AccessorKind::Mat4,
            _ => return None,
        })
    }

    pub fn component_count(self) -> usize {
        match self {
            AccessorKind::Scalar => 1,
            AccessorKind::Vec2 => 2,
            AccessorKind::Vec3 => 3,
            AccessorKind::Vec4 | AccessorKind::Mat2 => 4,
            AccessorKind::Mat3 => 9,
            AccessorKind::Mat4 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    /// Zero when the glTF leaves it out, which is also what OpenGL reads as
    /// "tightly packed".
    pub byte_stride: usize,
}

fn lookup<'a, T>(items: &'a [T], kind: &'static str, index: usize) -> Result<&'a T, SceneError> {
    items.get(index).ok_or(SceneError::InvalidReference {
        kind,
        index,
        len: items.len(),
    })
}

impl SceneDescription {
    pub fn scene(&self, index: usize) -> Result<&Scene, SceneError> {
        lookup(&self.scenes, "scene", index)
    }

    pub fn node(&self, index: usize) -> Result<&Node, SceneError> {
        lookup(&self.nodes, "node", index)
    }

    pub fn mesh(&self, index: usize) -> Result<&Mesh, SceneError> {
        lookup(&self.meshes, "mesh", index)
    }

    pub fn material(&self, index: usize) -> Result<&Material, SceneError> {
        lookup(&self.materials, "material", index)
    }

    pub fn image(&self, index: usize) -> Result<&Image, SceneError> {
        lookup(&self.images, "image", index)
    }

    pub fn sampler(&self, index: usize) -> Result<&Sampler, SceneError> {
        lookup(&self.samplers, "sampler", index)
    }

    pub fn accessor(&self, index: usize) -> Result<&Accessor, SceneError> {
        lookup(&self.accessors, "accessor", index)
    }

    pub fn buffer_view(&self, index: usize) -> Result<&BufferView, SceneError> {
        lookup(&self.buffer_views, "buffer view", index)
    }

    /// Resolves the buffer view of an accessor, which every accessor the
    /// renderer reads must have (sparse-only accessors are not supported).
    pub fn accessor_view(&self, accessor_index: usize) -> Result<(&Accessor, &BufferView), SceneError> {
        let accessor = self.accessor(accessor_index)?;
        let view_index = accessor
            .buffer_view
            .ok_or(SceneError::AccessorWithoutBufferView(accessor_index))?;
        Ok((accessor, self.buffer_view(view_index)?))
    }

    /// Where the accessor's data starts in its buffer: the view's offset plus
    /// the accessor's own.
    pub fn accessor_byte_offset(&self, accessor_index: usize) -> Result<usize, SceneError> {
        let (accessor, view) = self.accessor_view(accessor_index)?;
        let buffer = lookup(&self.buffers, "buffer", view.buffer)?;
        view.byte_offset
            .checked_add(accessor.byte_offset)
            .filter(|&offset| offset <= buffer.len())
            .ok_or(SceneError::AccessorOutOfBounds(accessor_index))
    }

    /// The root node list of the default scene, empty if the asset doesn't
    /// declare one.
    pub fn default_root_nodes(&self) -> Result<&[usize], SceneError> {
        match self.default_scene {
            Some(scene) => Ok(&self.scene(scene)?.node_indices),
            None => Ok(&[]),
        }
    }

    /// Axis-aligned bounds of the default scene in world space, from the
    /// min/max of the POSITION accessors. None if nothing has bounds.
    pub fn bounds(&self) -> Result<Option<(Vec3, Vec3)>, SceneError> {
        let mut bounds: Option<(Vec3, Vec3)> = None;
        let mut node_stack = self
            .default_root_nodes()?
            .iter()
            .map(|&i| (Mat4::IDENTITY, i))
            .collect::<Vec<_>>();
        let mut visited = vec![false; self.nodes.len()];
        while let Some((parent_transform, node_index)) = node_stack.pop() {
            let node = self.node(node_index)?;
            if std::mem::replace(&mut visited[node_index], true) {
                return Err(SceneError::NodeRevisited(node_index));
            }
            let transform = parent_transform * node.transform.local_matrix();
            if let Some(mesh_index) = node.mesh_index {
                for primitive in &self.mesh(mesh_index)?.primitives {
                    let Some(position) = primitive.attribute("POSITION") else {
                        continue;
                    };
                    let accessor = self.accessor(position)?;
                    let (Some(min), Some(max)) = (&accessor.min, &accessor.max) else {
                        continue;
                    };
                    if min.len() < 3 || max.len() < 3 {
                        continue;
                    }
                    let (min, max) = (Vec3::from_slice(min), Vec3::from_slice(max));
                    for corner in 0..8 {
                        let local = Vec3::new(
                            if corner & 1 == 0 { min.x } else { max.x },
                            if corner & 2 == 0 { min.y } else { max.y },
                            if corner & 4 == 0 { min.z } else { max.z },
                        );
                        let world = transform.transform_point3(local);
                        bounds = Some(match bounds {
                            Some((lo, hi)) => (lo.min(world), hi.max(world)),
                            None => (world, world),
                        });
                    }
                }
            }
            for &child_index in &node.child_node_indices {
                node_stack.push((transform, child_index));
            }
        }
        Ok(bounds)
    }
}
