//! Small hand-built scenes shared by the renderer's unit tests.

use std::collections::BTreeMap;

use glam::{Vec3, Vec4};

use crate::renderer::gltf::*;

pub fn accessor(
    buffer_view: usize,
    byte_offset: usize,
    component_type: ComponentType,
    kind: AccessorKind,
    count: usize,
) -> Accessor {
    Accessor {
        buffer_view: Some(buffer_view),
        byte_offset,
        component_type,
        kind,
        count,
        normalized: false,
        min: None,
        max: None,
    }
}

pub fn primitive(attributes: &[(&str, usize)], indices: Option<usize>, material_index: Option<usize>) -> Primitive {
    Primitive {
        attributes: attributes
            .iter()
            .map(|&(name, accessor)| (name.to_string(), accessor))
            .collect::<BTreeMap<_, _>>(),
        indices,
        mode: Topology::Triangles,
        material_index,
    }
}

pub fn node(mesh_index: Option<usize>, child_node_indices: Vec<usize>) -> Node {
    Node {
        mesh_index,
        child_node_indices,
        transform: NodeTransform::IDENTITY,
    }
}

/// One root node owning one mesh with two primitives: an indexed triangle
/// list of 3 indices and a non-indexed triangle list of 3 vertices. No
/// materials, no textures.
pub fn two_primitive_scene() -> SceneDescription {
    let mut positions_a = accessor(0, 0, ComponentType::Float, AccessorKind::Vec3, 3);
    positions_a.min = Some(vec![-1.0, -1.0, 0.0]);
    positions_a.max = Some(vec![1.0, 1.0, 0.0]);
    SceneDescription {
        default_scene: Some(0),
        scenes: vec![Scene {
            node_indices: vec![0],
        }],
        nodes: vec![node(Some(0), vec![])],
        meshes: vec![Mesh {
            primitives: vec![
                primitive(&[("POSITION", 0)], Some(1), None),
                primitive(&[("POSITION", 2)], None, None),
            ],
        }],
        accessors: vec![
            positions_a,
            accessor(1, 2, ComponentType::UnsignedShort, AccessorKind::Scalar, 3),
            accessor(2, 0, ComponentType::Float, AccessorKind::Vec3, 3),
        ],
        buffer_views: vec![
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 36,
                byte_stride: 0,
            },
            BufferView {
                buffer: 0,
                byte_offset: 36,
                byte_length: 8,
                byte_stride: 0,
            },
            BufferView {
                buffer: 0,
                byte_offset: 44,
                byte_length: 36,
                byte_stride: 0,
            },
        ],
        buffers: vec![vec![0; 80]],
        ..Default::default()
    }
}

/// A translated root node whose child draws one indexed primitive with
/// interleaved POSITION, NORMAL and TEXCOORD_0, using a material that has
/// base color and emissive textures but no others.
pub fn textured_scene() -> SceneDescription {
    SceneDescription {
        default_scene: Some(0),
        scenes: vec![Scene {
            node_indices: vec![0],
        }],
        nodes: vec![
            Node {
                mesh_index: None,
                child_node_indices: vec![1],
                transform: NodeTransform::Trs {
                    translation: Vec3::new(0.0, 0.0, -5.0),
                    rotation: glam::Quat::IDENTITY,
                    scale: Vec3::ONE,
                },
            },
            node(Some(0), vec![]),
        ],
        meshes: vec![Mesh {
            primitives: vec![primitive(
                &[("POSITION", 1), ("NORMAL", 2), ("TEXCOORD_0", 3)],
                Some(0),
                Some(0),
            )],
        }],
        materials: vec![Material {
            base_color_factor: Vec4::new(0.5, 0.25, 1.0, 1.0),
            base_color_texture: Some(TextureRef {
                index: 0,
                tex_coord: 0,
            }),
            metallic_factor: 0.75,
            roughness_factor: 0.5,
            emissive_factor: Vec3::new(1.0, 0.5, 0.0),
            emissive_texture: Some(TextureRef {
                index: 1,
                tex_coord: 0,
            }),
            occlusion_strength: 0.25,
            normal_scale: 2.0,
            ..Default::default()
        }],
        textures: vec![
            Texture {
                source: Some(0),
                sampler: None,
            },
            Texture {
                source: Some(0),
                sampler: None,
            },
        ],
        images: vec![Image {
            width: 2,
            height: 2,
            pixels: vec![0x80; 16],
        }],
        accessors: vec![
            accessor(0, 0, ComponentType::UnsignedShort, AccessorKind::Scalar, 3),
            accessor(1, 0, ComponentType::Float, AccessorKind::Vec3, 3),
            accessor(1, 12, ComponentType::Float, AccessorKind::Vec3, 3),
            accessor(1, 24, ComponentType::Float, AccessorKind::Vec2, 3),
        ],
        buffer_views: vec![
            BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 8,
                byte_stride: 0,
            },
            BufferView {
                buffer: 0,
                byte_offset: 8,
                byte_length: 96,
                byte_stride: 32,
            },
        ],
        buffers: vec![vec![0; 104]],
        ..Default::default()
    }
}
