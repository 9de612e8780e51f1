use crate::renderer::device::{Device, Handle};
use crate::renderer::gl;
use crate::renderer::gltf::{Primitive, SceneDescription, SceneError};

/// The parameters of the single draw call a primitive turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Indexed {
        mode: gl::types::GLenum,
        count: i32,
        index_type: gl::types::GLenum,
        /// Offset of the first index in the element buffer.
        byte_offset: usize,
    },
    Arrays {
        mode: gl::types::GLenum,
        count: i32,
    },
}

impl DrawCall {
    /// Indexed primitives draw their index accessor, others draw as many
    /// vertices as their first attribute's accessor holds. A primitive with
    /// no attributes at all draws nothing.
    pub fn for_primitive(scene: &SceneDescription, primitive: &Primitive) -> Result<Option<DrawCall>, SceneError> {
        let mode = primitive.mode.gl_enum();
        if let Some(indices) = primitive.indices {
            let accessor = scene.accessor(indices)?;
            return Ok(Some(DrawCall::Indexed {
                mode,
                count: accessor.count as i32,
                index_type: accessor.component_type.gl_enum(),
                byte_offset: scene.accessor_byte_offset(indices)?,
            }));
        }
        match primitive.first_attribute() {
            Some(first) => Ok(Some(DrawCall::Arrays {
                mode,
                count: scene.accessor(first)?.count as i32,
            })),
            None => Ok(None),
        }
    }

    pub fn issue(self, device: &mut impl Device, vertex_array: Handle) {
        match self {
            DrawCall::Indexed {
                mode,
                count,
                index_type,
                byte_offset,
            } => device.draw_elements(vertex_array, mode, count, index_type, byte_offset),
            DrawCall::Arrays { mode, count } => device.draw_arrays(vertex_array, mode, count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::gltf::Topology;
    use crate::renderer::test_scenes;

    #[test]
    fn indexed_draw_uses_index_accessor() {
        let scene = test_scenes::two_primitive_scene();
        let primitive = &scene.meshes[0].primitives[0];
        let (accessor, view) = scene.accessor_view(primitive.indices.unwrap()).unwrap();
        assert_eq!(
            DrawCall::for_primitive(&scene, primitive).unwrap(),
            Some(DrawCall::Indexed {
                mode: gl::TRIANGLES,
                count: 3,
                index_type: gl::UNSIGNED_SHORT,
                byte_offset: view.byte_offset + accessor.byte_offset,
            })
        );
        assert_eq!(view.byte_offset + accessor.byte_offset, 38);
    }

    #[test]
    fn array_draw_counts_first_attribute_by_name() {
        let mut scene = test_scenes::two_primitive_scene();
        let mut normals = scene.accessors[2].clone();
        normals.count = 2;
        scene.accessors.push(normals);
        let normal_accessor = scene.accessors.len() - 1;
        let primitive = &mut scene.meshes[0].primitives[1];
        primitive.attributes.insert("NORMAL".to_string(), normal_accessor);
        primitive.mode = Topology::TriangleStrip;
        let primitive = scene.meshes[0].primitives[1].clone();
        assert_eq!(
            DrawCall::for_primitive(&scene, &primitive).unwrap(),
            Some(DrawCall::Arrays {
                mode: gl::TRIANGLE_STRIP,
                count: 2,
            })
        );
    }

    #[test]
    fn primitive_without_attributes_draws_nothing() {
        let scene = test_scenes::two_primitive_scene();
        let mut primitive = scene.meshes[0].primitives[1].clone();
        primitive.attributes.clear();
        assert_eq!(DrawCall::for_primitive(&scene, &primitive).unwrap(), None);
    }

    #[test]
    fn index_accessor_out_of_range_fails() {
        let scene = test_scenes::two_primitive_scene();
        let mut primitive = scene.meshes[0].primitives[0].clone();
        primitive.indices = Some(99);
        assert!(matches!(
            DrawCall::for_primitive(&scene, &primitive),
            Err(SceneError::InvalidReference { kind: "accessor", index: 99, .. })
        ));
    }

    #[test]
    fn index_offsets_past_the_buffer_fail() {
        let mut scene = test_scenes::two_primitive_scene();
        let primitive = scene.meshes[0].primitives[0].clone();
        let indices = primitive.indices.unwrap();
        scene.accessors[indices].byte_offset = usize::MAX;
        assert_eq!(
            DrawCall::for_primitive(&scene, &primitive),
            Err(SceneError::AccessorOutOfBounds(indices))
        );
        scene.accessors[indices].byte_offset = 81;
        assert_eq!(
            DrawCall::for_primitive(&scene, &primitive),
            Err(SceneError::AccessorOutOfBounds(indices))
        );
    }
}
