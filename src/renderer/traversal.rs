use glam::{Mat4, Vec3, Vec4};

use crate::renderer::device::{DepthState, Device, TextureTarget, Uniform};
use crate::renderer::draw_calls::DrawCall;
use crate::renderer::environment::{EnvironmentCube, UnitCube};
use crate::renderer::gltf::{self, Programs, SceneDescription, SceneError};
use crate::renderer::material::MaterialBinding;
use crate::renderer::resources::SceneResources;

/// A directional light, with the direction pointing towards the light in
/// view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub direction: Vec3,
    pub intensity: Vec3,
}

impl Default for Light {
    /// Shining from the camera.
    fn default() -> Self {
        Light::from_camera(Vec3::ONE)
    }
}

impl Light {
    pub fn from_camera(intensity: Vec3) -> Light {
        Light {
            direction: Vec3::Z,
            intensity,
        }
    }

    /// A light shining from a fixed world space direction, seen through
    /// `view`.
    pub fn from_world_direction(view: Mat4, direction: Vec3, intensity: Vec3) -> Light {
        Light {
            direction: view.transform_vector3(direction).normalize_or_zero(),
            intensity,
        }
    }
}

/// The world space direction towards a light `vertical` radians away from
/// the +Y axis and `horizontal` radians around it, starting from +X.
pub fn light_direction_from_angles(vertical: f32, horizontal: f32) -> Vec3 {
    Vec3::new(
        vertical.sin() * horizontal.cos(),
        vertical.cos(),
        vertical.sin() * horizontal.sin(),
    )
}

/// The per-frame inputs of [`draw_scene`].
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub view: Mat4,
    pub projection: Mat4,
    pub light: Light,
    pub environment: Option<&'a EnvironmentCube>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub nodes_visited: usize,
    pub draw_calls: usize,
}

/// Draws the skybox, if there's an environment, and then the default scene's
/// node hierarchy depth-first, children in declaration order.
pub fn draw_scene(
    device: &mut impl Device,
    scene: &SceneDescription,
    resources: &SceneResources,
    programs: &Programs,
    unit_cube: &UnitCube,
    frame: &Frame,
) -> Result<DrawStats, SceneError> {
    if let Some(environment) = frame.environment {
        let skybox = &programs.skybox;
        device.set_depth_state(DepthState::LessEqualReadOnly);
        device.use_program(skybox.program);
        device.bind_texture(
            gltf::TEXTURE_UNIT_ENVIRONMENT,
            TextureTarget::CubeMap,
            Some(environment.texture),
        );
        device.uniform(skybox.map, Uniform::Int(gltf::TEXTURE_UNIT_ENVIRONMENT as i32));
        device.uniform(skybox.projection_matrix, Uniform::Mat4(frame.projection));
        device.uniform(skybox.view_matrix, Uniform::Mat4(frame.view));
        unit_cube.draw(device);
    }

    let pbr = &programs.pbr;
    let uniforms = &pbr.uniforms;
    device.set_depth_state(DepthState::LessEqual);
    device.use_program(pbr.program);
    device.uniform(uniforms.light_direction, Uniform::Vec3(frame.light.direction.normalize_or_zero()));
    device.uniform(uniforms.light_intensity, Uniform::Vec3(frame.light.intensity));
    match frame.environment {
        Some(environment) => {
            device.bind_texture(
                gltf::TEXTURE_UNIT_ENVIRONMENT,
                TextureTarget::CubeMap,
                Some(environment.texture),
            );
            device.uniform(uniforms.environment_map, Uniform::Int(gltf::TEXTURE_UNIT_ENVIRONMENT as i32));
            device.uniform(uniforms.has_environment_map, Uniform::Int(1));
            device.uniform(uniforms.view_to_world_matrix, Uniform::Mat4(frame.view.inverse()));
        }
        None => device.uniform(uniforms.has_environment_map, Uniform::Int(0)),
    }

    let mut stats = DrawStats::default();
    let mut node_stack = (scene.default_root_nodes()?.iter().rev())
        .map(|&node_index| (Mat4::IDENTITY, node_index))
        .collect::<Vec<_>>();
    let mut visited = vec![false; scene.nodes.len()];
    while let Some((parent_world, node_index)) = node_stack.pop() {
        let node = scene.node(node_index)?;
        if std::mem::replace(&mut visited[node_index], true) {
            return Err(SceneError::NodeRevisited(node_index));
        }
        stats.nodes_visited += 1;
        let world = parent_world * node.transform.local_matrix();

        if let Some(mesh_index) = node.mesh_index {
            let mesh = scene.mesh(mesh_index)?;
            let vertex_arrays = resources.mesh_vertex_arrays(mesh_index)?;
            let model_view = frame.view * world;
            let model_view_proj = frame.projection * model_view;
            let normal_matrix = model_view.inverse().transpose();
            device.uniform(uniforms.model_view_matrix, Uniform::Mat4(model_view));
            device.uniform(uniforms.model_view_proj_matrix, Uniform::Mat4(model_view_proj));
            device.uniform(uniforms.normal_matrix, Uniform::Mat4(normal_matrix));

            for (primitive, &vertex_array) in mesh.primitives.iter().zip(vertex_arrays) {
                let Some(draw_call) = DrawCall::for_primitive(scene, primitive)? else {
                    continue;
                };
                MaterialBinding::resolve(scene, resources, primitive.material_index)?.apply(device, uniforms);
                draw_call.issue(device, vertex_array);
                stats.draw_calls += 1;
            }
        }

        for &child_index in node.child_node_indices.iter().rev() {
            node_stack.push((world, child_index));
        }
    }
    Ok(stats)
}

/// Clear color behind the scene when there's no skybox.
pub const CLEAR_COLOR: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::device::recording::{Command, RecordingDevice};
    use crate::renderer::device::ColorFormat;
    use crate::renderer::gltf::{CubeProgram, Mesh, PbrProgram, PbrUniforms};
    use crate::renderer::test_scenes;

    const MVP: i32 = 20;
    const MODEL_VIEW: i32 = 21;
    const NORMAL_MATRIX: i32 = 22;
    const BASE_COLOR_FACTOR: i32 = 11;
    const METALLIC_FACTOR: i32 = 13;
    const HAS_ENVIRONMENT: i32 = 30;

    fn programs() -> Programs {
        let cube_program = |program| CubeProgram {
            program,
            map: Some(0),
            projection_matrix: Some(1),
            view_matrix: Some(2),
        };
        Programs {
            pbr: PbrProgram {
                program: 100,
                uniforms: PbrUniforms {
                    model_view_proj_matrix: Some(MVP),
                    model_view_matrix: Some(MODEL_VIEW),
                    normal_matrix: Some(NORMAL_MATRIX),
                    base_color_factor: Some(BASE_COLOR_FACTOR),
                    metallic_factor: Some(METALLIC_FACTOR),
                    has_environment_map: Some(HAS_ENVIRONMENT),
                    ..Default::default()
                },
            },
            skybox: cube_program(101),
            equirectangular: cube_program(102),
        }
    }

    fn frame() -> Frame<'static> {
        Frame {
            view: Mat4::look_at_rh(Vec3::new(0.0, 1.0, 3.0), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh_gl(1.2, 1.5, 0.01, 100.0),
            light: Light::default(),
            environment: None,
        }
    }

    fn draw(scene: &SceneDescription, frame: &Frame) -> (RecordingDevice, SceneResources, Result<DrawStats, SceneError>) {
        let mut device = RecordingDevice::new();
        let resources = SceneResources::build(&mut device, scene).unwrap();
        let unit_cube = UnitCube::new(&mut device);
        device.commands.clear();
        let result = draw_scene(&mut device, scene, &resources, &programs(), &unit_cube, frame);
        (device, resources, result)
    }

    #[test]
    fn world_light_turns_with_the_view() {
        let radiance = Vec3::new(2.0, 1.0, 0.5);
        let view = Mat4::look_at_rh(Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO, Vec3::Y);
        let light = Light::from_world_direction(view, Vec3::new(2.0, 0.0, 0.0), radiance);
        assert!(light.direction.abs_diff_eq(Vec3::Z, 1e-6));
        assert_eq!(light.intensity, radiance);

        let sideways = light_direction_from_angles(std::f32::consts::FRAC_PI_2, 0.0);
        let light = Light::from_world_direction(view, sideways, radiance);
        assert!(light.direction.abs_diff_eq(Vec3::Z, 1e-6));
        let overhead = Light::from_world_direction(view, light_direction_from_angles(0.0, 1.0), Vec3::ONE);
        assert!(overhead.direction.abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn light_angles_cover_the_sphere() {
        use std::f32::consts::{FRAC_PI_2, PI};
        assert!(light_direction_from_angles(0.0, 2.0).abs_diff_eq(Vec3::Y, 1e-6));
        assert!(light_direction_from_angles(PI, 0.0).abs_diff_eq(Vec3::NEG_Y, 1e-6));
        assert!(light_direction_from_angles(FRAC_PI_2, FRAC_PI_2).abs_diff_eq(Vec3::Z, 1e-6));
        let default = light_direction_from_angles(2.0, 1.55);
        assert!((default.length() - 1.0).abs() < 1e-6);
        assert!(default.y < 0.0 && default.z > 0.9);
    }

    #[test]
    fn camera_light_keeps_its_radiance() {
        let light = Light::from_camera(Vec3::new(0.5, 0.5, 2.0));
        assert_eq!(light.direction, Light::default().direction);
        assert_eq!(light.intensity, Vec3::new(0.5, 0.5, 2.0));
    }

    #[test]
    fn two_primitives_without_materials_draw_twice_with_defaults() {
        let scene = test_scenes::two_primitive_scene();
        let (device, resources, stats) = draw(&scene, &frame());
        assert_eq!(
            stats.unwrap(),
            DrawStats {
                nodes_visited: 1,
                draw_calls: 2,
            }
        );
        let draws = device.draw_positions();
        assert_eq!(draws.len(), 2);
        for &draw in &draws {
            assert_eq!(
                device.texture_before(draw, gltf::TEXTURE_UNIT_BASE_COLOR),
                Some((TextureTarget::Texture2d, Some(resources.white_texture)))
            );
            assert_eq!(device.uniform_before(draw, BASE_COLOR_FACTOR), Some(Uniform::Vec4(Vec4::ONE)));
            assert_eq!(device.uniform_before(draw, METALLIC_FACTOR), Some(Uniform::Float(0.0)));
        }
        assert_eq!(
            *device.draws()[0],
            Command::DrawElements {
                vertex_array: resources.vertex_arrays[0],
                mode: crate::renderer::gl::TRIANGLES,
                count: 3,
                index_type: crate::renderer::gl::UNSIGNED_SHORT,
                byte_offset: 38,
            }
        );
        assert_eq!(
            *device.draws()[1],
            Command::DrawArrays {
                vertex_array: resources.vertex_arrays[1],
                mode: crate::renderer::gl::TRIANGLES,
                count: 3,
            }
        );
    }

    #[test]
    fn node_matrices_compose_parent_transforms() {
        let scene = test_scenes::textured_scene();
        let frame = frame();
        let (device, _, stats) = draw(&scene, &frame);
        assert_eq!(stats.unwrap().nodes_visited, 2);
        let draw = device.draw_positions()[0];
        let model_view = frame.view * Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let Some(Uniform::Mat4(mvp)) = device.uniform_before(draw, MVP) else {
            panic!("no model-view-projection matrix");
        };
        assert!(mvp.abs_diff_eq(frame.projection * model_view, 1e-5));
        let Some(Uniform::Mat4(normal_matrix)) = device.uniform_before(draw, NORMAL_MATRIX) else {
            panic!("no normal matrix");
        };
        assert!(normal_matrix.abs_diff_eq(model_view.inverse().transpose(), 1e-5));
    }

    #[test]
    fn children_are_drawn_in_declaration_order() {
        let mut scene = test_scenes::two_primitive_scene();
        let primitives = scene.meshes[0].primitives.clone();
        scene.meshes = vec![
            Mesh {
                primitives: vec![primitives[0].clone()],
            },
            Mesh {
                primitives: vec![primitives[1].clone()],
            },
        ];
        scene.nodes = vec![
            test_scenes::node(None, vec![1, 2]),
            test_scenes::node(Some(1), vec![]),
            test_scenes::node(Some(0), vec![]),
        ];
        let (device, _, stats) = draw(&scene, &frame());
        assert_eq!(stats.unwrap().nodes_visited, 3);
        let draws = device.draws();
        assert!(matches!(draws[0], Command::DrawArrays { .. }));
        assert!(matches!(draws[1], Command::DrawElements { .. }));
    }

    #[test]
    fn cycles_and_shared_children_are_errors() {
        let mut scene = test_scenes::two_primitive_scene();
        scene.nodes = vec![
            test_scenes::node(None, vec![1]),
            test_scenes::node(Some(0), vec![0]),
        ];
        assert_eq!(draw(&scene, &frame()).2, Err(SceneError::NodeRevisited(0)));

        scene.scenes[0].node_indices = vec![0, 1];
        scene.nodes = vec![
            test_scenes::node(None, vec![2]),
            test_scenes::node(None, vec![2]),
            test_scenes::node(Some(0), vec![]),
        ];
        assert_eq!(draw(&scene, &frame()).2, Err(SceneError::NodeRevisited(2)));
    }

    #[test]
    fn out_of_range_mesh_is_an_error() {
        let mut scene = test_scenes::two_primitive_scene();
        scene.nodes[0].mesh_index = Some(3);
        assert!(matches!(
            draw(&scene, &frame()).2,
            Err(SceneError::InvalidReference { kind: "mesh", index: 3, .. })
        ));
    }

    #[test]
    fn scene_without_default_scene_draws_nothing() {
        let mut scene = test_scenes::two_primitive_scene();
        scene.default_scene = None;
        let (device, _, stats) = draw(&scene, &frame());
        assert_eq!(stats.unwrap(), DrawStats::default());
        assert!(device.draws().is_empty());
    }

    #[test]
    fn skybox_is_drawn_first_without_depth_writes() {
        let scene = test_scenes::two_primitive_scene();
        let environment = EnvironmentCube {
            texture: 77,
            face_size: 512,
            format: ColorFormat::Rgba16F,
        };
        let frame = Frame {
            environment: Some(&environment),
            ..frame()
        };
        let (device, _, stats) = draw(&scene, &frame);
        assert_eq!(stats.unwrap().draw_calls, 2);
        let draws = device.draw_positions();
        assert_eq!(draws.len(), 3);
        assert!(matches!(device.commands[draws[0]], Command::DrawArrays { count: 36, .. }));
        assert_eq!(device.commands[0], Command::DepthState(DepthState::LessEqualReadOnly));
        assert!(device.commands[..draws[0]].contains(&Command::UseProgram(101)));
        let scene_start = device
            .commands
            .iter()
            .position(|c| *c == Command::DepthState(DepthState::LessEqual))
            .unwrap();
        assert!(draws[0] < scene_start && scene_start < draws[1]);
        assert_eq!(device.uniform_before(draws[1], HAS_ENVIRONMENT), Some(Uniform::Int(1)));
        assert_eq!(
            device.texture_before(draws[1], gltf::TEXTURE_UNIT_ENVIRONMENT),
            Some((TextureTarget::CubeMap, Some(77)))
        );
    }
}
