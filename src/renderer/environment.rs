//! Projects an equirectangular panorama onto the six faces of a cube map,
//! which is then drawn as the skybox and sampled for reflections.

use std::path::Path;

use anyhow::Context;
use glam::{Mat4, Vec3, Vec4};
use image::Rgb32FImage;

use crate::renderer::device::{
    ColorFormat, DepthState, Device, Handle, PixelData, PixelFormat, SamplerState, TextureTarget, Uniform,
    VertexAttribute,
};
use crate::renderer::gl;
use crate::renderer::gltf::{self, CubeProgram};

pub const FACE_SIZE: u32 = 512;

/// Look direction and up vector of each cube face, in GL face order.
const CAPTURE_DIRECTIONS: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// The view matrices looking from the origin through each cube face.
pub fn capture_views() -> [Mat4; 6] {
    CAPTURE_DIRECTIONS.map(|(direction, up)| Mat4::look_at_rh(Vec3::ZERO, direction, up))
}

pub fn capture_projection() -> Mat4 {
    Mat4::perspective_rh_gl(90f32.to_radians(), 1.0, 0.1, 10.0)
}

/// A 2x2x2 cube around the origin, as 36 unindexed positions.
pub struct UnitCube {
    buffer: Handle,
    vertex_array: Handle,
}

impl UnitCube {
    pub fn new(device: &mut impl Device) -> UnitCube {
        const CORNERS: [[f32; 3]; 8] = [
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ];
        const FACES: [[usize; 4]; 6] = [
            [1, 5, 6, 2],
            [4, 0, 3, 7],
            [3, 2, 6, 7],
            [4, 5, 1, 0],
            [5, 4, 7, 6],
            [0, 1, 2, 3],
        ];
        let positions = FACES
            .iter()
            .flat_map(|&[a, b, c, d]| [a, b, c, a, c, d])
            .map(|corner| CORNERS[corner])
            .collect::<Vec<[f32; 3]>>();
        let buffer = device.create_buffer(bytemuck::cast_slice(&positions));
        let vertex_array = device.create_vertex_array(
            &[VertexAttribute {
                slot: gltf::ATTR_LOC_POSITION,
                buffer,
                components: 3,
                component_type: gl::FLOAT,
                normalized: false,
                stride: 0,
                byte_offset: 0,
            }],
            None,
        );
        UnitCube { buffer, vertex_array }
    }

    pub fn draw(&self, device: &mut impl Device) {
        device.draw_arrays(self.vertex_array, gl::TRIANGLES, 36);
    }

    pub fn release(self, device: &mut impl Device) {
        device.delete_vertex_arrays(&[self.vertex_array]);
        device.delete_buffers(&[self.buffer]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentCube {
    pub texture: Handle,
    pub face_size: u32,
    pub format: ColorFormat,
}

impl EnvironmentCube {
    pub fn release(self, device: &mut impl Device) {
        device.delete_textures(&[self.texture]);
    }
}

/// Renders the equirectangular `source` texture into a new cube map, one
/// offscreen pass per face. Returns None without a source, or if no cube
/// format is renderable on this device.
pub fn build_environment_cube(
    device: &mut impl Device,
    source: Option<Handle>,
    program: &CubeProgram,
    cube: &UnitCube,
) -> Option<EnvironmentCube> {
    let source = source?;
    let framebuffer = device.create_framebuffer(FACE_SIZE, FACE_SIZE, false);

    let mut environment = None;
    for format in [ColorFormat::Rgba16F, ColorFormat::Rgba8] {
        let texture = device.create_cube_texture(FACE_SIZE, format);
        if device.attach_cube_face(&framebuffer, texture, 0) {
            environment = Some(EnvironmentCube {
                texture,
                face_size: FACE_SIZE,
                format,
            });
            break;
        }
        log::warn!("{format:?} cube faces are not renderable on this device");
        device.delete_textures(&[texture]);
    }

    if let Some(environment) = environment {
        device.viewport(framebuffer.width, framebuffer.height);
        device.set_depth_state(DepthState::LessEqual);
        device.use_program(program.program);
        device.bind_texture(0, TextureTarget::Texture2d, Some(source));
        device.uniform(program.map, Uniform::Int(0));
        device.uniform(program.projection_matrix, Uniform::Mat4(capture_projection()));
        for (face, view) in capture_views().into_iter().enumerate() {
            if face > 0 {
                device.attach_cube_face(&framebuffer, environment.texture, face);
            }
            device.uniform(program.view_matrix, Uniform::Mat4(view));
            device.clear(Vec4::ZERO);
            cube.draw(device);
        }
        log::debug!(
            "rendered {size}x{size} environment cube as {:?}",
            environment.format,
            size = environment.face_size,
        );
    } else {
        log::warn!("no renderable cube map format, rendering without an environment");
    }

    device.bind_framebuffer(None);
    device.delete_framebuffer(framebuffer);
    environment
}

pub fn load_panorama(path: &Path) -> anyhow::Result<Rgb32FImage> {
    let panorama = image::open(path).with_context(|| format!("could not decode panorama {}", path.display()))?;
    Ok(panorama.into_rgb32f())
}

/// Uploads the panorama bottom row first, matching GL's texture origin.
pub fn upload_panorama(device: &mut impl Device, panorama: &Rgb32FImage) -> Handle {
    let flipped = image::imageops::flip_vertical(panorama);
    let pixels = PixelData {
        width: flipped.width(),
        height: flipped.height(),
        format: PixelFormat::RgbF32,
        pixels: bytemuck::cast_slice(flipped.as_raw()),
    };
    device.create_texture_2d(&pixels, &SamplerState::LINEAR_CLAMP)
}

/// CPU version of the prefilter, kept as the reference the GPU passes are
/// checked against.
#[cfg(test)]
pub mod reference {
    use std::f32::consts::PI;

    use glam::{Vec2, Vec3};
    use image::Rgb32FImage;

    use super::capture_views;

    /// Maps a unit direction to equirectangular texture coordinates, with v = 0
    /// at the bottom of the panorama. The equirectangular shader does the same.
    pub fn equirectangular_uv(direction: Vec3) -> Vec2 {
        Vec2::new(
            direction.z.atan2(direction.x) / (2.0 * PI) + 0.5,
            direction.y.clamp(-1.0, 1.0).asin() / PI + 0.5,
        )
    }

    /// Computes the same six faces `build_environment_cube` renders, on the
    /// CPU. Rows of each face go bottom to top, like the GPU's.
    pub fn prefilter_on_cpu(panorama: &Rgb32FImage, face_size: u32) -> [Rgb32FImage; 6] {
        let inverse_views = capture_views().map(|view| view.inverse());
        inverse_views.map(|to_world| {
            Rgb32FImage::from_fn(face_size, face_size, |x, y| {
                let ndc_x = (x as f32 + 0.5) / face_size as f32 * 2.0 - 1.0;
                let ndc_y = (y as f32 + 0.5) / face_size as f32 * 2.0 - 1.0;
                // A 90 degree frustum reaches one unit sideways per unit forward.
                let direction = to_world.transform_vector3(Vec3::new(ndc_x, ndc_y, -1.0));
                let uv = equirectangular_uv(direction.normalize());
                image::Rgb(sample_bilinear(panorama, uv).to_array())
            })
        })
    }

    /// Wraps horizontally and clamps vertically, like the panorama's sampler
    /// does at the seam once the cube is sampled with linear filtering.
    fn sample_bilinear(panorama: &Rgb32FImage, uv: Vec2) -> Vec3 {
        let (width, height) = (panorama.width() as i64, panorama.height() as i64);
        let fx = uv.x * width as f32 - 0.5;
        let fy = (1.0 - uv.y) * height as f32 - 0.5;
        let (x0, y0) = (fx.floor(), fy.floor());
        let (tx, ty) = (fx - x0, fy - y0);
        let texel = |x: i64, y: i64| {
            let x = x.rem_euclid(width) as u32;
            let y = y.clamp(0, height - 1) as u32;
            Vec3::from_array(panorama.get_pixel(x, y).0)
        };
        let (x0, y0) = (x0 as i64, y0 as i64);
        let top = texel(x0, y0).lerp(texel(x0 + 1, y0), tx);
        let bottom = texel(x0, y0 + 1).lerp(texel(x0 + 1, y0 + 1), tx);
        top.lerp(bottom, ty)
    }
}
