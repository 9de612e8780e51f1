use glam::Mat4;
use image::{Rgb32FImage, RgbImage};
use sdl2::VideoSubsystem;

pub mod device;
pub mod draw_calls;
pub mod environment;
mod gl;
pub mod gltf;
pub mod material;
pub mod readback;
pub mod resources;
#[cfg(test)]
mod test_scenes;
pub mod traversal;

use device::{Device, Handle};
use environment::{EnvironmentCube, UnitCube};
use gl::GlDevice;
use gltf::{Programs, SceneDescription, SceneError};
use resources::SceneResources;
use traversal::{DrawStats, Frame, Light};

/// Vertical field of view of the scene camera.
const FIELD_OF_VIEW_DEGREES: f32 = 70.0;

/// The projection for a scene whose bounds have a diagonal of
/// `max_distance`, keeping the whole scene between the clip planes.
pub fn scene_projection(aspect_ratio: f32, max_distance: f32) -> Mat4 {
    Mat4::perspective_rh_gl(
        FIELD_OF_VIEW_DEGREES.to_radians(),
        aspect_ratio,
        0.001 * max_distance,
        1.5 * max_distance,
    )
}

/// Every GPU object drawn each frame, released together.
struct GpuScene {
    programs: Programs,
    resources: SceneResources,
    unit_cube: UnitCube,
    environment: Option<EnvironmentCube>,
}

impl GpuScene {
    /// Takes ownership of `programs`, which are released again if the scene
    /// can't be uploaded.
    fn build(
        device: &mut impl Device,
        programs: Programs,
        scene: &SceneDescription,
        panorama: Option<Handle>,
    ) -> Result<GpuScene, SceneError> {
        let resources = match SceneResources::build(device, scene) {
            Ok(resources) => resources,
            Err(err) => {
                programs.release(device);
                return Err(err);
            }
        };
        let unit_cube = UnitCube::new(device);
        let environment =
            environment::build_environment_cube(device, panorama, &programs.equirectangular, &unit_cube);
        if let Some(environment) = &environment {
            log::info!(
                "environment cube: {size}x{size} {:?} faces",
                environment.format,
                size = environment.face_size,
            );
        }
        Ok(GpuScene {
            programs,
            resources,
            unit_cube,
            environment,
        })
    }

    fn draw(
        &self,
        device: &mut impl Device,
        scene: &SceneDescription,
        view: Mat4,
        light: Light,
        projection: Mat4,
    ) -> Result<DrawStats, SceneError> {
        let frame = Frame {
            view,
            projection,
            light,
            environment: self.environment.as_ref(),
        };
        device.clear(traversal::CLEAR_COLOR);
        traversal::draw_scene(device, scene, &self.resources, &self.programs, &self.unit_cube, &frame)
    }

    fn release(self, device: &mut impl Device) {
        if let Some(environment) = self.environment {
            environment.release(device);
        }
        self.unit_cube.release(device);
        self.resources.release(device);
        self.programs.release(device);
    }
}

/// Owns every GPU object of the viewer: programs, the scene's resources and
/// the environment cube. All of it is released when the renderer is dropped.
pub struct Renderer {
    device: GlDevice,
    gpu_scene: Option<GpuScene>,
    max_distance: f32,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Uploads the scene and, if there's a panorama, prefilters it into the
    /// environment cube. The GL context must be current.
    pub fn new(
        video: &VideoSubsystem,
        (width, height): (u32, u32),
        scene: &SceneDescription,
        panorama: Option<&Rgb32FImage>,
        max_distance: f32,
    ) -> anyhow::Result<Renderer> {
        let mut device = GlDevice::load(video);
        let programs = Programs::create()?;
        let panorama_texture = panorama.map(|panorama| environment::upload_panorama(&mut device, panorama));
        let gpu_scene = GpuScene::build(&mut device, programs, scene, panorama_texture);
        if let Some(texture) = panorama_texture {
            device.delete_textures(&[texture]);
        }

        Ok(Renderer {
            device,
            gpu_scene: Some(gpu_scene?),
            max_distance,
            width,
            height,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn projection(&self, width: u32, height: u32) -> Mat4 {
        scene_projection(width as f32 / height.max(1) as f32, self.max_distance)
    }

    /// Draws the scene into the window's framebuffer.
    pub fn render(&mut self, scene: &SceneDescription, view: Mat4, light: Light) -> Result<DrawStats, SceneError> {
        let projection = self.projection(self.width, self.height);
        let Some(gpu_scene) = &self.gpu_scene else {
            return Ok(DrawStats::default());
        };
        self.device.bind_framebuffer(None);
        self.device.viewport(self.width, self.height);
        gpu_scene.draw(&mut self.device, scene, view, light, projection)
    }

    /// Draws one frame offscreen and returns it as an image, top row first.
    pub fn render_to_image(
        &mut self,
        scene: &SceneDescription,
        view: Mat4,
        light: Light,
        (width, height): (u32, u32),
    ) -> anyhow::Result<RgbImage> {
        let projection = self.projection(width, height);
        let Some(gpu_scene) = &self.gpu_scene else {
            anyhow::bail!("the renderer has already released its resources");
        };
        let (stats, image) = readback::capture(&mut self.device, width, height, |device| {
            Ok(gpu_scene.draw(device, scene, view, light, projection)?)
        })?;
        log::debug!("offscreen frame: {stats:?}");
        Ok(image)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some(gpu_scene) = self.gpu_scene.take() {
            gpu_scene.release(&mut self.device);
        }
    }
}
