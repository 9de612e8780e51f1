use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use glam::Vec3;

use crate::camera::Camera;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "gltf-viewer")]
#[command(about = "Views glTF 2.0 scenes with PBR shading and an optional environment map")]
pub struct ViewerConfig {
    /// Path to a .gltf or .glb file
    pub scene: PathBuf,

    /// Equirectangular panorama (.hdr, .png or .jpg) for the skybox and reflections
    #[arg(long = "env", value_name = "PANORAMA")]
    pub environment: Option<PathBuf>,

    /// Render one frame into this PNG file instead of opening a window
    #[arg(long, value_name = "PNG")]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "WIDTHxHEIGHT", default_value = "1280x720", value_parser = parse_size)]
    pub size: WindowSize,

    /// Starting camera, as printed with P. Derived from the scene bounds if not given
    #[arg(
        long,
        value_name = "EX,EY,EZ,CX,CY,CZ,UX,UY,UZ",
        allow_hyphen_values = true,
        value_parser = parse_lookat
    )]
    pub lookat: Option<Camera>,

    /// Angle between the world light and the up axis, in radians
    #[arg(long, value_name = "RADIANS", default_value_t = 2.0, allow_negative_numbers = true)]
    pub light_vertical: f32,

    /// Angle of the world light around the up axis, in radians
    #[arg(long, value_name = "RADIANS", default_value_t = 1.55, allow_negative_numbers = true)]
    pub light_horizontal: f32,

    /// Light color, components above 1 make it brighter
    #[arg(long, value_name = "R,G,B", default_value = "1,1,1", value_parser = parse_radiance)]
    pub light_radiance: Vec3,

    /// Start with the light fixed in the world instead of shining from the camera
    #[arg(long)]
    pub world_light: bool,
}

fn parse_size(size: &str) -> anyhow::Result<WindowSize> {
    let (width, height) = size
        .split_once('x')
        .with_context(|| format!("size {size:?} is not of the form WIDTHxHEIGHT"))?;
    let width = width.parse::<u32>().with_context(|| format!("invalid width in {size:?}"))?;
    let height = height.parse::<u32>().with_context(|| format!("invalid height in {size:?}"))?;
    if width == 0 || height == 0 {
        bail!("size {size:?} has no pixels");
    }
    Ok(WindowSize { width, height })
}

fn parse_floats(values: &str, expected: usize) -> anyhow::Result<Vec<f32>> {
    let numbers = values
        .split(',')
        .map(|n| n.trim().parse::<f32>())
        .collect::<Result<Vec<f32>, _>>()
        .with_context(|| format!("{values:?} has a value that is not a number"))?;
    if numbers.len() != expected {
        bail!("expected {expected} comma separated numbers, got {}", numbers.len());
    }
    Ok(numbers)
}

fn parse_lookat(lookat: &str) -> anyhow::Result<Camera> {
    let numbers = parse_floats(lookat, 9)?;
    let camera = Camera::new(
        Vec3::from_slice(&numbers[0..3]),
        Vec3::from_slice(&numbers[3..6]),
        Vec3::from_slice(&numbers[6..9]),
    );
    let front = camera.center - camera.eye;
    if front.cross(camera.up).length_squared() == 0.0 {
        bail!("eye and center must differ, and up must not point along the view");
    }
    Ok(camera)
}

fn parse_radiance(radiance: &str) -> anyhow::Result<Vec3> {
    let radiance = Vec3::from_slice(&parse_floats(radiance, 3)?);
    if radiance.min_element() < 0.0 || !radiance.is_finite() {
        bail!("light radiance can't be negative");
    }
    Ok(radiance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ViewerConfig, clap::Error> {
        ViewerConfig::try_parse_from(std::iter::once("gltf-viewer").chain(args.iter().copied()))
    }

    #[test]
    fn scene_only_uses_defaults() {
        let config = parse(&["model.gltf"]).unwrap();
        assert_eq!(config.scene, PathBuf::from("model.gltf"));
        assert_eq!(
            config.size,
            WindowSize {
                width: 1280,
                height: 720
            }
        );
        assert_eq!(config.environment, None);
        assert_eq!(config.output, None);
        assert_eq!(config.lookat, None);
        assert_eq!((config.light_vertical, config.light_horizontal), (2.0, 1.55));
        assert_eq!(config.light_radiance, Vec3::ONE);
        assert!(!config.world_light);
    }

    #[test]
    fn every_option_is_read() {
        let config = parse(&[
            "--env",
            "sky.hdr",
            "model.glb",
            "--output",
            "out.png",
            "--size",
            "640x480",
            "--lookat",
            "0,1,5,0,0,0,0,1,0",
            "--light-vertical",
            "0.5",
            "--light-horizontal",
            "-1.25",
            "--light-radiance",
            "2,2,1.5",
            "--world-light",
        ])
        .unwrap();
        assert_eq!(config.scene, PathBuf::from("model.glb"));
        assert_eq!(config.environment, Some(PathBuf::from("sky.hdr")));
        assert_eq!(config.output, Some(PathBuf::from("out.png")));
        assert_eq!(
            config.size,
            WindowSize {
                width: 640,
                height: 480
            }
        );
        assert_eq!(
            config.lookat,
            Some(Camera::new(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y))
        );
        assert_eq!((config.light_vertical, config.light_horizontal), (0.5, -1.25));
        assert_eq!(config.light_radiance, Vec3::new(2.0, 2.0, 1.5));
        assert!(config.world_light);
    }

    #[test]
    fn lookat_accepts_negative_coordinates() {
        let config = parse(&["model.gltf", "--lookat", "-1,2,-3,0,0,0,0,1,0"]).unwrap();
        assert_eq!(config.lookat.unwrap().eye, Vec3::new(-1.0, 2.0, -3.0));
    }

    #[test]
    fn lookat_round_trips_through_the_printed_argument() {
        let camera = Camera::new(Vec3::new(1.5, -2.0, 3.25), Vec3::new(0.0, 0.5, 0.0), Vec3::Y);
        let printed = camera.lookat_argument();
        let value = printed.strip_prefix("--lookat ").unwrap();
        assert_eq!(parse_lookat(value).unwrap(), camera);
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["a.gltf", "b.gltf"]).is_err());
        assert!(parse(&["a.gltf", "--size"]).is_err());
        assert!(parse(&["a.gltf", "--size", "640"]).is_err());
        assert!(parse(&["a.gltf", "--size", "0x480"]).is_err());
        assert!(parse(&["a.gltf", "--lookat", "1,2,3"]).is_err());
        assert!(parse(&["a.gltf", "--lookat", "0,0,0,0,0,0,0,1,0"]).is_err());
        assert!(parse(&["a.gltf", "--lookat", "0,1,0,0,0,0,0,1,0"]).is_err());
        assert!(parse(&["a.gltf", "--light-radiance", "1,-1,1"]).is_err());
        assert!(parse(&["a.gltf", "--light-radiance", "1,1"]).is_err());
        assert!(parse(&["a.gltf", "--fullscreen"]).is_err());
    }

    #[test]
    fn validation_messages_reach_the_user() {
        let error = parse(&["a.gltf", "--size", "0x480"]).unwrap_err().to_string();
        assert!(error.contains("has no pixels"), "{error}");
    }
}
