use std::path::Path;

use anyhow::{anyhow, Context};
use image::RgbImage;

use crate::renderer::device::Device;

/// Runs `draw` into an offscreen framebuffer of the given size and reads the
/// result back as an image with the top row first. The default framebuffer
/// is bound again afterwards.
pub fn capture<D: Device, T>(
    device: &mut D,
    width: u32,
    height: u32,
    draw: impl FnOnce(&mut D) -> anyhow::Result<T>,
) -> anyhow::Result<(T, RgbImage)> {
    let framebuffer = device.create_framebuffer(width, height, true);
    device.bind_framebuffer(Some(&framebuffer));
    device.viewport(framebuffer.width, framebuffer.height);
    let result = draw(device);
    let pixels = result
        .is_ok()
        .then(|| device.read_pixels_rgb(framebuffer.width, framebuffer.height));
    device.bind_framebuffer(None);
    device.delete_framebuffer(framebuffer);

    let output = result?;
    let mut image = RgbImage::from_raw(width, height, pixels.unwrap_or_default())
        .ok_or_else(|| anyhow!("read back fewer pixels than a {width}x{height} image has"))?;
    // GL rows start at the bottom.
    image::imageops::flip_vertical_in_place(&mut image);
    Ok((output, image))
}

pub fn write_png(image: &RgbImage, path: &Path) -> anyhow::Result<()> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("could not write {}", path.display()))?;
    log::info!("wrote {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}
