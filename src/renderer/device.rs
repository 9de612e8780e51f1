//! The explicit draw context every GPU-facing function takes. [`GlDevice`]
//! implements it with OpenGL ES 3.0 calls, tests implement it with a recorder.
//!
//! [`GlDevice`]: crate::renderer::gl::GlDevice

use crate::renderer::gl;
use crate::renderer::gltf::{Filter, Sampler, Wrap};
use glam::{Mat4, Vec3, Vec4};

pub type Handle = gl::types::GLuint;
pub type UniformLocation = gl::types::GLint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTarget {
    Texture2d,
    CubeMap,
}

/// One `glVertexAttribPointer` worth of vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub slot: gl::types::GLuint,
    pub buffer: Handle,
    pub components: i32,
    pub component_type: gl::types::GLenum,
    pub normalized: bool,
    pub stride: i32,
    pub byte_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bits per channel, 4 channels.
    Rgba8,
    /// 32-bit floats, 3 channels. Stored on the GPU as 16-bit floats.
    RgbF32,
}

#[derive(Debug, Clone, Copy)]
pub struct PixelData<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
    pub wrap_r: Wrap,
}

impl SamplerState {
    pub const LINEAR_CLAMP: SamplerState = SamplerState {
        min_filter: Filter::Linear,
        mag_filter: Filter::Linear,
        wrap_s: Wrap::ClampToEdge,
        wrap_t: Wrap::ClampToEdge,
        wrap_r: Wrap::ClampToEdge,
    };

    pub const LINEAR_REPEAT: SamplerState = SamplerState {
        min_filter: Filter::Linear,
        mag_filter: Filter::Linear,
        wrap_s: Wrap::Repeat,
        wrap_t: Wrap::Repeat,
        wrap_r: Wrap::Repeat,
    };
}

impl From<&Sampler> for SamplerState {
    fn from(sampler: &Sampler) -> Self {
        SamplerState {
            min_filter: sampler.min_filter,
            mag_filter: sampler.mag_filter,
            wrap_s: sampler.wrap_s,
            wrap_t: sampler.wrap_t,
            wrap_r: Wrap::Repeat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    Rgba8,
    Rgba16F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthState {
    LessEqual,
    /// Depth tested with less-or-equal, but not written.
    LessEqualReadOnly,
}

/// An offscreen render target with a depth attachment and, for readback
/// targets, an RGBA8 color attachment.
#[derive(Debug, PartialEq, Eq)]
pub struct Framebuffer {
    pub framebuffer: Handle,
    pub depth: Handle,
    pub color: Option<Handle>,
    pub width: u32,
    pub height: u32,
}

pub trait Device {
    fn create_buffer(&mut self, bytes: &[u8]) -> Handle;
    fn create_vertex_array(
        &mut self,
        attributes: &[VertexAttribute],
        element_buffer: Option<Handle>,
    ) -> Handle;
    /// Uploads a 2D texture, generating mipmaps if the minification filter
    /// samples them.
    fn create_texture_2d(&mut self, pixels: &PixelData, sampler: &SamplerState) -> Handle;
    fn create_cube_texture(&mut self, face_size: u32, format: ColorFormat) -> Handle;
    fn create_framebuffer(&mut self, width: u32, height: u32, with_color: bool) -> Framebuffer;
    /// Makes `face` (0..6, +X -X +Y -Y +Z -Z) of `cube` the color attachment
    /// of `framebuffer` and binds it. Returns false if the result is not a
    /// complete framebuffer.
    fn attach_cube_face(&mut self, framebuffer: &Framebuffer, cube: Handle, face: usize) -> bool;
    fn bind_framebuffer(&mut self, framebuffer: Option<&Framebuffer>);

    fn viewport(&mut self, width: u32, height: u32);
    /// Clears color to `color` and depth to 1.0.
    fn clear(&mut self, color: Vec4);
    fn set_depth_state(&mut self, state: DepthState);
    fn use_program(&mut self, program: Handle);
    fn set_uniform(&mut self, location: UniformLocation, value: Uniform);
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<Handle>);
    fn draw_arrays(&mut self, vertex_array: Handle, mode: gl::types::GLenum, count: i32);
    fn draw_elements(
        &mut self,
        vertex_array: Handle,
        mode: gl::types::GLenum,
        count: i32,
        index_type: gl::types::GLenum,
        byte_offset: usize,
    );
    /// Reads back the bound framebuffer as tightly packed RGB8 rows, bottom
    /// row first.
    fn read_pixels_rgb(&mut self, width: u32, height: u32) -> Vec<u8>;

    fn delete_buffers(&mut self, buffers: &[Handle]);
    fn delete_vertex_arrays(&mut self, vertex_arrays: &[Handle]);
    fn delete_textures(&mut self, textures: &[Handle]);
    fn delete_framebuffer(&mut self, framebuffer: Framebuffer);
    fn delete_program(&mut self, program: Handle);

    /// Sets a uniform if the program has it. Shader variants are allowed to
    /// leave uniforms out, writes to those are skipped.
    fn uniform(&mut self, location: Option<UniformLocation>, value: Uniform) {
        if let Some(location) = location {
            self.set_uniform(location, value);
        }
    }
}
