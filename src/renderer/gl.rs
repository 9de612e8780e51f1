use std::ffi::{c_void, CString};
use std::ptr;

use anyhow::bail;
use glam::Vec4;
use sdl2::VideoSubsystem;

use crate::renderer::device::{
    ColorFormat, DepthState, Device, Framebuffer, Handle, PixelData, PixelFormat, SamplerState,
    TextureTarget, Uniform, UniformLocation, VertexAttribute,
};

#[allow(clippy::all, non_upper_case_globals, non_snake_case, dead_code)]
mod bindings {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}
pub use bindings::*;

/// Wraps an unsafe GL call, and in debug builds panics with the error name
/// and call site if the call raised a GL error.
macro_rules! call {
    ($expr:expr) => {{
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { $crate::renderer::gl::GetError() };
            if error != $crate::renderer::gl::NO_ERROR {
                let error_number_stringified;
                let error_name = match error {
                    $crate::renderer::gl::INVALID_ENUM => "INVALID_ENUM",
                    $crate::renderer::gl::INVALID_VALUE => "INVALID_VALUE",
                    $crate::renderer::gl::INVALID_OPERATION => "INVALID_OPERATION",
                    $crate::renderer::gl::OUT_OF_MEMORY => "OUT_OF_MEMORY",
                    $crate::renderer::gl::INVALID_FRAMEBUFFER_OPERATION => {
                        "INVALID_FRAMEBUFFER_OPERATION"
                    }
                    _ => {
                        error_number_stringified = format!("{error}");
                        &error_number_stringified
                    }
                };
                panic!(
                    "OpenGL error {error_name} at {}:{}:{}",
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}
pub(crate) use call;

/// Compiles a shader, returning the info log as the error if it fails.
pub fn create_shader(shader_type: types::GLenum, source: &str) -> anyhow::Result<types::GLuint> {
    let shader = call!(CreateShader(shader_type));
    let sources = [source.as_bytes().as_ptr() as *const types::GLchar];
    let source_lens = [source.len() as types::GLint];
    call!(ShaderSource(shader, 1, sources.as_ptr(), source_lens.as_ptr()));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteShader(shader));
        let info_log = String::from_utf8_lossy(&info_log[..length as usize]);
        let kind = if shader_type == VERTEX_SHADER { "vertex" } else { "fragment" };
        bail!("compiling {kind} shader failed: {info_log}");
    }
    Ok(shader)
}

/// Links the shaders into a program. The shaders can be deleted afterwards.
pub fn create_program(shaders: &[types::GLuint]) -> anyhow::Result<types::GLuint> {
    let program = call!(CreateProgram());
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteProgram(program));
        let info_log = String::from_utf8_lossy(&info_log[..length as usize]);
        bail!("linking shader program failed: {info_log}");
    }
    Ok(program)
}

/// Returns None if the program has no active uniform with this name.
pub fn get_uniform_location(program: types::GLuint, name: &str) -> Option<types::GLint> {
    let name = CString::new(name).ok()?;
    let location = call!(GetUniformLocation(program, name.as_ptr()));
    (location != -1).then_some(location)
}

/// The [`Device`] backed by the current OpenGL ES context.
pub struct GlDevice {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl GlDevice {
    /// Loads the GL function pointers from SDL. The context must be current.
    pub fn load(video: &VideoSubsystem) -> GlDevice {
        load_with(|s| video.gl_get_proc_address(s) as *const c_void);
        GlDevice {
            _not_send: std::marker::PhantomData,
        }
    }
}

fn cube_face_target(face: usize) -> types::GLenum {
    TEXTURE_CUBE_MAP_POSITIVE_X + face as types::GLenum
}

fn texture_target(target: TextureTarget) -> types::GLenum {
    match target {
        TextureTarget::Texture2d => TEXTURE_2D,
        TextureTarget::CubeMap => TEXTURE_CUBE_MAP,
    }
}

impl Device for GlDevice {
    fn create_buffer(&mut self, bytes: &[u8]) -> Handle {
        let mut buffer = 0;
        call!(GenBuffers(1, &mut buffer));
        call!(BindBuffer(ARRAY_BUFFER, buffer));
        call!(BufferData(
            ARRAY_BUFFER,
            bytes.len() as isize,
            bytes.as_ptr() as *const c_void,
            STATIC_DRAW,
        ));
        call!(BindBuffer(ARRAY_BUFFER, 0));
        buffer
    }

    fn create_vertex_array(
        &mut self,
        attributes: &[VertexAttribute],
        element_buffer: Option<Handle>,
    ) -> Handle {
        let mut vao = 0;
        call!(GenVertexArrays(1, &mut vao));
        call!(BindVertexArray(vao));
        for attribute in attributes {
            call!(EnableVertexAttribArray(attribute.slot));
            call!(BindBuffer(ARRAY_BUFFER, attribute.buffer));
            call!(VertexAttribPointer(
                attribute.slot,
                attribute.components,
                attribute.component_type,
                if attribute.normalized { TRUE } else { FALSE },
                attribute.stride,
                attribute.byte_offset as *const c_void,
            ));
        }
        if let Some(element_buffer) = element_buffer {
            call!(BindBuffer(ELEMENT_ARRAY_BUFFER, element_buffer));
        }
        // The element buffer binding is VAO state, so the VAO goes first.
        call!(BindVertexArray(0));
        call!(BindBuffer(ARRAY_BUFFER, 0));
        vao
    }

    fn create_texture_2d(&mut self, pixels: &PixelData, sampler: &SamplerState) -> Handle {
        let (internal_format, format, type_) = match pixels.format {
            PixelFormat::Rgba8 => (RGBA8, RGBA, UNSIGNED_BYTE),
            PixelFormat::RgbF32 => (RGB16F, RGB, FLOAT),
        };
        let mut texture = 0;
        call!(GenTextures(1, &mut texture));
        call!(BindTexture(TEXTURE_2D, texture));
        call!(PixelStorei(UNPACK_ALIGNMENT, 1));
        call!(TexImage2D(
            TEXTURE_2D,
            0,
            internal_format as i32,
            pixels.width as i32,
            pixels.height as i32,
            0,
            format,
            type_,
            pixels.pixels.as_ptr() as *const c_void,
        ));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_MIN_FILTER, sampler.min_filter.gl_enum() as i32));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_MAG_FILTER, sampler.mag_filter.gl_enum() as i32));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_WRAP_S, sampler.wrap_s.gl_enum() as i32));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_WRAP_T, sampler.wrap_t.gl_enum() as i32));
        call!(TexParameteri(TEXTURE_2D, TEXTURE_WRAP_R, sampler.wrap_r.gl_enum() as i32));
        if sampler.min_filter.uses_mipmaps() {
            call!(GenerateMipmap(TEXTURE_2D));
        }
        call!(BindTexture(TEXTURE_2D, 0));
        texture
    }

    fn create_cube_texture(&mut self, face_size: u32, format: ColorFormat) -> Handle {
        let (internal_format, type_) = match format {
            ColorFormat::Rgba8 => (RGBA8, UNSIGNED_BYTE),
            ColorFormat::Rgba16F => (RGBA16F, HALF_FLOAT),
        };
        let mut texture = 0;
        call!(GenTextures(1, &mut texture));
        call!(BindTexture(TEXTURE_CUBE_MAP, texture));
        for face in 0..6 {
            call!(TexImage2D(
                cube_face_target(face),
                0,
                internal_format as i32,
                face_size as i32,
                face_size as i32,
                0,
                RGBA,
                type_,
                ptr::null(),
            ));
        }
        call!(TexParameteri(TEXTURE_CUBE_MAP, TEXTURE_MIN_FILTER, LINEAR as i32));
        call!(TexParameteri(TEXTURE_CUBE_MAP, TEXTURE_MAG_FILTER, LINEAR as i32));
        call!(TexParameteri(TEXTURE_CUBE_MAP, TEXTURE_WRAP_S, CLAMP_TO_EDGE as i32));
        call!(TexParameteri(TEXTURE_CUBE_MAP, TEXTURE_WRAP_T, CLAMP_TO_EDGE as i32));
        call!(TexParameteri(TEXTURE_CUBE_MAP, TEXTURE_WRAP_R, CLAMP_TO_EDGE as i32));
        call!(BindTexture(TEXTURE_CUBE_MAP, 0));
        texture
    }

    fn create_framebuffer(&mut self, width: u32, height: u32, with_color: bool) -> Framebuffer {
        let mut framebuffer = 0;
        let mut depth = 0;
        call!(GenFramebuffers(1, &mut framebuffer));
        call!(BindFramebuffer(FRAMEBUFFER, framebuffer));
        call!(GenRenderbuffers(1, &mut depth));
        call!(BindRenderbuffer(RENDERBUFFER, depth));
        call!(RenderbufferStorage(RENDERBUFFER, DEPTH_COMPONENT24, width as i32, height as i32));
        call!(FramebufferRenderbuffer(FRAMEBUFFER, DEPTH_ATTACHMENT, RENDERBUFFER, depth));
        let color = with_color.then(|| {
            let mut color = 0;
            call!(GenRenderbuffers(1, &mut color));
            call!(BindRenderbuffer(RENDERBUFFER, color));
            call!(RenderbufferStorage(RENDERBUFFER, RGBA8, width as i32, height as i32));
            call!(FramebufferRenderbuffer(FRAMEBUFFER, COLOR_ATTACHMENT0, RENDERBUFFER, color));
            color
        });
        call!(BindRenderbuffer(RENDERBUFFER, 0));
        call!(BindFramebuffer(FRAMEBUFFER, 0));
        Framebuffer {
            framebuffer,
            depth,
            color,
            width,
            height,
        }
    }

    fn attach_cube_face(&mut self, framebuffer: &Framebuffer, cube: Handle, face: usize) -> bool {
        call!(BindFramebuffer(FRAMEBUFFER, framebuffer.framebuffer));
        call!(FramebufferTexture2D(
            FRAMEBUFFER,
            COLOR_ATTACHMENT0,
            cube_face_target(face),
            cube,
            0,
        ));
        let status = call!(CheckFramebufferStatus(FRAMEBUFFER));
        status == FRAMEBUFFER_COMPLETE
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<&Framebuffer>) {
        call!(BindFramebuffer(FRAMEBUFFER, framebuffer.map_or(0, |f| f.framebuffer)));
    }

    fn viewport(&mut self, width: u32, height: u32) {
        call!(Viewport(0, 0, width as i32, height as i32));
    }

    fn clear(&mut self, color: Vec4) {
        // Depth clears are masked by the depth write mask.
        call!(DepthMask(TRUE));
        call!(ClearColor(color.x, color.y, color.z, color.w));
        call!(Clear(COLOR_BUFFER_BIT | DEPTH_BUFFER_BIT));
    }

    fn set_depth_state(&mut self, state: DepthState) {
        match state {
            DepthState::LessEqual | DepthState::LessEqualReadOnly => {
                call!(Enable(DEPTH_TEST));
                call!(DepthFunc(LEQUAL));
                let write = state == DepthState::LessEqual;
                call!(DepthMask(if write { TRUE } else { FALSE }));
            }
        }
    }

    fn use_program(&mut self, program: Handle) {
        call!(UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: Uniform) {
        match value {
            Uniform::Int(value) => call!(Uniform1i(location, value)),
            Uniform::Float(value) => call!(Uniform1f(location, value)),
            Uniform::Vec3(value) => call!(Uniform3f(location, value.x, value.y, value.z)),
            Uniform::Vec4(value) => call!(Uniform4f(location, value.x, value.y, value.z, value.w)),
            Uniform::Mat4(value) => {
                let columns = value.to_cols_array();
                call!(UniformMatrix4fv(location, 1, FALSE, columns.as_ptr()));
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<Handle>) {
        call!(ActiveTexture(TEXTURE0 + unit));
        call!(BindTexture(texture_target(target), texture.unwrap_or(0)));
    }

    fn draw_arrays(&mut self, vertex_array: Handle, mode: types::GLenum, count: i32) {
        call!(BindVertexArray(vertex_array));
        call!(DrawArrays(mode, 0, count));
    }

    fn draw_elements(
        &mut self,
        vertex_array: Handle,
        mode: types::GLenum,
        count: i32,
        index_type: types::GLenum,
        byte_offset: usize,
    ) {
        call!(BindVertexArray(vertex_array));
        call!(DrawElements(mode, count, index_type, byte_offset as *const c_void));
    }

    fn read_pixels_rgb(&mut self, width: u32, height: u32) -> Vec<u8> {
        // RGBA/UNSIGNED_BYTE is the only combination GLES guarantees.
        let mut rgba = vec![0u8; width as usize * height as usize * 4];
        call!(PixelStorei(PACK_ALIGNMENT, 1));
        call!(ReadPixels(
            0,
            0,
            width as i32,
            height as i32,
            RGBA,
            UNSIGNED_BYTE,
            rgba.as_mut_ptr() as *mut c_void,
        ));
        rgba.chunks_exact(4)
            .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
            .collect()
    }

    fn delete_buffers(&mut self, buffers: &[Handle]) {
        call!(DeleteBuffers(buffers.len() as i32, buffers.as_ptr()));
    }

    fn delete_vertex_arrays(&mut self, vertex_arrays: &[Handle]) {
        call!(DeleteVertexArrays(vertex_arrays.len() as i32, vertex_arrays.as_ptr()));
    }

    fn delete_textures(&mut self, textures: &[Handle]) {
        call!(DeleteTextures(textures.len() as i32, textures.as_ptr()));
    }

    fn delete_framebuffer(&mut self, framebuffer: Framebuffer) {
        call!(DeleteFramebuffers(1, &framebuffer.framebuffer));
        call!(DeleteRenderbuffers(1, &framebuffer.depth));
        if let Some(color) = framebuffer.color {
            call!(DeleteRenderbuffers(1, &color));
        }
    }

    fn delete_program(&mut self, program: Handle) {
        call!(DeleteProgram(program));
    }
}
