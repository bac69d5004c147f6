//! Raw OpenGL types, constants, and the resolved driver function table
//!
//! The runtime never links against an OpenGL library directly: the host
//! application owns the context and supplies a `get_proc_address`-style
//! lookup hook, through which [`Api::load`] resolves the fixed set of entry
//! points below.  Only the functions the runtime actually calls are
//! declared; signatures match the OpenGL 2.x C API.

#![allow(non_snake_case, clippy::upper_case_acronyms)]

use std::ffi::c_void;

use crate::Error;

// ── Primitive typedefs ────────────────────────────────────────────────────────

pub type GLenum = u32;
pub type GLboolean = u8;
pub type GLint = i32;
pub type GLuint = u32;
pub type GLsizei = i32;
pub type GLfloat = f32;
pub type GLdouble = f64;
pub type GLchar = std::ffi::c_char;
pub type GLsizeiptr = isize;

// ── Constants ────────────────────────────────────────────────────────────────

pub const GL_FALSE: GLboolean = 0;

pub const GL_NO_ERROR: GLenum = 0;

pub const GL_TRIANGLE_STRIP: GLenum = 0x0005;

pub const GL_CULL_FACE: GLenum = 0x0B44;
pub const GL_DEPTH_TEST: GLenum = 0x0B71;

pub const GL_TEXTURE_2D: GLenum = 0x0DE1;

pub const GL_UNSIGNED_BYTE: GLenum = 0x1401;
pub const GL_UNSIGNED_SHORT: GLenum = 0x1403;
pub const GL_UNSIGNED_INT: GLenum = 0x1405;
pub const GL_FLOAT: GLenum = 0x1406;

pub const GL_MODELVIEW: GLenum = 0x1700;
pub const GL_PROJECTION: GLenum = 0x1701;

pub const GL_LUMINANCE: GLenum = 0x1909;
pub const GL_RGB: GLenum = 0x1907;
pub const GL_RGBA: GLenum = 0x1908;

pub const GL_NEAREST: GLint = 0x2600;
pub const GL_TEXTURE_MAG_FILTER: GLenum = 0x2800;
pub const GL_TEXTURE_MIN_FILTER: GLenum = 0x2801;
pub const GL_TEXTURE_WRAP_S: GLenum = 0x2802;
pub const GL_TEXTURE_WRAP_T: GLenum = 0x2803;
pub const GL_CLAMP_TO_EDGE: GLint = 0x812F;

pub const GL_TEXTURE0: GLenum = 0x84C0;

pub const GL_ARRAY_BUFFER: GLenum = 0x8892;
pub const GL_ELEMENT_ARRAY_BUFFER: GLenum = 0x8893;
pub const GL_STATIC_DRAW: GLenum = 0x88E4;

pub const GL_FRAGMENT_SHADER: GLenum = 0x8B30;
pub const GL_VERTEX_SHADER: GLenum = 0x8B31;
pub const GL_COMPILE_STATUS: GLenum = 0x8B81;
pub const GL_LINK_STATUS: GLenum = 0x8B82;
pub const GL_INFO_LOG_LENGTH: GLenum = 0x8B84;

pub const GL_FRAMEBUFFER_COMPLETE: GLenum = 0x8CD5;
pub const GL_COLOR_ATTACHMENT0: GLenum = 0x8CE0;
pub const GL_FRAMEBUFFER: GLenum = 0x8D40;

// ── Driver function table ────────────────────────────────────────────────────

/// Declares [`Api`] and its loader from one table of entry points.
///
/// Each `fn Name(args) -> ret;` row becomes a function-pointer field; the
/// generated [`Api::load`] resolves it under the symbol `gl<Name>` and fails
/// with [`Error::MissingSymbol`] when the lookup hook returns null.
macro_rules! gl_api {
    ($(fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;)*) => {
        /// Table of resolved OpenGL entry points
        #[derive(Debug)]
        pub struct Api {
            $(pub $name: unsafe extern "system" fn($($ty),*) $(-> $ret)?,)*
        }

        impl Api {
            /// Resolves every required entry point through `lookup`
            ///
            /// `lookup` receives the full symbol name (`"glCreateShader"`,
            /// ...) and returns the function's address, or null if the
            /// driver does not export it.
            pub fn load(
                mut lookup: impl FnMut(&str) -> *const c_void,
            ) -> Result<Self, Error> {
                $(
                    let $name = lookup(concat!("gl", stringify!($name)));
                    if $name.is_null() {
                        return Err(Error::MissingSymbol(
                            concat!("gl", stringify!($name)),
                        ));
                    }
                )*
                // SAFETY: the host promised that each non-null address is
                // the named GL entry point; signatures are fixed by the GL
                // 2.x specification.
                unsafe {
                    Ok(Self {
                        $($name: std::mem::transmute::<
                            *const c_void,
                            unsafe extern "system" fn($($ty),*) $(-> $ret)?,
                        >($name),)*
                    })
                }
            }
        }
    };
}

gl_api! {
    fn DeleteTextures(n: GLsizei, textures: *const GLuint);
    fn GenTextures(n: GLsizei, textures: *mut GLuint);
    fn BindTexture(target: GLenum, texture: GLuint);
    fn GetError() -> GLenum;
    fn MatrixMode(mode: GLenum);
    fn LoadIdentity();
    fn Ortho(left: GLdouble, right: GLdouble, bottom: GLdouble, top: GLdouble,
             near: GLdouble, far: GLdouble);
    fn Viewport(x: GLint, y: GLint, width: GLsizei, height: GLsizei);
    fn GenBuffers(n: GLsizei, buffers: *mut GLuint);
    fn DeleteBuffers(n: GLsizei, buffers: *const GLuint);
    fn BindBuffer(target: GLenum, buffer: GLuint);
    fn BufferData(target: GLenum, size: GLsizeiptr, data: *const c_void,
                  usage: GLenum);
    fn TexParameteri(target: GLenum, pname: GLenum, param: GLint);
    fn TexImage2D(target: GLenum, level: GLint, internal_format: GLint,
                  width: GLsizei, height: GLsizei, border: GLint,
                  format: GLenum, ty: GLenum, data: *const c_void);
    fn GetTexImage(target: GLenum, level: GLint, format: GLenum, ty: GLenum,
                   pixels: *mut c_void);
    fn TexSubImage2D(target: GLenum, level: GLint, xoffset: GLint,
                     yoffset: GLint, width: GLsizei, height: GLsizei,
                     format: GLenum, ty: GLenum, data: *const c_void);
    fn Disable(cap: GLenum);
    fn CreateShader(ty: GLenum) -> GLuint;
    fn ActiveTexture(texture: GLenum);
    fn ShaderSource(shader: GLuint, count: GLsizei,
                    string: *const *const GLchar, length: *const GLint);
    fn CompileShader(shader: GLuint);
    fn GetShaderiv(shader: GLuint, pname: GLenum, params: *mut GLint);
    fn GetShaderInfoLog(shader: GLuint, buf_size: GLsizei,
                        length: *mut GLsizei, info_log: *mut GLchar);
    fn DeleteShader(shader: GLuint);
    fn CreateProgram() -> GLuint;
    fn AttachShader(program: GLuint, shader: GLuint);
    fn LinkProgram(program: GLuint);
    fn GetProgramiv(program: GLuint, pname: GLenum, params: *mut GLint);
    fn GetProgramInfoLog(program: GLuint, buf_size: GLsizei,
                         length: *mut GLsizei, info_log: *mut GLchar);
    fn UseProgram(program: GLuint);
    fn DeleteProgram(program: GLuint);
    fn GetUniformLocation(program: GLuint, name: *const GLchar) -> GLint;
    fn Uniform1iv(location: GLint, count: GLsizei, value: *const GLint);
    fn Uniform2iv(location: GLint, count: GLsizei, value: *const GLint);
    fn Uniform1fv(location: GLint, count: GLsizei, value: *const GLfloat);
    fn GenFramebuffers(n: GLsizei, framebuffers: *mut GLuint);
    fn DeleteFramebuffers(n: GLsizei, framebuffers: *const GLuint);
    fn CheckFramebufferStatus(target: GLenum) -> GLenum;
    fn BindFramebuffer(target: GLenum, framebuffer: GLuint);
    fn FramebufferTexture2D(target: GLenum, attachment: GLenum,
                            tex_target: GLenum, texture: GLuint, level: GLint);
    fn DrawBuffers(n: GLsizei, bufs: *const GLenum);
    fn GetAttribLocation(program: GLuint, name: *const GLchar) -> GLint;
    fn VertexAttribPointer(index: GLuint, size: GLint, ty: GLenum,
                           normalized: GLboolean, stride: GLsizei,
                           pointer: *const c_void);
    fn DrawElements(mode: GLenum, count: GLsizei, ty: GLenum,
                    indices: *const c_void);
    fn EnableVertexAttribArray(index: GLuint);
    fn DisableVertexAttribArray(index: GLuint);
}
