//! Runtime context: driver table, shared GL objects, and lifetime

use std::collections::HashMap;
use std::ffi::{c_void, CString};

use log::error;

use crate::kernel::Kernel;
use crate::sys::{self, Api, GLchar, GLenum, GLint, GLsizei, GLuint};
use crate::texture::TextureInfo;
use crate::Error;

/// Vertex shader shared by every kernel program
///
/// It forwards `position` to clip space and derives `pixcoord`, the integer
/// pixel coordinate a fragment invocation is computing:
/// `floor((position * 0.5 + 0.5) * output_extent) + output_min`.  Generated
/// fragment shaders consume `pixcoord` to locate their output pixel; this is
/// the one coordinate contract shared with the compiler's lowering passes.
const VERTEX_SHADER: &str = "\
#version 120
attribute vec2 position;
varying vec2 pixcoord;
uniform ivec2 output_min;
uniform ivec2 output_extent;
void main() {
    gl_Position = vec4(position, 0.0, 1.0);
    vec2 texcoord = 0.5 * position + 0.5;
    pixcoord = floor(texcoord * output_extent) + output_min;
}
";

/// Vertex coordinates of the unit square
const SQUARE_VERTICES: [f32; 8] = [
    -1.0, -1.0, //
    1.0, -1.0, //
    -1.0, 1.0, //
    1.0, 1.0,
];

/// Triangle-strip indices over [`SQUARE_VERTICES`]
const SQUARE_INDICES: [u32; 4] = [0, 1, 2, 3];

/// The OpenGL device runtime
///
/// A `Context` owns the resolved driver table, the GL objects shared by all
/// kernels (vertex shader, framebuffer, unit-square vertex and element
/// buffers), the kernel registry, and the texture registry.  All methods
/// must be called from the thread that owns the host's GL context; the
/// runtime adds no locking of its own.
///
/// Constructing a `Context` performs the full runtime initialization, so
/// there is no uninitialized state to guard against: holding a `Context` is
/// the capability to dispatch.
#[derive(Debug)]
pub struct Context {
    pub(crate) api: Api,
    pub(crate) vertex_shader: GLuint,
    pub(crate) framebuffer: GLuint,
    pub(crate) vertex_buffer: GLuint,
    pub(crate) element_buffer: GLuint,
    pub(crate) kernels: HashMap<String, Kernel>,
    pub(crate) textures: HashMap<GLuint, TextureInfo>,
    // GL contexts have thread affinity; keep the runtime on the thread
    // that built it.
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Context {
    /// Builds a runtime context on top of the host's GL context
    ///
    /// `lookup` is the host's `get_proc_address` equivalent: it receives a
    /// symbol name (`"glCreateShader"`, ...) and returns its address, or
    /// null if the driver does not export it.  Fails if any required entry
    /// point is missing or the shared vertex shader does not compile.
    pub fn new(lookup: impl FnMut(&str) -> *const c_void) -> Result<Self, Error> {
        let api = Api::load(lookup)?;

        let mut framebuffer = 0;
        unsafe { (api.GenFramebuffers)(1, &mut framebuffer) };

        let vertex_shader = make_shader(&api, sys::GL_VERTEX_SHADER, VERTEX_SHADER)?;

        let mut vertex_buffer = 0;
        let mut element_buffer = 0;
        unsafe {
            (api.GenBuffers)(1, &mut vertex_buffer);
            (api.BindBuffer)(sys::GL_ARRAY_BUFFER, vertex_buffer);
            (api.BufferData)(
                sys::GL_ARRAY_BUFFER,
                std::mem::size_of_val(&SQUARE_VERTICES) as isize,
                SQUARE_VERTICES.as_ptr() as *const c_void,
                sys::GL_STATIC_DRAW,
            );

            (api.GenBuffers)(1, &mut element_buffer);
            (api.BindBuffer)(sys::GL_ELEMENT_ARRAY_BUFFER, element_buffer);
            (api.BufferData)(
                sys::GL_ELEMENT_ARRAY_BUFFER,
                std::mem::size_of_val(&SQUARE_INDICES) as isize,
                SQUARE_INDICES.as_ptr() as *const c_void,
                sys::GL_STATIC_DRAW,
            );
        }

        let ctx = Self {
            api,
            vertex_shader,
            framebuffer,
            vertex_buffer,
            element_buffer,
            kernels: HashMap::new(),
            textures: HashMap::new(),
            _not_send: std::marker::PhantomData,
        };
        ctx.check_gl_error("context construction");
        Ok(ctx)
    }

    /// Reclaims every GL object the runtime created
    ///
    /// The host's GL context itself is untouched.  Buffers must have been
    /// freed with [`dev_free`](Context::dev_free) first; leaking textures
    /// is a caller error.
    ///
    /// # Panics
    /// If the texture registry is not empty.
    pub fn release(mut self) {
        unsafe {
            (self.api.DeleteShader)(self.vertex_shader);
            (self.api.DeleteFramebuffers)(1, &self.framebuffer);
        }

        for (_, kernel) in self.kernels.drain() {
            kernel.destroy(&self.api);
        }
        assert!(
            self.textures.is_empty(),
            "not all textures have been freed"
        );

        unsafe {
            (self.api.DeleteBuffers)(1, &self.vertex_buffer);
            (self.api.DeleteBuffers)(1, &self.element_buffer);
        }
    }

    /// Waits for previously submitted device work
    ///
    /// Dispatch is currently synchronous, so this is a no-op barrier; a
    /// finer-grained implementation would map it to `glFinish`.
    pub fn dev_sync(&self) {}

    /// Looks up a compiled kernel by entry name
    pub fn find_kernel(&self, name: &str) -> Option<&Kernel> {
        self.kernels.get(name)
    }

    pub(crate) fn uniform_location(&self, program: GLuint, name: &str) -> GLint {
        let Ok(name) = CString::new(name) else {
            return -1;
        };
        unsafe { (self.api.GetUniformLocation)(program, name.as_ptr()) }
    }

    /// Drains the driver's error queue in debug builds, logging anything
    /// that GL calls near `site` left behind
    pub(crate) fn check_gl_error(&self, site: &str) {
        if cfg!(debug_assertions) {
            loop {
                let err = unsafe { (self.api.GetError)() };
                if err == sys::GL_NO_ERROR {
                    break;
                }
                error!("OpenGL error {err:#06x} after {site}");
            }
        }
    }
}

/// Compiles a shader of the given type, returning the driver's info log on
/// failure
pub(crate) fn make_shader(api: &Api, ty: GLenum, source: &str) -> Result<GLuint, Error> {
    unsafe {
        let shader = (api.CreateShader)(ty);
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        (api.ShaderSource)(shader, 1, &ptr, &len);
        (api.CompileShader)(shader);

        let mut ok = 0;
        (api.GetShaderiv)(shader, sys::GL_COMPILE_STATUS, &mut ok);
        if ok == 0 {
            let log = shader_info_log(api, shader);
            (api.DeleteShader)(shader);
            return Err(Error::ShaderCompile(log));
        }
        Ok(shader)
    }
}

pub(crate) fn shader_info_log(api: &Api, shader: GLuint) -> String {
    let mut len: GLint = 0;
    unsafe { (api.GetShaderiv)(shader, sys::GL_INFO_LOG_LENGTH, &mut len) };
    let mut buf = vec![0u8; len.max(0) as usize];
    let mut written: GLsizei = 0;
    unsafe {
        (api.GetShaderInfoLog)(
            shader,
            buf.len() as GLsizei,
            &mut written,
            buf.as_mut_ptr() as *mut GLchar,
        )
    };
    String::from_utf8_lossy(&buf[..written.clamp(0, buf.len() as GLsizei) as usize])
        .into_owned()
}

pub(crate) fn program_info_log(api: &Api, program: GLuint) -> String {
    let mut len: GLint = 0;
    unsafe { (api.GetProgramiv)(program, sys::GL_INFO_LOG_LENGTH, &mut len) };
    let mut buf = vec![0u8; len.max(0) as usize];
    let mut written: GLsizei = 0;
    unsafe {
        (api.GetProgramInfoLog)(
            program,
            buf.len() as GLsizei,
            &mut written,
            buf.as_mut_ptr() as *mut GLchar,
        )
    };
    String::from_utf8_lossy(&buf[..written.clamp(0, buf.len() as GLsizei) as usize])
        .into_owned()
}
