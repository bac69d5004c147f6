//! A recording OpenGL driver for the test suite
//!
//! [`loader`] resolves every entry point the runtime needs to a stub that
//! records its effect in a thread-local [`MockGl`], so tests can exercise
//! the full runtime (registries, transfers, dispatch protocol) without a
//! real GL context.  Object handles, texture storage, shader compile status
//! and uniform values all behave like a driver's; drawing simulates a
//! pass-through fragment shader by copying the pixels of the texture bound
//! on unit 0 into the texture attached at color attachment 0.
//!
//! Two affordances exist for failure-path tests: shader sources containing
//! `#error` fail to compile, and uniform names starting with `unused_`
//! report no location (as if the GLSL compiler optimized them away).

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_void, CStr};

use crate::sys::*;
use crate::Context;

const COMPILE_LOG: &[u8] = b"mock: compilation failed";

#[derive(Default)]
pub struct MockTexture {
    pub params: Vec<(GLenum, GLint)>,
    pub width: GLsizei,
    pub height: GLsizei,
    pub format: GLenum,
    pub ty: GLenum,
    pub storage: Vec<u8>,
}

#[derive(Default)]
pub struct MockShader {
    pub ty: GLenum,
    pub source: String,
    pub compiled: bool,
}

#[derive(Default)]
pub struct MockProgram {
    pub shaders: Vec<GLuint>,
    pub linked: bool,
    pub uniform_locations: HashMap<String, GLint>,
    next_location: GLint,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Uniform {
    Int(Vec<GLint>),
    Float(Vec<GLfloat>),
}

#[derive(Default)]
pub struct MockGl {
    next_id: GLuint,
    pub textures: HashMap<GLuint, MockTexture>,
    pub deleted_textures: Vec<GLuint>,
    pub shaders: HashMap<GLuint, MockShader>,
    pub programs: HashMap<GLuint, MockProgram>,
    pub buffers: HashMap<GLuint, Vec<u8>>,
    pub framebuffers: Vec<GLuint>,

    pub current_program: GLuint,
    pub bound_texture: GLuint,
    pub bound_framebuffer: GLuint,
    pub bound_array_buffer: GLuint,
    pub bound_element_buffer: GLuint,
    pub active_unit: GLenum,
    pub unit_bindings: HashMap<GLenum, GLuint>,

    pub attachments: HashMap<GLenum, GLuint>,
    pub draw_buffers: Vec<GLenum>,
    pub framebuffer_status: GLenum,

    pub uniforms: HashMap<(GLuint, GLint), Uniform>,
    pub uploads: Vec<(GLuint, GLenum, GLenum)>,
    pub downloads: Vec<(GLuint, GLenum, GLenum)>,
    pub draws: Vec<(GLenum, GLsizei)>,
    pub disabled_caps: Vec<GLenum>,
    pub enabled_attribs: Vec<GLuint>,
    pub viewport: (GLint, GLint, GLsizei, GLsizei),
}

impl MockGl {
    fn fresh_id(&mut self) -> GLuint {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Looks up a recorded uniform value by name
    pub fn uniform_by_name(&self, program: GLuint, name: &str) -> Option<&Uniform> {
        let loc = *self.programs.get(&program)?.uniform_locations.get(name)?;
        self.uniforms.get(&(program, loc))
    }
}

thread_local! {
    static STATE: RefCell<MockGl> = RefCell::new(MockGl::default());
}

/// Runs `f` against the driver state
pub fn with<R>(f: impl FnOnce(&mut MockGl) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Resets the driver to a pristine state
pub fn reset() {
    let _ = env_logger::builder().is_test(true).try_init();
    STATE.with(|state| {
        *state.borrow_mut() = MockGl {
            next_id: 1,
            active_unit: GL_TEXTURE0,
            framebuffer_status: GL_FRAMEBUFFER_COMPLETE,
            ..MockGl::default()
        };
    });
}

/// Resets the driver and builds a runtime context on top of it
pub fn new_context() -> Context {
    reset();
    Context::new(loader).expect("mock driver resolves every symbol")
}

/// Bytes per pixel for an external format / element type pair
fn bytes_per_pixel(format: GLenum, ty: GLenum) -> usize {
    let channels = match format {
        GL_LUMINANCE => 1,
        GL_RGB => 3,
        _ => 4,
    };
    let elem = match ty {
        GL_UNSIGNED_BYTE => 1,
        GL_UNSIGNED_SHORT => 2,
        _ => 4,
    };
    channels * elem
}

// ── Stub entry points ────────────────────────────────────────────────────────

unsafe extern "system" fn gen_textures(n: GLsizei, textures: *mut GLuint) {
    with(|gl| {
        for i in 0..n as usize {
            let id = gl.fresh_id();
            gl.textures.insert(id, MockTexture::default());
            *textures.add(i) = id;
        }
    })
}

unsafe extern "system" fn delete_textures(n: GLsizei, textures: *const GLuint) {
    with(|gl| {
        for i in 0..n as usize {
            let id = *textures.add(i);
            gl.textures.remove(&id);
            gl.deleted_textures.push(id);
        }
    })
}

unsafe extern "system" fn bind_texture(_target: GLenum, texture: GLuint) {
    with(|gl| {
        gl.bound_texture = texture;
        let unit = gl.active_unit;
        gl.unit_bindings.insert(unit, texture);
    })
}

unsafe extern "system" fn active_texture(texture: GLenum) {
    with(|gl| gl.active_unit = texture)
}

unsafe extern "system" fn tex_parameteri(_target: GLenum, pname: GLenum, param: GLint) {
    with(|gl| {
        let bound = gl.bound_texture;
        if let Some(tex) = gl.textures.get_mut(&bound) {
            tex.params.push((pname, param));
        }
    })
}

unsafe extern "system" fn tex_image_2d(
    _target: GLenum,
    _level: GLint,
    _internal_format: GLint,
    width: GLsizei,
    height: GLsizei,
    _border: GLint,
    format: GLenum,
    ty: GLenum,
    _data: *const c_void,
) {
    with(|gl| {
        let bound = gl.bound_texture;
        if let Some(tex) = gl.textures.get_mut(&bound) {
            tex.width = width;
            tex.height = height;
            tex.format = format;
            tex.ty = ty;
            tex.storage =
                vec![0; width as usize * height as usize * bytes_per_pixel(format, ty)];
        }
    })
}

unsafe extern "system" fn tex_sub_image_2d(
    _target: GLenum,
    _level: GLint,
    _xoffset: GLint,
    _yoffset: GLint,
    width: GLsizei,
    height: GLsizei,
    format: GLenum,
    ty: GLenum,
    data: *const c_void,
) {
    let n = width as usize * height as usize * bytes_per_pixel(format, ty);
    let src = std::slice::from_raw_parts(data as *const u8, n);
    with(|gl| {
        let bound = gl.bound_texture;
        gl.uploads.push((bound, format, ty));
        if let Some(tex) = gl.textures.get_mut(&bound) {
            if tex.storage.len() < n {
                tex.storage.resize(n, 0);
            }
            tex.storage[..n].copy_from_slice(src);
        }
    })
}

unsafe extern "system" fn get_tex_image(
    _target: GLenum,
    _level: GLint,
    format: GLenum,
    ty: GLenum,
    pixels: *mut c_void,
) {
    with(|gl| {
        let bound = gl.bound_texture;
        gl.downloads.push((bound, format, ty));
        if let Some(tex) = gl.textures.get(&bound) {
            let n = (tex.width as usize * tex.height as usize * bytes_per_pixel(format, ty))
                .min(tex.storage.len());
            let dst = std::slice::from_raw_parts_mut(pixels as *mut u8, n);
            dst.copy_from_slice(&tex.storage[..n]);
        }
    })
}

unsafe extern "system" fn get_error() -> GLenum {
    GL_NO_ERROR
}

unsafe extern "system" fn matrix_mode(_mode: GLenum) {}

unsafe extern "system" fn load_identity() {}

unsafe extern "system" fn ortho(
    _left: GLdouble,
    _right: GLdouble,
    _bottom: GLdouble,
    _top: GLdouble,
    _near: GLdouble,
    _far: GLdouble,
) {
}

unsafe extern "system" fn viewport(x: GLint, y: GLint, width: GLsizei, height: GLsizei) {
    with(|gl| gl.viewport = (x, y, width, height))
}

unsafe extern "system" fn gen_buffers(n: GLsizei, buffers: *mut GLuint) {
    with(|gl| {
        for i in 0..n as usize {
            let id = gl.fresh_id();
            gl.buffers.insert(id, Vec::new());
            *buffers.add(i) = id;
        }
    })
}

unsafe extern "system" fn delete_buffers(n: GLsizei, buffers: *const GLuint) {
    with(|gl| {
        for i in 0..n as usize {
            gl.buffers.remove(&*buffers.add(i));
        }
    })
}

unsafe extern "system" fn bind_buffer(target: GLenum, buffer: GLuint) {
    with(|gl| match target {
        GL_ARRAY_BUFFER => gl.bound_array_buffer = buffer,
        GL_ELEMENT_ARRAY_BUFFER => gl.bound_element_buffer = buffer,
        _ => {}
    })
}

unsafe extern "system" fn buffer_data(
    target: GLenum,
    size: GLsizeiptr,
    data: *const c_void,
    _usage: GLenum,
) {
    let src = std::slice::from_raw_parts(data as *const u8, size as usize);
    with(|gl| {
        let bound = match target {
            GL_ARRAY_BUFFER => gl.bound_array_buffer,
            GL_ELEMENT_ARRAY_BUFFER => gl.bound_element_buffer,
            _ => 0,
        };
        if let Some(buffer) = gl.buffers.get_mut(&bound) {
            *buffer = src.to_vec();
        }
    })
}

unsafe extern "system" fn disable(cap: GLenum) {
    with(|gl| gl.disabled_caps.push(cap))
}

unsafe extern "system" fn create_shader(ty: GLenum) -> GLuint {
    with(|gl| {
        let id = gl.fresh_id();
        gl.shaders.insert(
            id,
            MockShader {
                ty,
                ..MockShader::default()
            },
        );
        id
    })
}

unsafe extern "system" fn shader_source(
    shader: GLuint,
    count: GLsizei,
    string: *const *const GLchar,
    length: *const GLint,
) {
    let mut source = String::new();
    for i in 0..count as usize {
        let ptr = *string.add(i) as *const u8;
        let len = *length.add(i) as usize;
        source.push_str(&String::from_utf8_lossy(std::slice::from_raw_parts(ptr, len)));
    }
    with(|gl| {
        if let Some(s) = gl.shaders.get_mut(&shader) {
            s.source = source;
        }
    })
}

unsafe extern "system" fn compile_shader(shader: GLuint) {
    with(|gl| {
        if let Some(s) = gl.shaders.get_mut(&shader) {
            s.compiled = !s.source.contains("#error");
        }
    })
}

unsafe extern "system" fn get_shaderiv(shader: GLuint, pname: GLenum, params: *mut GLint) {
    with(|gl| {
        let Some(s) = gl.shaders.get(&shader) else {
            *params = 0;
            return;
        };
        *params = match pname {
            GL_COMPILE_STATUS => s.compiled as GLint,
            GL_INFO_LOG_LENGTH if !s.compiled => COMPILE_LOG.len() as GLint + 1,
            _ => 0,
        };
    })
}

unsafe extern "system" fn get_shader_info_log(
    _shader: GLuint,
    buf_size: GLsizei,
    length: *mut GLsizei,
    info_log: *mut GLchar,
) {
    let n = COMPILE_LOG.len().min(buf_size.max(0) as usize);
    std::ptr::copy_nonoverlapping(COMPILE_LOG.as_ptr(), info_log as *mut u8, n);
    *length = n as GLsizei;
}

unsafe extern "system" fn delete_shader(shader: GLuint) {
    with(|gl| {
        gl.shaders.remove(&shader);
    })
}

unsafe extern "system" fn create_program() -> GLuint {
    with(|gl| {
        let id = gl.fresh_id();
        gl.programs.insert(id, MockProgram::default());
        id
    })
}

unsafe extern "system" fn attach_shader(program: GLuint, shader: GLuint) {
    with(|gl| {
        if let Some(p) = gl.programs.get_mut(&program) {
            p.shaders.push(shader);
        }
    })
}

unsafe extern "system" fn link_program(program: GLuint) {
    with(|gl| {
        let linked = gl
            .programs
            .get(&program)
            .map(|p| {
                !p.shaders.is_empty()
                    && p.shaders
                        .iter()
                        .all(|s| gl.shaders.get(s).is_some_and(|s| s.compiled))
            })
            .unwrap_or(false);
        if let Some(p) = gl.programs.get_mut(&program) {
            p.linked = linked;
        }
    })
}

unsafe extern "system" fn get_programiv(program: GLuint, pname: GLenum, params: *mut GLint) {
    with(|gl| {
        let Some(p) = gl.programs.get(&program) else {
            *params = 0;
            return;
        };
        *params = match pname {
            GL_LINK_STATUS => p.linked as GLint,
            GL_INFO_LOG_LENGTH if !p.linked => COMPILE_LOG.len() as GLint + 1,
            _ => 0,
        };
    })
}

unsafe extern "system" fn get_program_info_log(
    _program: GLuint,
    buf_size: GLsizei,
    length: *mut GLsizei,
    info_log: *mut GLchar,
) {
    let n = COMPILE_LOG.len().min(buf_size.max(0) as usize);
    std::ptr::copy_nonoverlapping(COMPILE_LOG.as_ptr(), info_log as *mut u8, n);
    *length = n as GLsizei;
}

unsafe extern "system" fn use_program(program: GLuint) {
    with(|gl| gl.current_program = program)
}

unsafe extern "system" fn delete_program(program: GLuint) {
    with(|gl| {
        gl.programs.remove(&program);
    })
}

unsafe extern "system" fn get_uniform_location(program: GLuint, name: *const GLchar) -> GLint {
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();
    if name.starts_with("unused_") {
        return -1;
    }
    with(|gl| {
        let Some(p) = gl.programs.get_mut(&program) else {
            return -1;
        };
        if let Some(loc) = p.uniform_locations.get(&name) {
            return *loc;
        }
        let loc = p.next_location;
        p.next_location += 1;
        p.uniform_locations.insert(name, loc);
        loc
    })
}

unsafe extern "system" fn uniform_1iv(location: GLint, count: GLsizei, value: *const GLint) {
    if location < 0 {
        return;
    }
    let values = std::slice::from_raw_parts(value, count as usize).to_vec();
    with(|gl| {
        let program = gl.current_program;
        gl.uniforms.insert((program, location), Uniform::Int(values));
    })
}

unsafe extern "system" fn uniform_2iv(location: GLint, count: GLsizei, value: *const GLint) {
    if location < 0 {
        return;
    }
    let values = std::slice::from_raw_parts(value, 2 * count as usize).to_vec();
    with(|gl| {
        let program = gl.current_program;
        gl.uniforms.insert((program, location), Uniform::Int(values));
    })
}

unsafe extern "system" fn uniform_1fv(location: GLint, count: GLsizei, value: *const GLfloat) {
    if location < 0 {
        return;
    }
    let values = std::slice::from_raw_parts(value, count as usize).to_vec();
    with(|gl| {
        let program = gl.current_program;
        gl.uniforms
            .insert((program, location), Uniform::Float(values));
    })
}

unsafe extern "system" fn gen_framebuffers(n: GLsizei, framebuffers: *mut GLuint) {
    with(|gl| {
        for i in 0..n as usize {
            let id = gl.fresh_id();
            gl.framebuffers.push(id);
            *framebuffers.add(i) = id;
        }
    })
}

unsafe extern "system" fn delete_framebuffers(n: GLsizei, framebuffers: *const GLuint) {
    with(|gl| {
        for i in 0..n as usize {
            let id = *framebuffers.add(i);
            gl.framebuffers.retain(|f| *f != id);
        }
    })
}

unsafe extern "system" fn check_framebuffer_status(_target: GLenum) -> GLenum {
    with(|gl| gl.framebuffer_status)
}

unsafe extern "system" fn bind_framebuffer(_target: GLenum, framebuffer: GLuint) {
    with(|gl| gl.bound_framebuffer = framebuffer)
}

unsafe extern "system" fn framebuffer_texture_2d(
    _target: GLenum,
    attachment: GLenum,
    _tex_target: GLenum,
    texture: GLuint,
    _level: GLint,
) {
    with(|gl| {
        gl.attachments.insert(attachment, texture);
    })
}

unsafe extern "system" fn draw_buffers(n: GLsizei, bufs: *const GLenum) {
    let bufs = std::slice::from_raw_parts(bufs, n as usize).to_vec();
    with(|gl| gl.draw_buffers = bufs)
}

unsafe extern "system" fn get_attrib_location(_program: GLuint, _name: *const GLchar) -> GLint {
    0
}

unsafe extern "system" fn vertex_attrib_pointer(
    _index: GLuint,
    _size: GLint,
    _ty: GLenum,
    _normalized: GLboolean,
    _stride: GLsizei,
    _pointer: *const c_void,
) {
}

unsafe extern "system" fn draw_elements(
    mode: GLenum,
    count: GLsizei,
    _ty: GLenum,
    _indices: *const c_void,
) {
    with(|gl| {
        gl.draws.push((mode, count));

        // Simulate a pass-through fragment shader: the color attachment
        // receives the pixels of the texture bound on unit 0.
        let src = gl.unit_bindings.get(&GL_TEXTURE0).copied().unwrap_or(0);
        let dst = gl.attachments.get(&GL_COLOR_ATTACHMENT0).copied().unwrap_or(0);
        if src != 0 && dst != 0 && src != dst {
            let pixels = gl.textures.get(&src).map(|t| t.storage.clone());
            if let (Some(pixels), Some(out)) = (pixels, gl.textures.get_mut(&dst)) {
                let n = pixels.len().min(out.storage.len());
                out.storage[..n].copy_from_slice(&pixels[..n]);
            }
        }
    })
}

unsafe extern "system" fn enable_vertex_attrib_array(index: GLuint) {
    with(|gl| gl.enabled_attribs.push(index))
}

unsafe extern "system" fn disable_vertex_attrib_array(index: GLuint) {
    with(|gl| gl.enabled_attribs.retain(|i| *i != index))
}

/// Resolves driver entry points to the stubs above
pub fn loader(name: &str) -> *const c_void {
    match name {
        "glDeleteTextures" => delete_textures as *const c_void,
        "glGenTextures" => gen_textures as *const c_void,
        "glBindTexture" => bind_texture as *const c_void,
        "glGetError" => get_error as *const c_void,
        "glMatrixMode" => matrix_mode as *const c_void,
        "glLoadIdentity" => load_identity as *const c_void,
        "glOrtho" => ortho as *const c_void,
        "glViewport" => viewport as *const c_void,
        "glGenBuffers" => gen_buffers as *const c_void,
        "glDeleteBuffers" => delete_buffers as *const c_void,
        "glBindBuffer" => bind_buffer as *const c_void,
        "glBufferData" => buffer_data as *const c_void,
        "glTexParameteri" => tex_parameteri as *const c_void,
        "glTexImage2D" => tex_image_2d as *const c_void,
        "glGetTexImage" => get_tex_image as *const c_void,
        "glTexSubImage2D" => tex_sub_image_2d as *const c_void,
        "glDisable" => disable as *const c_void,
        "glCreateShader" => create_shader as *const c_void,
        "glActiveTexture" => active_texture as *const c_void,
        "glShaderSource" => shader_source as *const c_void,
        "glCompileShader" => compile_shader as *const c_void,
        "glGetShaderiv" => get_shaderiv as *const c_void,
        "glGetShaderInfoLog" => get_shader_info_log as *const c_void,
        "glDeleteShader" => delete_shader as *const c_void,
        "glCreateProgram" => create_program as *const c_void,
        "glAttachShader" => attach_shader as *const c_void,
        "glLinkProgram" => link_program as *const c_void,
        "glGetProgramiv" => get_programiv as *const c_void,
        "glGetProgramInfoLog" => get_program_info_log as *const c_void,
        "glUseProgram" => use_program as *const c_void,
        "glDeleteProgram" => delete_program as *const c_void,
        "glGetUniformLocation" => get_uniform_location as *const c_void,
        "glUniform1iv" => uniform_1iv as *const c_void,
        "glUniform2iv" => uniform_2iv as *const c_void,
        "glUniform1fv" => uniform_1fv as *const c_void,
        "glGenFramebuffers" => gen_framebuffers as *const c_void,
        "glDeleteFramebuffers" => delete_framebuffers as *const c_void,
        "glCheckFramebufferStatus" => check_framebuffer_status as *const c_void,
        "glBindFramebuffer" => bind_framebuffer as *const c_void,
        "glFramebufferTexture2D" => framebuffer_texture_2d as *const c_void,
        "glDrawBuffers" => draw_buffers as *const c_void,
        "glGetAttribLocation" => get_attrib_location as *const c_void,
        "glVertexAttribPointer" => vertex_attrib_pointer as *const c_void,
        "glDrawElements" => draw_elements as *const c_void,
        "glEnableVertexAttribArray" => enable_vertex_attrib_array as *const c_void,
        "glDisableVertexAttribArray" => disable_vertex_attrib_array as *const c_void,
        _ => std::ptr::null(),
    }
}
