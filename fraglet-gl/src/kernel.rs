//! Kernel registry: header parsing, compilation, linking, and lookup
//!
//! The compiler emits one source blob per pipeline containing any number of
//! kernels.  Each kernel opens with a header of line-oriented directives:
//!
//! ```text
//! /// KERNEL blur_x
//! /// IN buffer input
//! /// IN float strength
//! /// OUT buffer output
//! ```
//!
//! The header ends at the first line that is not a directive; everything up
//! to the next `/// KERNEL` marker (or the end of the blob) is the verbatim
//! GLSL fragment shader for that kernel.  Since the directives are GLSL
//! comments, the whole chunk compiles as-is.  The declared argument order is
//! the calling convention: dispatch supplies actuals in the same order.

use log::{debug, error, warn};

use crate::context::{make_shader, program_info_log};
use crate::sys::{self, Api, GLuint};
use crate::{Context, Error};

const KERNEL_MARKER: &str = "/// KERNEL ";
const INPUT_MARKER: &str = "/// IN ";
const OUTPUT_MARKER: &str = "/// OUT ";

/// The type of one kernel argument
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArgKind {
    Float,
    Int,
    Buffer,
}

/// One declared kernel argument
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Argument {
    pub name: String,
    pub kind: ArgKind,
    /// Output arguments become framebuffer attachments instead of uniforms
    pub is_output: bool,
}

/// A registered kernel
#[derive(Debug, PartialEq, Eq)]
pub struct Kernel {
    /// Verbatim GLSL chunk, header comments included
    pub source: String,
    pub name: String,
    /// Arguments in declaration order, which is the dispatch calling
    /// convention
    pub arguments: Vec<Argument>,
    pub shader: GLuint,
    /// Linked program, or 0 when compilation or linking failed
    pub program: GLuint,
}

impl Kernel {
    /// Releases the kernel's GL objects
    pub(crate) fn destroy(&self, api: &Api) {
        unsafe {
            (api.DeleteProgram)(self.program);
            (api.DeleteShader)(self.shader);
        }
    }
}

fn parse_argument(decl: &str, is_output: bool) -> Result<Argument, Error> {
    let (kind, name) = if let Some(name) = decl.strip_prefix("float ") {
        (ArgKind::Float, name)
    } else if let Some(name) = decl.strip_prefix("int ") {
        (ArgKind::Int, name)
    } else if let Some(name) = decl.strip_prefix("buffer ") {
        (ArgKind::Buffer, name)
    } else {
        return Err(Error::BadArgumentType(decl.to_owned()));
    };
    Ok(Argument {
        name: name.to_owned(),
        kind,
        is_output,
    })
}

/// Parses one kernel chunk (header plus GLSL body)
fn parse_kernel(chunk: &str) -> Result<Kernel, Error> {
    let mut name = None;
    let mut arguments = Vec::new();
    for line in chunk.lines() {
        if let Some(rest) = line.strip_prefix(KERNEL_MARKER) {
            name = Some(rest.to_owned());
        } else if let Some(rest) = line.strip_prefix(INPUT_MARKER) {
            arguments.push(parse_argument(rest, false)?);
        } else if let Some(rest) = line.strip_prefix(OUTPUT_MARKER) {
            arguments.push(parse_argument(rest, true)?);
        } else {
            break;
        }
    }
    let name = name
        .filter(|n| !n.is_empty())
        .ok_or(Error::BadKernelHeader)?;
    Ok(Kernel {
        source: chunk.to_owned(),
        name,
        arguments,
        shader: 0,
        program: 0,
    })
}

/// Splits a source blob at every kernel marker and parses each chunk
///
/// Text before the first marker is ignored; an empty blob yields no kernels.
pub(crate) fn parse_kernels(src: &str) -> Result<Vec<Kernel>, Error> {
    let mut out = Vec::new();
    let Some(mut begin) = src.find(KERNEL_MARKER) else {
        return Ok(out);
    };
    loop {
        let header_end = begin + KERNEL_MARKER.len();
        let end = src[header_end..]
            .find(KERNEL_MARKER)
            .map(|offset| header_end + offset)
            .unwrap_or(src.len());
        out.push(parse_kernel(&src[begin..end])?);
        if end == src.len() {
            break;
        }
        begin = end;
    }
    Ok(out)
}

impl Context {
    /// Registers, compiles, and links every kernel in a source blob
    ///
    /// Compile and link failures are logged and leave the kernel registered
    /// with a zero program handle, so a later dispatch by that name fails
    /// cleanly.  A kernel whose name is already registered is discarded with
    /// a warning.  Malformed headers abort the whole call.
    pub fn init_kernels(&mut self, src: &str) -> Result<(), Error> {
        for mut kernel in parse_kernels(src)? {
            if self.kernels.contains_key(&kernel.name) {
                warn!("duplicate kernel name '{}'", kernel.name);
                continue;
            }
            match make_shader(&self.api, sys::GL_FRAGMENT_SHADER, &kernel.source) {
                Ok(shader) => {
                    kernel.shader = shader;
                    kernel.program = self.link_program(shader, &kernel.name);
                }
                Err(err) => error!("could not compile kernel '{}': {err}", kernel.name),
            }
            debug!(
                "registered kernel '{}' with {} arguments",
                kernel.name,
                kernel.arguments.len()
            );
            self.kernels.insert(kernel.name.clone(), kernel);
        }
        Ok(())
    }

    /// Links a program from the shared vertex shader and a kernel's
    /// fragment shader, returning 0 on failure
    fn link_program(&self, fragment_shader: GLuint, name: &str) -> GLuint {
        unsafe {
            let program = (self.api.CreateProgram)();
            (self.api.AttachShader)(program, self.vertex_shader);
            (self.api.AttachShader)(program, fragment_shader);
            (self.api.LinkProgram)(program);

            let mut ok = 0;
            (self.api.GetProgramiv)(program, sys::GL_LINK_STATUS, &mut ok);
            if ok == 0 {
                error!(
                    "could not link program for kernel '{name}':\n{}",
                    program_info_log(&self.api, program)
                );
                (self.api.DeleteProgram)(program);
                return 0;
            }
            program
        }
    }
}
