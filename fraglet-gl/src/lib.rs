//! OpenGL execution runtime for fraglet image pipelines
//!
//! The compiler emits GLSL fragment shaders annotated with structured
//! comments describing kernel entry points and their typed arguments; this
//! crate turns a host-supplied GL context into a compute device for them.
//! It resolves driver entry points through a `get_proc_address`-style hook,
//! compiles and registers kernels, backs compiler-visible buffers with
//! textures, transfers pixels between host memory and the device, and
//! dispatches a kernel by drawing a full-screen quad whose fragment shader
//! computes one output pixel per invocation.
//!
//! Everything hangs off a [`Context`]:
//!
//! ```no_run
//! # fn get_proc_address(_name: &str) -> *const std::ffi::c_void {
//! #     std::ptr::null()
//! # }
//! use fraglet_gl::{ArgValue, Buffer, Context};
//!
//! # let generated_glsl = "/// KERNEL brighten\n/// IN buffer input\nvoid main() {}\n";
//! let mut ctx = Context::new(get_proc_address)?;
//! ctx.init_kernels(generated_glsl)?;
//!
//! let mut image = Buffer::default();
//! // ... describe extents, strides, and host storage ...
//! ctx.dev_malloc(&mut image);
//! image.host_dirty = true;
//! ctx.copy_to_dev(&mut image)?;
//! ctx.dev_run(
//!     "brighten",
//!     [1, 1, 1],
//!     [1, 1, 1],
//!     0,
//!     &[ArgValue::Buffer(image.texture_id())],
//! );
//! # Ok::<(), fraglet_gl::Error>(())
//! ```
//!
//! All entry points must be called from the thread owning the GL context;
//! the runtime is single-threaded cooperative and adds no locking.

pub mod sys;

mod buffer;
mod context;
mod error;
mod kernel;
mod run;
mod texture;

#[cfg(test)]
mod mock;

pub use buffer::Buffer;
pub use context::Context;
pub use error::Error;
pub use kernel::{ArgKind, Argument, Kernel};
pub use run::ArgValue;
pub use texture::{PixelFormat, TextureInfo};
