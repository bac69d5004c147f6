//! Dispatch: executing one kernel as a full-screen draw
//!
//! A dispatch binds the kernel's program, feeds scalar arguments through
//! uniforms and buffer arguments through texture units, attaches the output
//! texture to the shared framebuffer, and draws the unit square as a
//! triangle strip.  Rasterization then invokes the fragment shader once per
//! output pixel; the shared vertex shader's `pixcoord` varying tells each
//! invocation which pixel it is computing.

use log::{debug, error, warn};

use crate::kernel::ArgKind;
use crate::sys::{self, GLchar, GLenum, GLint, GLsizei, GLuint};
use crate::Context;

/// One actual argument of a dispatch, aligned with the kernel's declared
/// argument order
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ArgValue {
    Int(i32),
    Float(f32),
    /// The GL texture backing a buffer argument
    Buffer(GLuint),
}

impl Context {
    /// Runs the named kernel over its output domain
    ///
    /// `args` supplies one actual per declared argument, in declaration
    /// order.  Block and thread counts and the shared-memory size are part
    /// of the generic device ABI but carry no meaning here: the draw always
    /// covers the full output extent recorded for the output texture.
    ///
    /// An unknown entry name, a kernel with no declared output, or an
    /// incomplete framebuffer logs a diagnostic and returns without
    /// drawing.
    ///
    /// # Panics
    /// If the actuals do not match the declared arguments one-for-one, if
    /// an actual's type contradicts its declaration, or if an output
    /// texture was never registered.  More than one output is rejected:
    /// the target profile has a single color attachment.
    pub fn dev_run(
        &self,
        entry_name: &str,
        _blocks: [u32; 3],
        _threads: [u32; 3],
        _shared_mem_bytes: usize,
        args: &[ArgValue],
    ) {
        let Some(kernel) = self.kernels.get(entry_name) else {
            error!("could not find a kernel named '{entry_name}'");
            return;
        };

        unsafe { (self.api.UseProgram)(kernel.program) };

        // Feed inputs to uniforms and texture units in declaration order.
        let mut declared = kernel.arguments.iter();
        let mut active_textures: GLint = 0;
        for (i, actual) in args.iter().enumerate() {
            let Some(arg) = declared.next() else {
                panic!("too many arguments passed to kernel '{entry_name}'");
            };
            if arg.is_output {
                continue;
            }

            let loc = self.uniform_location(kernel.program, &arg.name);
            if loc == -1 {
                // The GLSL compiler probably optimized the argument away.
                debug!("ignoring argument '{}'", arg.name);
                continue;
            }
            match (arg.kind, actual) {
                (ArgKind::Int, ArgValue::Int(v)) => {
                    debug!("int argument {i} ({}): {v}", arg.name);
                    unsafe { (self.api.Uniform1iv)(loc, 1, v) };
                }
                (ArgKind::Float, ArgValue::Float(v)) => {
                    debug!("float argument {i} ({}): {v}", arg.name);
                    unsafe { (self.api.Uniform1fv)(loc, 1, v) };
                }
                (ArgKind::Buffer, ArgValue::Buffer(texture)) => {
                    debug!("buffer argument {i} ({}): {texture}", arg.name);
                    unsafe {
                        (self.api.ActiveTexture)(
                            sys::GL_TEXTURE0 + active_textures as GLenum,
                        );
                        (self.api.BindTexture)(sys::GL_TEXTURE_2D, *texture);
                        (self.api.Uniform1iv)(loc, 1, &active_textures);
                    }
                    active_textures += 1;
                }
                (kind, actual) => panic!(
                    "kernel '{entry_name}' argument '{}' is declared {kind:?} \
                     but was passed {actual:?}",
                    arg.name
                ),
            }
        }
        assert!(
            declared.next().is_none(),
            "too few arguments passed to kernel '{entry_name}'"
        );

        // Attach the output texture to the shared framebuffer.
        let mut output_min: [GLint; 2] = [0, 0];
        let mut output_extent: [GLint; 2] = [0, 0];
        unsafe {
            (self.api.BindFramebuffer)(sys::GL_FRAMEBUFFER, self.framebuffer);
            (self.api.Disable)(sys::GL_CULL_FACE);
            (self.api.Disable)(sys::GL_DEPTH_TEST);
        }

        let mut num_outputs: GLsizei = 0;
        for (arg, actual) in kernel.arguments.iter().zip(args) {
            if !arg.is_output {
                continue;
            }
            assert!(
                num_outputs < 1,
                "this profile supports one single output texture"
            );
            let ArgValue::Buffer(texture) = actual else {
                panic!("output argument '{}' must be a buffer", arg.name);
            };
            debug!("output texture {num_outputs}: {texture}");
            unsafe {
                (self.api.FramebufferTexture2D)(
                    sys::GL_FRAMEBUFFER,
                    sys::GL_COLOR_ATTACHMENT0 + num_outputs as GLenum,
                    sys::GL_TEXTURE_2D,
                    *texture,
                    0,
                )
            };
            let info = self
                .textures
                .get(texture)
                .expect("output texture was never registered");
            output_min = [info.min[0], info.min[1]];
            output_extent = [info.extent[0], info.extent[1]];
            num_outputs += 1;
        }
        if num_outputs == 0 {
            warn!("kernel '{entry_name}' has no output");
            unsafe { (self.api.BindFramebuffer)(sys::GL_FRAMEBUFFER, 0) };
            return;
        }
        let attachments: Vec<GLenum> = (0..num_outputs)
            .map(|i| sys::GL_COLOR_ATTACHMENT0 + i as GLenum)
            .collect();
        unsafe { (self.api.DrawBuffers)(num_outputs, attachments.as_ptr()) };
        self.check_gl_error("dev_run attachment setup");

        let status = unsafe { (self.api.CheckFramebufferStatus)(sys::GL_FRAMEBUFFER) };
        if status != sys::GL_FRAMEBUFFER_COMPLETE {
            error!(
                "framebuffer {} is incomplete ({status:#06x})",
                self.framebuffer
            );
            unsafe { (self.api.BindFramebuffer)(sys::GL_FRAMEBUFFER, 0) };
            return;
        }

        // Point the coordinate contract at the output geometry.
        unsafe {
            let loc = self.uniform_location(kernel.program, "output_extent");
            (self.api.Uniform2iv)(loc, 1, output_extent.as_ptr());
            let loc = self.uniform_location(kernel.program, "output_min");
            (self.api.Uniform2iv)(loc, 1, output_min.as_ptr());

            (self.api.MatrixMode)(sys::GL_MODELVIEW);
            (self.api.LoadIdentity)();
            (self.api.MatrixMode)(sys::GL_PROJECTION);
            (self.api.LoadIdentity)();
            (self.api.Ortho)(-1.0, 1.0, -1.0, 1.0, 1.0, -1.0);
            (self.api.Viewport)(0, 0, output_extent[0], output_extent[1]);
        }

        // One quad, one fragment per output pixel.
        unsafe {
            let position = (self.api.GetAttribLocation)(
                kernel.program,
                c"position".as_ptr() as *const GLchar,
            ) as GLuint;
            (self.api.BindBuffer)(sys::GL_ARRAY_BUFFER, self.vertex_buffer);
            (self.api.VertexAttribPointer)(
                position,
                2,
                sys::GL_FLOAT,
                sys::GL_FALSE,
                2 * std::mem::size_of::<f32>() as GLsizei,
                std::ptr::null(),
            );
            (self.api.EnableVertexAttribArray)(position);
            (self.api.BindBuffer)(sys::GL_ELEMENT_ARRAY_BUFFER, self.element_buffer);
            (self.api.DrawElements)(
                sys::GL_TRIANGLE_STRIP,
                4,
                sys::GL_UNSIGNED_INT,
                std::ptr::null(),
            );
            (self.api.DisableVertexAttribArray)(position);
        }
        self.check_gl_error("dev_run draw");

        // Restore the shared state dispatch mutated.
        unsafe {
            for unit in 0..active_textures {
                (self.api.ActiveTexture)(sys::GL_TEXTURE0 + unit as GLenum);
                (self.api.BindTexture)(sys::GL_TEXTURE_2D, 0);
            }
            (self.api.BindFramebuffer)(sys::GL_FRAMEBUFFER, 0);
        }
    }
}
