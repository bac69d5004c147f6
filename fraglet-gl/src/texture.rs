//! Texture registry, device allocation, and host↔device transfers

use std::ffi::c_void;

use log::{debug, warn};

use crate::sys::{self, GLenum, GLint, GLuint};
use crate::{Buffer, Context, Error};

/// The external format / element type pair of a texture
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PixelFormat {
    pub format: GLenum,
    pub ty: GLenum,
}

impl PixelFormat {
    /// Chooses the texture format matching a buffer's channel count and
    /// element size
    ///
    /// # Panics
    /// On channel counts other than 1, 3, or 4, and on element sizes other
    /// than 1 or 2 bytes; the target profile has no texture format for
    /// those.
    pub fn for_buffer(buf: &Buffer) -> Self {
        let format = match buf.channels() {
            1 => sys::GL_LUMINANCE,
            3 => sys::GL_RGB,
            4 => sys::GL_RGBA,
            n => panic!("only 1, 3, or 4 color channels are supported, got {n}"),
        };
        let ty = match buf.elem_size {
            1 => sys::GL_UNSIGNED_BYTE,
            2 => sys::GL_UNSIGNED_SHORT,
            n => panic!("only 8-bit and 16-bit elements are supported, got {n} bytes"),
        };
        Self { format, ty }
    }

    /// Fallback pair for textures whose true format was never recorded
    pub fn rgba_float() -> Self {
        Self {
            format: sys::GL_RGBA,
            ty: sys::GL_FLOAT,
        }
    }

    /// Bytes occupied by one pixel in this format
    pub fn bytes_per_pixel(&self) -> usize {
        let channels = match self.format {
            sys::GL_LUMINANCE => 1,
            sys::GL_RGB => 3,
            _ => 4,
        };
        let elem = match self.ty {
            sys::GL_UNSIGNED_BYTE => 1,
            sys::GL_UNSIGNED_SHORT => 2,
            _ => 4,
        };
        channels * elem
    }
}

/// Runtime bookkeeping for one GPU texture backing a buffer
///
/// Dispatch only sees texture handles, so the geometry needed for the
/// `output_min` / `output_extent` uniforms is captured here at allocation
/// time.
#[derive(Debug)]
pub struct TextureInfo {
    pub min: [i32; 3],
    pub extent: [i32; 3],
    /// Format chosen at allocation; `None` for host-supplied textures,
    /// whose real format the runtime cannot see
    pub format: Option<PixelFormat>,
    /// Whether the runtime owns the GL object and deletes it on free
    pub owned: bool,
}

impl Context {
    /// Ensures a buffer is backed by a texture and registered
    ///
    /// If the device slot already holds a texture the host application
    /// supplied one; it is recorded as borrowed and never deleted.
    /// Otherwise a texture of the matching size and format is allocated,
    /// with nearest filtering and clamp-to-edge wrapping, and its handle is
    /// stored in the buffer's device slot.
    ///
    /// # Panics
    /// On more than 4 color channels, a fourth dimension wider than 1, or
    /// an element size without a texture format.
    pub fn dev_malloc(&mut self, buf: &mut Buffer) {
        let mut texture = buf.texture_id();
        let mut format = None;
        let mut owned = false;
        if texture == 0 {
            assert!(
                buf.extent[2] <= 4,
                "only up to 4 color channels are supported"
            );
            assert!(buf.extent[3] <= 1, "3D textures are not supported");
            let (width, height) = buf.size_2d();
            let chosen = PixelFormat::for_buffer(buf);

            unsafe {
                (self.api.GenTextures)(1, &mut texture);
                (self.api.BindTexture)(sys::GL_TEXTURE_2D, texture);
                (self.api.TexParameteri)(
                    sys::GL_TEXTURE_2D,
                    sys::GL_TEXTURE_MIN_FILTER,
                    sys::GL_NEAREST,
                );
                (self.api.TexParameteri)(
                    sys::GL_TEXTURE_2D,
                    sys::GL_TEXTURE_MAG_FILTER,
                    sys::GL_NEAREST,
                );
                (self.api.TexParameteri)(
                    sys::GL_TEXTURE_2D,
                    sys::GL_TEXTURE_WRAP_S,
                    sys::GL_CLAMP_TO_EDGE,
                );
                (self.api.TexParameteri)(
                    sys::GL_TEXTURE_2D,
                    sys::GL_TEXTURE_WRAP_T,
                    sys::GL_CLAMP_TO_EDGE,
                );
                // Storage only; pixels arrive through copy_to_dev.
                (self.api.TexImage2D)(
                    sys::GL_TEXTURE_2D,
                    0,
                    chosen.format as GLint,
                    width,
                    height,
                    0,
                    chosen.format,
                    chosen.ty,
                    std::ptr::null(),
                );
                (self.api.BindTexture)(sys::GL_TEXTURE_2D, 0);
            }
            self.check_gl_error("dev_malloc");

            buf.set_texture_id(texture);
            format = Some(chosen);
            owned = true;
            debug!("allocated {width}x{height} texture {texture}");
        } else {
            debug!("buffer arrived with host texture {texture}; assuming a matching format");
        }

        self.textures.insert(
            texture,
            TextureInfo {
                min: [buf.min[0], buf.min[1], buf.min[2]],
                extent: [buf.extent[0], buf.extent[1], buf.extent[2]],
                format,
                owned,
            },
        );
    }

    /// Drops a buffer's texture registration
    ///
    /// The GL texture itself is deleted (and the device slot cleared) only
    /// when the runtime allocated it; host-supplied textures stay alive.
    /// A buffer with an empty device slot is a no-op.
    ///
    /// # Panics
    /// If the texture was never registered with this context.
    pub fn dev_free(&mut self, buf: &mut Buffer) {
        let texture = buf.texture_id();
        if texture == 0 {
            return;
        }
        let info = self
            .textures
            .remove(&texture)
            .expect("texture was never registered with this context");
        if info.owned {
            unsafe { (self.api.DeleteTextures)(1, &texture) };
            buf.dev = 0;
        }
    }

    /// Uploads dirty host pixels into the buffer's texture
    ///
    /// A no-op unless `host_dirty` is set.  The layout must be tightly
    /// packed interleaved; the upload uses the format recorded when the
    /// texture was allocated.
    pub fn copy_to_dev(&mut self, buf: &mut Buffer) -> Result<(), Error> {
        if !buf.host_dirty {
            return Ok(());
        }
        assert!(
            !buf.host.is_null() && buf.dev != 0,
            "transfer requires both host and device storage"
        );
        if !buf.gl_compatible() {
            return Err(Error::UnsupportedLayout);
        }

        let texture = buf.texture_id();
        let (width, height) = buf.size_2d();
        let format = self.transfer_format(texture);
        debug!("copy_to_dev: texture {texture}");
        unsafe {
            (self.api.BindTexture)(sys::GL_TEXTURE_2D, texture);
            (self.api.TexSubImage2D)(
                sys::GL_TEXTURE_2D,
                0,
                0,
                0,
                width,
                height,
                format.format,
                format.ty,
                buf.host as *const c_void,
            );
            (self.api.BindTexture)(sys::GL_TEXTURE_2D, 0);
        }
        self.check_gl_error("copy_to_dev");
        buf.host_dirty = false;
        Ok(())
    }

    /// Reads the buffer's texture back into host memory
    ///
    /// A no-op unless `dev_dirty` is set; otherwise the mirror image of
    /// [`copy_to_dev`](Context::copy_to_dev).
    pub fn copy_to_host(&mut self, buf: &mut Buffer) -> Result<(), Error> {
        if !buf.dev_dirty {
            return Ok(());
        }
        assert!(
            !buf.host.is_null() && buf.dev != 0,
            "transfer requires both host and device storage"
        );
        if !buf.gl_compatible() {
            return Err(Error::UnsupportedLayout);
        }

        let texture = buf.texture_id();
        let format = self.transfer_format(texture);
        debug!("copy_to_host: texture {texture}");
        unsafe {
            (self.api.BindTexture)(sys::GL_TEXTURE_2D, texture);
            (self.api.GetTexImage)(
                sys::GL_TEXTURE_2D,
                0,
                format.format,
                format.ty,
                buf.host as *mut c_void,
            );
            (self.api.BindTexture)(sys::GL_TEXTURE_2D, 0);
        }
        self.check_gl_error("copy_to_host");
        buf.dev_dirty = false;
        Ok(())
    }

    /// Returns the transfer format recorded for a texture, falling back to
    /// RGBA floats when nothing was recorded
    fn transfer_format(&self, texture: GLuint) -> PixelFormat {
        match self.textures.get(&texture).and_then(|info| info.format) {
            Some(format) => format,
            None => {
                warn!("texture {texture} has no recorded format; transferring as RGBA floats");
                PixelFormat::rgba_float()
            }
        }
    }
}
