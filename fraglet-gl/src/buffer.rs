//! Compiler-visible image buffer descriptor

use crate::sys::{GLsizei, GLuint};

/// An N-dimensional image descriptor shared with compiled pipelines
///
/// This mirrors the compiler's runtime ABI: up to four dimensions with
/// per-dimension origin and stride, a host allocation, a device handle slot,
/// and the two dirty flags that drive transfers.  At most one side is
/// expected to be dirty at a time; violating that is a pipeline bug the
/// runtime does not detect.
#[derive(Debug)]
pub struct Buffer {
    /// Host-side pixel storage, or null if none is attached
    pub host: *mut u8,
    /// Device handle slot; the low 32 bits carry the GL texture id
    pub dev: u64,
    pub extent: [i32; 4],
    pub min: [i32; 4],
    pub stride: [i32; 4],
    /// Size of one element in bytes
    pub elem_size: i32,
    pub host_dirty: bool,
    pub dev_dirty: bool,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            host: std::ptr::null_mut(),
            dev: 0,
            extent: [0; 4],
            min: [0; 4],
            stride: [0; 4],
            elem_size: 1,
            host_dirty: false,
            dev_dirty: false,
        }
    }
}

impl Buffer {
    /// Returns the GL texture backing this buffer, or 0 if none
    ///
    /// # Panics
    /// If the device slot holds a handle wider than 32 bits, which cannot
    /// name a GL texture.
    pub fn texture_id(&self) -> GLuint {
        assert!(
            self.dev >> 32 == 0,
            "device handle {:#x} does not fit in a texture id",
            self.dev
        );
        self.dev as GLuint
    }

    /// Stores a GL texture handle into the device slot
    pub fn set_texture_id(&mut self, texture: GLuint) {
        self.dev = u64::from(texture);
    }

    /// Checks whether the layout is tightly packed interleaved
    ///
    /// Transfers require the channel stride to be 1 and the x stride to
    /// equal the channel count, the layout `glTexSubImage2D` consumes
    /// without row-length gymnastics.
    pub fn gl_compatible(&self) -> bool {
        self.stride[2] == 1 && self.stride[0] == self.extent[2]
    }

    /// Returns width and height, clamped to the 1×1 minimum texture size
    pub fn size_2d(&self) -> (GLsizei, GLsizei) {
        (self.extent[0].max(1), self.extent[1].max(1))
    }

    /// Returns the color channel count (a missing third dimension counts
    /// as one channel)
    pub fn channels(&self) -> i32 {
        self.extent[2].max(1)
    }
}
