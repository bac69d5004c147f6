//! Compiler-side infrastructure for targeting the fraglet OpenGL runtime
//!
//! This crate holds the loop-nest [IR](ir) an image-pipeline compiler
//! schedules into, and the [lowering passes](lower) that retarget GPU block
//! loops at the OpenGL device runtime.  The runtime itself lives in the
//! sibling `fraglet-gl` crate; the only contract between the two is the
//! intrinsic names ([`lower::TEXTURE_LOAD`], [`lower::TEXTURE_STORE`]) and
//! the `pixcoord` / `output_min` / `output_extent` shader vocabulary the
//! lowered coordinates are written against.

pub mod ir;
pub mod lower;

mod error;
pub use error::Error;
