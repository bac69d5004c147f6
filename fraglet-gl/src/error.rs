//! Module containing the fraglet-gl universal error type
use thiserror::Error;

/// Universal error type for the OpenGL device runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("could not resolve driver entry point {0}")]
    MissingSymbol(&'static str),

    #[error("shader failed to compile:\n{0}")]
    ShaderCompile(String),

    #[error("kernel header is missing a `/// KERNEL <name>` line")]
    BadKernelHeader,

    #[error("unsupported kernel argument declaration `{0}`")]
    BadArgumentType(String),

    #[error("buffer layout is not tightly packed interleaved")]
    UnsupportedLayout,
}
