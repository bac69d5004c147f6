//! Module containing the fraglet-core universal error type
use thiserror::Error;

/// Universal error type for fraglet-core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("texture stores take exactly three coordinates, got {0}")]
    BadStoreArity(usize),

    #[error("texture stores are single-valued, got {0} values")]
    MultiValueStore(usize),
}
