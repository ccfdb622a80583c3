use thiserror::Error;

/// Errors returned by the public API.
///
/// Store-level problems (bad keys, unparsable values, undecodable packets)
/// are never returned where they happen. They are collected by
/// [`Diagnostics`](crate::diagnostics::Diagnostics) and surface as [`Error::Store`]
/// when the session drains them at the end of the operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open image: {0}")]
    Open(String),

    #[error("Failed to allocate {size} bytes")]
    Allocation { size: usize },

    #[error("{0}")]
    Store(String),

    #[error("{0} is not present in the image")]
    NotPresent(&'static str),

    #[error("The image has already been closed")]
    UseAfterClose,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
