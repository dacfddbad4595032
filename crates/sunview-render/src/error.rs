//! Error types for the render module

use thiserror::Error;

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while measuring areas on the GPU. Unlike the
/// data loaders these are real failures, not degradations.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No GPU adapter available")]
    NoAdapter,

    #[error("Device request failed: {0}")]
    RequestDevice(String),

    #[error("Occlusion query readback timed out")]
    QueryTimeout,

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Image(err.to_string())
    }
}
