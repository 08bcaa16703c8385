//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Failed to parse a DDS container.
    #[error("Failed to parse DDS file: {0}")]
    DdsParse(#[from] ddsfile::Error),

    /// A DDS file is structurally valid but unusable.
    #[error("Invalid DDS file '{path}': {message}")]
    InvalidDds {
        /// Path to the offending file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
