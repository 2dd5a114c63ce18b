// ABOUTME: Error types for deploy descriptor parsing, validation, and rendering.
// ABOUTME: Every variant is a validation failure surfaced to whoever submitted the descriptor.

use crate::error::ErrorKind;
use crate::types::AppNameError;

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("failed to parse deploy descriptor: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("app name is required")]
    MissingAppName,

    #[error("invalid app name {name:?}: {source}")]
    InvalidAppName {
        name: String,
        #[source]
        source: AppNameError,
    },

    #[error("no image to deploy: set build.image or build.local_image")]
    NoImage,

    #[error("build.image and build.local_image are mutually exclusive")]
    ConflictingImages,

    #[error("http_service.internal_port must be between 1 and 65535, got {0}")]
    InvalidInternalPort(i64),

    #[error("mounts[{index}]: {reason}")]
    InvalidMount { index: usize, reason: &'static str },

    #[error("domains[{0}] cannot be empty")]
    EmptyDomain(usize),

    #[error("{field} must be a single line")]
    LineBreak { field: String },
}

impl DescriptorError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
