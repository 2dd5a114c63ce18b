// ABOUTME: Error types for unit text parsing, patching, and validation.
// ABOUTME: Distinguishes malformed persisted directives from rejected caller input.

use crate::error::ErrorKind;

/// Errors produced by the unit codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    /// The unit has no `PublishPort=` directive.
    #[error("unit does not publish a port")]
    MissingPublishPort,

    /// A `PublishPort=` value that is not `host:container`.
    #[error("invalid port spec {spec:?}: {reason}")]
    InvalidPortSpec { spec: String, reason: &'static str },

    /// Image replacement was asked to write an empty reference.
    #[error("image reference cannot be empty")]
    EmptyImage,

    /// An image reference containing whitespace or control characters.
    #[error("invalid image reference {0:?}: whitespace and control characters are not allowed")]
    InvalidImage(String),

    /// One or more mandatory sections are absent.
    #[error("unit is missing required section(s): {}", .0.join(", "))]
    MissingSections(Vec<&'static str>),
}

impl UnitError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UnitError::MissingPublishPort
            | UnitError::InvalidPortSpec { .. }
            | UnitError::MissingSections(_) => ErrorKind::Format,
            UnitError::EmptyImage | UnitError::InvalidImage(_) => ErrorKind::Validation,
        }
    }
}
