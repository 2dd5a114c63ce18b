// ABOUTME: Application-wide error types for shipyard.
// ABOUTME: Wraps module errors and exposes a shared ErrorKind for programmatic handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::queue::QueueError;
use crate::rollout::{ArtifactError, RolloutError};
use crate::store::StoreError;
use crate::unit::UnitError;

/// Coarse error categories shared by every module.
///
/// `NotFound` on a queue claim means "no work", not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Absent entity, or an empty queue on claim.
    NotFound,
    /// Rejected input: malformed descriptor, missing field, bad port, empty image.
    Validation,
    /// Unparsable persisted text, such as a bad port spec in a unit file.
    Format,
    /// Lost a claim race; retry or treat as claimed elsewhere.
    ConcurrencyConflict,
    /// A multi-row write was rolled back.
    TransactionFailure,
    /// A status change the state machine does not allow.
    InvalidTransition,
    /// Database or encryption backend failure.
    Storage,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Rollout(#[from] RolloutError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AlreadyExists(_)
            | Error::MissingEnvVar(_)
            | Error::InvalidConfig(_)
            | Error::Yaml(_) => ErrorKind::Validation,
            Error::ConfigNotFound(_) => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::Storage,
            Error::Unit(e) => e.kind(),
            Error::Descriptor(e) => e.kind(),
            Error::Artifact(e) => e.kind(),
            Error::Queue(e) => e.kind(),
            Error::Rollout(e) => e.kind(),
            Error::Store(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
