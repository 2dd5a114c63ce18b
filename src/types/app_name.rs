// ABOUTME: Application name validation for generated unit names.
// ABOUTME: Names end up as systemd unit and container names, so spaces and slashes are rejected.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppNameError {
    #[error("app name cannot be empty")]
    Empty,

    #[error("app name cannot contain whitespace")]
    ContainsWhitespace,

    #[error("app name cannot contain a path separator")]
    ContainsSlash,

    #[error("app name exceeds maximum length of 255 characters")]
    TooLong,
}

/// A name that is legal as a unit file stem (`<name>.container`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        check(value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check(value: &str) -> Result<(), AppNameError> {
    if value.is_empty() {
        return Err(AppNameError::Empty);
    }
    if value.len() > 255 {
        return Err(AppNameError::TooLong);
    }
    if value.chars().any(char::is_whitespace) {
        return Err(AppNameError::ContainsWhitespace);
    }
    if value.contains('/') || value.contains('\\') {
        return Err(AppNameError::ContainsSlash);
    }
    Ok(())
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
