// ABOUTME: Config settings that are written inline or supplied at runtime.
// ABOUTME: Resolves literals, environment variables with fallbacks, and credential files.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// A setting such as the database URL.
///
/// ```yaml
/// url: sqlite:///var/lib/shipyard/state.db     # literal
/// url: { env: SHIPYARD_DATABASE_URL, default: sqlite://shipyard.db }
/// url: { file: /run/credentials/shipyard/database-url }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
    /// Read from a file, e.g. a systemd credential. Surrounding whitespace is dropped.
    FromFile { file: PathBuf },
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        EnvValue::Literal(value.into())
    }

    /// The effective value. An environment variable set to the empty string
    /// counts as unset.
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(value) => Ok(value.clone()),
            EnvValue::FromEnv { var, default } => {
                match std::env::var(var).ok().filter(|v| !v.is_empty()) {
                    Some(value) => Ok(value),
                    None => default
                        .clone()
                        .ok_or_else(|| Error::MissingEnvVar(var.clone())),
                }
            }
            EnvValue::FromFile { file } => {
                let content = std::fs::read_to_string(file)?;
                let value = content.trim();
                if value.is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "{} is empty",
                        file.display()
                    )));
                }
                Ok(value.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_form() {
        let literal: EnvValue = serde_yaml::from_str("sqlite://a.db").unwrap();
        assert_eq!(literal, EnvValue::literal("sqlite://a.db"));

        let env: EnvValue = serde_yaml::from_str("env: DB_URL").unwrap();
        assert_eq!(
            env,
            EnvValue::FromEnv {
                var: "DB_URL".to_string(),
                default: None
            }
        );

        let file: EnvValue = serde_yaml::from_str("file: /run/creds/db").unwrap();
        assert_eq!(
            file,
            EnvValue::FromFile {
                file: PathBuf::from("/run/creds/db")
            }
        );
    }

    #[test]
    fn empty_variable_falls_back_to_default() {
        let value = EnvValue::FromEnv {
            var: "SHIPYARD_ENV_VALUE_EMPTY".to_string(),
            default: Some("sqlite://fallback.db".to_string()),
        };
        temp_env::with_var("SHIPYARD_ENV_VALUE_EMPTY", Some(""), || {
            assert_eq!(value.resolve().unwrap(), "sqlite://fallback.db");
        });
    }

    #[test]
    fn credential_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database-url");
        std::fs::write(&path, "sqlite:///srv/state.db\n").unwrap();

        let value = EnvValue::FromFile { file: path.clone() };
        assert_eq!(value.resolve().unwrap(), "sqlite:///srv/state.db");

        std::fs::write(&path, "  \n").unwrap();
        assert!(matches!(value.resolve(), Err(Error::InvalidConfig(_))));
    }
}
