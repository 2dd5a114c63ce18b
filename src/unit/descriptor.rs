// ABOUTME: Structured view of a container unit's [Container] section.
// ABOUTME: Parses recognized directives, derives host directories and ports, and regenerates the section.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use super::error::UnitError;
use super::tokenizer::{directives_in, tokenize};
use super::{CONTAINER_SECTION, keys};

/// The directives of a container unit this crate understands.
///
/// Scalar directives keep the last occurrence; list directives accumulate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitDescriptor {
    pub image: Option<String>,
    /// Absolute host-side source paths of bind-mount volumes, in file order.
    pub volume_sources: Vec<String>,
    /// Every `Volume=` value verbatim, including named volumes.
    pub volumes: Vec<String>,
    pub environment_file: Option<String>,
    /// `host:container` as written.
    pub publish_port: Option<String>,
    /// Inline assignments; an empty value means "inherit from the host environment".
    pub environment: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub exit_policy: Option<String>,
    pub pull_policy: Option<String>,
    pub network: Option<String>,
}

impl UnitDescriptor {
    /// Parse unit text. Unknown directives and sections are ignored.
    pub fn parse(text: &str) -> Self {
        let lines = tokenize(text);
        let mut desc = UnitDescriptor::default();

        for (key, value) in directives_in(&lines, CONTAINER_SECTION) {
            match key {
                keys::IMAGE => desc.image = Some(value.to_string()),
                keys::ENVIRONMENT_FILE => desc.environment_file = Some(value.to_string()),
                keys::PUBLISH_PORT => desc.publish_port = Some(value.to_string()),
                keys::EXIT_POLICY => desc.exit_policy = Some(value.to_string()),
                keys::PULL => desc.pull_policy = Some(value.to_string()),
                keys::NETWORK => desc.network = Some(value.to_string()),
                keys::VOLUME => {
                    let source = value.split(':').next().unwrap_or_default();
                    if Path::new(source).is_absolute() {
                        desc.volume_sources.push(source.to_string());
                    }
                    desc.volumes.push(value.to_string());
                }
                keys::ENVIRONMENT => {
                    let (name, val) = value.split_once('=').unwrap_or((value, ""));
                    desc.environment.insert(name.to_string(), val.to_string());
                }
                keys::LABEL => {
                    if let Some((name, val)) = value.split_once('=') {
                        desc.labels.insert(name.to_string(), val.to_string());
                    }
                }
                _ => {}
            }
        }

        desc
    }

    /// Host directories that must exist before the container starts.
    ///
    /// Bind-mount sources first, then the directory holding the environment
    /// file when that path is absolute.
    pub fn required_host_directories(&self) -> Vec<String> {
        let mut dirs = self.volume_sources.clone();
        if let Some(dir) = self
            .environment_file
            .as_deref()
            .map(Path::new)
            .filter(|path| path.is_absolute())
            .and_then(Path::parent)
        {
            dirs.push(dir.to_string_lossy().into_owned());
        }
        dirs
    }

    /// The host side of `PublishPort=host:container`.
    pub fn extract_host_port(&self) -> Result<u16, UnitError> {
        let spec = self
            .publish_port
            .as_deref()
            .ok_or(UnitError::MissingPublishPort)?;
        let invalid = |reason| UnitError::InvalidPortSpec {
            spec: spec.to_string(),
            reason,
        };

        let (host, _container) = spec.split_once(':').ok_or_else(|| invalid("missing ':'"))?;
        host.trim()
            .parse::<u16>()
            .map_err(|_| invalid("host port is not a number"))
    }

    /// Regenerate a `[Container]` section holding every recognized directive.
    pub fn to_container_section(&self) -> String {
        let mut out = format!("[{CONTAINER_SECTION}]\n");
        let mut line = |key: &str, value: &str| {
            let _ = writeln!(out, "{key}={value}");
        };

        if let Some(image) = &self.image {
            line(keys::IMAGE, image);
        }
        if let Some(pull) = &self.pull_policy {
            line(keys::PULL, pull);
        }
        if let Some(network) = &self.network {
            line(keys::NETWORK, network);
        }
        if let Some(port) = &self.publish_port {
            line(keys::PUBLISH_PORT, port);
        }
        if let Some(file) = &self.environment_file {
            line(keys::ENVIRONMENT_FILE, file);
        }
        for (name, value) in &self.environment {
            if value.is_empty() {
                line(keys::ENVIRONMENT, name);
            } else {
                line(keys::ENVIRONMENT, &format!("{name}={value}"));
            }
        }
        for volume in &self.volumes {
            line(keys::VOLUME, volume);
        }
        for (name, value) in &self.labels {
            line(keys::LABEL, &format!("{name}={value}"));
        }
        if let Some(policy) = &self.exit_policy {
            line(keys::EXIT_POLICY, policy);
        }

        out
    }
}
