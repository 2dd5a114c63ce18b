// ABOUTME: Renders deploy descriptors into Quadlet container unit text.
// ABOUTME: Emission order is fixed so the same descriptor always yields byte-identical output.

use std::fmt::Write as _;
use std::time::Duration;

use super::{DEFAULT_KILL_SIGNAL, DeployDescriptor, DescriptorError};
use crate::unit::{CONTAINER_SECTION, INSTALL_SECTION, UNIT_SECTION, keys};

impl DeployDescriptor {
    /// Render the descriptor as a `.container` unit.
    ///
    /// Only checks that an image is present and that no value would break
    /// onto a new line; run [`DeployDescriptor::validate`] first for full checking.
    pub fn render(&self) -> Result<String, DescriptorError> {
        let image = self.image().ok_or(DescriptorError::NoImage)?;
        self.check_single_line()?;

        let mut unit = UnitWriter::default();

        unit.section(UNIT_SECTION);
        unit.directive(
            "Description",
            format_args!("{} ({})", self.app, self.primary_region),
        );
        unit.directive("Wants", "network-online.target");
        unit.directive("After", "network-online.target");

        unit.section(CONTAINER_SECTION);
        unit.directive(keys::IMAGE, image);
        unit.directive("ContainerName", &self.app);
        for (name, value) in &self.env {
            unit.directive(keys::ENVIRONMENT, format_args!("{name}={value}"));
        }
        if let Some(http) = &self.http_service {
            unit.directive(
                keys::PUBLISH_PORT,
                format_args!("{0}:{0}", http.internal_port),
            );
        }
        for mount in &self.mounts {
            unit.directive(
                keys::VOLUME,
                format_args!("{}:{}", mount.source, mount.destination),
            );
        }

        if let Some(check) = &self.health_check {
            match &check.command {
                Some(command) => unit.directive("HealthCmd", command),
                None => {
                    let port = check
                        .port
                        .map(i64::from)
                        .or(self.http_service.as_ref().map(|h| h.internal_port))
                        .unwrap_or(80);
                    unit.directive(
                        "HealthCmd",
                        format_args!("curl -fsS http://localhost:{port}{}", check.path),
                    );
                }
            }
            unit.directive("HealthInterval", duration(check.interval));
            unit.directive("HealthTimeout", duration(check.timeout));
            unit.directive("HealthRetries", check.retries);
            unit.directive("HealthStartPeriod", duration(check.grace_period));
        }

        if let Some(security) = &self.security {
            if let Some(user) = &security.user {
                unit.directive("User", user);
            }
            if security.read_only {
                unit.directive("ReadOnly", "true");
            }
            if security.no_new_privileges {
                unit.directive("NoNewPrivileges", "true");
            }
            for cap in &security.drop_capabilities {
                unit.directive("DropCapability", cap);
            }
            for cap in &security.add_capabilities {
                unit.directive("AddCapability", cap);
            }
        }

        if let Some(network) = &self.network {
            unit.directive(keys::NETWORK, &network.name);
            for alias in &network.aliases {
                unit.directive("NetworkAlias", alias);
            }
        }

        if let Some(logging) = &self.logging {
            unit.directive("LogDriver", &logging.driver);
            for (key, value) in &logging.options {
                unit.directive("LogOpt", format_args!("{key}={value}"));
            }
        }

        if let Some(resources) = &self.resources {
            if let Some(memory) = &resources.memory {
                unit.directive("PodmanArgs", format_args!("--memory={memory}"));
            }
            if let Some(cpus) = &resources.cpus {
                unit.directive("PodmanArgs", format_args!("--cpus={cpus}"));
            }
        }

        unit.directive("PodmanArgs", "--restart=always");
        if self.kill_signal != DEFAULT_KILL_SIGNAL {
            unit.directive("StopSignal", &self.kill_signal);
        }

        unit.section(INSTALL_SECTION);
        unit.directive("WantedBy", "default.target");

        Ok(unit.finish())
    }
}

/// Accumulates unit text, separating sections with a blank line.
#[derive(Default)]
struct UnitWriter {
    out: String,
}

impl UnitWriter {
    fn section(&mut self, name: &str) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        let _ = writeln!(self.out, "[{name}]");
    }

    fn directive(&mut self, key: &str, value: impl std::fmt::Display) {
        let _ = writeln!(self.out, "{key}={value}");
    }

    fn finish(self) -> String {
        self.out
    }
}

fn duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Environment-file text: one `KEY=VALUE` per line, quoting values that need it.
pub(super) fn env_file<'a>(vars: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (key, value) in vars {
        let needs_quotes = value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '#' | '$'));
        if needs_quotes {
            let escaped = value
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            let _ = writeln!(out, "{key}=\"{escaped}\"");
        } else {
            let _ = writeln!(out, "{key}={value}");
        }
    }
    out
}
