// ABOUTME: Structural validation of deploy descriptors.
// ABOUTME: Checks unit-safe app names, a single image source, port range, mounts, and domains.

use std::path::Path;

use super::{DeployDescriptor, DescriptorError};
use crate::types::{AppName, AppNameError};

impl DeployDescriptor {
    /// The app name as a unit file stem.
    pub fn app_name(&self) -> Result<AppName, DescriptorError> {
        AppName::new(&self.app).map_err(|source| match source {
            AppNameError::Empty => DescriptorError::MissingAppName,
            source => DescriptorError::InvalidAppName {
                name: self.app.clone(),
                source,
            },
        })
    }

    /// Validate everything a renderer and the hosts rely on.
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        self.app_name()?;

        let has_remote = present(self.build.image.as_deref());
        let has_local = present(self.build.local_image.as_deref());
        match (has_remote, has_local) {
            (true, true) => return Err(DescriptorError::ConflictingImages),
            (false, false) => return Err(DescriptorError::NoImage),
            _ => {}
        }

        if let Some(http) = &self.http_service {
            if !(1..=65535).contains(&http.internal_port) {
                return Err(DescriptorError::InvalidInternalPort(http.internal_port));
            }
        }

        for (index, mount) in self.mounts.iter().enumerate() {
            if mount.source.trim().is_empty() {
                return Err(DescriptorError::InvalidMount {
                    index,
                    reason: "source cannot be empty",
                });
            }
            if !Path::new(&mount.destination).is_absolute() {
                return Err(DescriptorError::InvalidMount {
                    index,
                    reason: "destination must be an absolute path",
                });
            }
        }

        if let Some(index) = self.domains.iter().position(|d| d.trim().is_empty()) {
            return Err(DescriptorError::EmptyDomain(index));
        }

        self.check_single_line()
    }

    /// Every string that ends up in a unit directive must stay on one line.
    pub(super) fn check_single_line(&self) -> Result<(), DescriptorError> {
        single_line("app", &self.app)?;
        single_line("primary_region", &self.primary_region)?;
        single_line("kill_signal", &self.kill_signal)?;
        if let Some(image) = &self.build.image {
            single_line("build.image", image)?;
        }
        if let Some(image) = &self.build.local_image {
            single_line("build.local_image", image)?;
        }
        for (name, value) in &self.env {
            single_line("env", name)?;
            single_line(&format!("env.{name}"), value)?;
        }
        for (index, mount) in self.mounts.iter().enumerate() {
            single_line(&format!("mounts[{index}].source"), &mount.source)?;
            single_line(&format!("mounts[{index}].destination"), &mount.destination)?;
        }
        if let Some(check) = &self.health_check {
            if let Some(command) = &check.command {
                single_line("health_check.command", command)?;
            }
            single_line("health_check.path", &check.path)?;
        }
        if let Some(security) = &self.security {
            if let Some(user) = &security.user {
                single_line("security.user", user)?;
            }
            for cap in security.drop_capabilities.iter().chain(&security.add_capabilities) {
                single_line("security capabilities", cap)?;
            }
        }
        if let Some(network) = &self.network {
            single_line("network.name", &network.name)?;
            for alias in &network.aliases {
                single_line("network.aliases", alias)?;
            }
        }
        if let Some(logging) = &self.logging {
            single_line("logging.driver", &logging.driver)?;
            for (key, value) in &logging.options {
                single_line("logging.options", key)?;
                single_line(&format!("logging.options.{key}"), value)?;
            }
        }
        if let Some(resources) = &self.resources {
            for value in resources.memory.iter().chain(&resources.cpus) {
                single_line("resources", value)?;
            }
        }
        Ok(())
    }
}

fn single_line(field: &str, value: &str) -> Result<(), DescriptorError> {
    if value.contains(['\r', '\n']) {
        return Err(DescriptorError::LineBreak {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DeployDescriptor {
        DeployDescriptor::parse(
            r#"
app = "web"

[build]
image = "ghcr.io/org/web"

[http_service]
internal_port = 8080

[[mounts]]
source = "/srv/web/data"
destination = "/data"
"#,
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_descriptor_with_one_mount() {
        let desc = base();
        assert_eq!(desc.mounts.len(), 1);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn rejects_app_name_with_space() {
        let mut desc = base();
        desc.app = "my app".to_string();
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::InvalidAppName {
                source: AppNameError::ContainsWhitespace,
                ..
            })
        ));
    }

    #[test]
    fn rejects_app_name_with_slash() {
        let mut desc = base();
        desc.app = "team/web".to_string();
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::InvalidAppName { .. })
        ));
    }

    #[test]
    fn rejects_missing_image() {
        let mut desc = base();
        desc.build.image = None;
        assert!(matches!(desc.validate(), Err(DescriptorError::NoImage)));
    }

    #[test]
    fn rejects_both_images() {
        let mut desc = base();
        desc.build.local_image = Some("web-local".to_string());
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::ConflictingImages)
        ));
    }

    #[test]
    fn rejects_out_of_range_ports() {
        for port in [0, 70000, -1] {
            let mut desc = base();
            desc.http_service.as_mut().unwrap().internal_port = port;
            assert!(
                matches!(desc.validate(), Err(DescriptorError::InvalidInternalPort(p)) if p == port),
                "port {port} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_relative_mount_destination() {
        let mut desc = base();
        desc.mounts[0].destination = "data".to_string();
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::InvalidMount { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_empty_mount_source() {
        let mut desc = base();
        desc.mounts[0].source = " ".to_string();
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::InvalidMount { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_line_breaks_in_rendered_strings() {
        let mut desc = base();
        desc.env
            .push(("A".to_string(), "ok\nPublishPort=1:1".to_string()));
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::LineBreak { field }) if field == "env.A"
        ));

        let mut desc = base();
        desc.network = Some(crate::descriptor::NetworkSpec {
            name: "edge\r".to_string(),
            aliases: Vec::new(),
        });
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::LineBreak { field }) if field == "network.name"
        ));

        let mut desc = base();
        desc.mounts[0].source = "/srv/a\nVolume=/:/host".to_string();
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::LineBreak { .. })
        ));
    }

    #[test]
    fn rejects_empty_domain() {
        let mut desc = base();
        desc.domains = vec!["example.com".to_string(), "".to_string()];
        assert!(matches!(desc.validate(), Err(DescriptorError::EmptyDomain(1))));
    }
}
