// ABOUTME: Per-host unit and environment-file text for a rollout.
// ABOUTME: DescriptorArtifacts renders a deploy descriptor, pins the release image, and adds the bootstrap.

use crate::descriptor::{DeployDescriptor, DescriptorError};
use crate::error::ErrorKind;
use crate::types::{HostId, ReleaseId};
use crate::unit::{self, UnitDescriptor, UnitError, UserInfo};

/// Generated files for one host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeArtifacts {
    pub unit_text: String,
    pub env_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl ArtifactError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArtifactError::Descriptor(e) => e.kind(),
            ArtifactError::Unit(e) => e.kind(),
        }
    }
}

/// Produces the files a host needs for a release.
pub trait ArtifactSource: Send + Sync {
    fn render(&self, host: &HostId) -> Result<NodeArtifacts, ArtifactError>;
}

/// Artifacts rendered from a deploy descriptor for one release.
///
/// Every host receives the same text; the host id is only used for logging.
#[derive(Debug, Clone)]
pub struct DescriptorArtifacts {
    descriptor: DeployDescriptor,
    image: String,
    owner: Option<UserInfo>,
}

impl DescriptorArtifacts {
    /// Fails with [`DescriptorError::NoImage`] when the descriptor names no image.
    pub fn new(descriptor: DeployDescriptor, release: &ReleaseId) -> Result<Self, DescriptorError> {
        let image = descriptor
            .image_reference(release)
            .ok_or(DescriptorError::NoImage)?;
        Ok(Self {
            descriptor,
            image,
            owner: None,
        })
    }

    /// Create and chown the unit's host directories before the container starts.
    pub fn with_owner(mut self, owner: UserInfo) -> Self {
        self.owner = Some(owner);
        self
    }

    /// The fully tagged image the unit will run.
    pub fn image(&self) -> &str {
        &self.image
    }
}

impl ArtifactSource for DescriptorArtifacts {
    fn render(&self, host: &HostId) -> Result<NodeArtifacts, ArtifactError> {
        let rendered = self.descriptor.render()?;
        let mut unit_text = unit::replace_or_insert_image(&rendered, &self.image)?;

        if let Some(owner) = self.owner {
            let directories = UnitDescriptor::parse(&unit_text).required_host_directories();
            unit_text = unit::inject_permission_bootstrap(&unit_text, owner, &directories);
        }

        tracing::debug!(host = %host, image = %self.image, "rendered node artifacts");
        Ok(NodeArtifacts {
            unit_text,
            env_text: self.descriptor.render_env_file(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"
app = "web"

[build]
image = "ghcr.io/acme/web"
tag_strategy = "release"

[env]
PORT = "8080"

[http_service]
internal_port = 8080

[[mounts]]
source = "/srv/web/data"
destination = "/data"
"#;

    fn artifacts() -> DescriptorArtifacts {
        let descriptor = DeployDescriptor::parse(DESCRIPTOR).unwrap();
        DescriptorArtifacts::new(descriptor, &ReleaseId::new("r42")).unwrap()
    }

    #[test]
    fn pins_release_image() {
        let artifacts = artifacts();
        assert_eq!(artifacts.image(), "ghcr.io/acme/web:r42");

        let rendered = artifacts.render(&HostId::new("h1")).unwrap();
        let unit = UnitDescriptor::parse(&rendered.unit_text);
        assert_eq!(unit.image.as_deref(), Some("ghcr.io/acme/web:r42"));
        assert_eq!(rendered.env_text, "PORT=8080\n");
        assert!(!rendered.unit_text.contains("[Service]"));
    }

    #[test]
    fn owner_adds_bootstrap_for_host_volumes() {
        let rendered = artifacts()
            .with_owner(UserInfo {
                uid: 1000,
                gid: 1000,
            })
            .render(&HostId::new("h1"))
            .unwrap();

        assert!(rendered.unit_text.contains("[Service]\n"));
        assert!(
            rendered
                .unit_text
                .contains("ExecStartPre=/usr/bin/chown 1000:1000 /srv/web/data\n")
        );
        unit::validate(&rendered.unit_text).unwrap();
    }

    #[test]
    fn descriptor_without_image_is_rejected() {
        let descriptor = DeployDescriptor::parse("app = \"web\"\n").unwrap();
        assert!(matches!(
            DescriptorArtifacts::new(descriptor, &ReleaseId::new("r1")),
            Err(DescriptorError::NoImage)
        ));
    }
}
