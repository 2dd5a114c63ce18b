// ABOUTME: Codec for Podman Quadlet container unit text.
// ABOUTME: Parses directives, derives host requirements, and patches text without reformatting it.

mod descriptor;
mod error;
mod patch;
mod tokenizer;

pub use descriptor::UnitDescriptor;
pub use error::UnitError;
pub use patch::{UserInfo, inject_permission_bootstrap, replace_or_insert_image, validate};

pub const UNIT_SECTION: &str = "Unit";
pub const CONTAINER_SECTION: &str = "Container";
pub const SERVICE_SECTION: &str = "Service";
pub const INSTALL_SECTION: &str = "Install";

/// Directive keys recognized inside `[Container]`.
pub mod keys {
    pub const IMAGE: &str = "Image";
    pub const ENVIRONMENT_FILE: &str = "EnvironmentFile";
    pub const PUBLISH_PORT: &str = "PublishPort";
    pub const EXIT_POLICY: &str = "ExitPolicy";
    pub const PULL: &str = "Pull";
    pub const NETWORK: &str = "Network";
    pub const VOLUME: &str = "Volume";
    pub const ENVIRONMENT: &str = "Environment";
    pub const LABEL: &str = "Label";
}
