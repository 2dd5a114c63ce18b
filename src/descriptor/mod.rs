// ABOUTME: Deploy descriptor types and parsing for TOML app manifests.
// ABOUTME: Applies defaults, validates, and renders descriptors into container unit text.

mod deserialize;
mod error;
mod render;
mod validate;

pub use error::DescriptorError;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::rollout::Strategy;
use crate::types::ReleaseId;

pub const DEFAULT_REGION: &str = "default";
pub const DEFAULT_KILL_SIGNAL: &str = "SIGTERM";

#[derive(Debug, Clone, Deserialize)]
pub struct DeployDescriptor {
    #[serde(default)]
    pub app: String,

    #[serde(default = "default_region")]
    pub primary_region: String,

    #[serde(default = "default_kill_signal")]
    pub kill_signal: String,

    #[serde(default)]
    pub build: BuildSpec,

    #[serde(default, deserialize_with = "deserialize::deserialize_env")]
    pub env: Vec<(String, String)>,

    #[serde(default)]
    pub mounts: Vec<MountSpec>,

    #[serde(default)]
    pub http_service: Option<HttpServiceSpec>,

    #[serde(default)]
    pub vm: Vec<VmSpec>,

    #[serde(default)]
    pub health_check: Option<HealthCheckSpec>,

    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default)]
    pub deploy: Option<DeploySpec>,

    #[serde(default)]
    pub logging: Option<LoggingSpec>,

    #[serde(default)]
    pub security: Option<SecuritySpec>,

    #[serde(default)]
    pub network: Option<NetworkSpec>,

    #[serde(default)]
    pub resources: Option<ResourcesSpec>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_kill_signal() -> String {
    DEFAULT_KILL_SIGNAL.to_string()
}

/// Where the image comes from. Exactly one of `image` / `local_image` is valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSpec {
    /// Remote registry image, e.g. `ghcr.io/org/web`.
    #[serde(default)]
    pub image: Option<String>,

    /// Image already present in the host's local store.
    #[serde(default)]
    pub local_image: Option<String>,

    #[serde(default)]
    pub tag_strategy: TagStrategy,
}

/// How an untagged remote image gets its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStrategy {
    #[default]
    Latest,
    /// Tag with the release id being deployed.
    Release,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MountSpec {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub auto_extend_size_threshold: Option<u8>,
    #[serde(default)]
    pub auto_extend_size_increment: Option<String>,
    #[serde(default)]
    pub auto_extend_size_limit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServiceSpec {
    pub internal_port: i64,
    #[serde(default)]
    pub force_https: bool,
    #[serde(default)]
    pub auto_stop_machines: bool,
    #[serde(default)]
    pub auto_start_machines: bool,
    #[serde(default)]
    pub min_machines_running: u32,
    #[serde(default)]
    pub concurrency: Option<ConcurrencySpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencySpec {
    #[serde(rename = "type", default = "default_concurrency_type")]
    pub kind: String,
    #[serde(default)]
    pub soft_limit: Option<u32>,
    #[serde(default)]
    pub hard_limit: Option<u32>,
}

fn default_concurrency_type() -> String {
    "connections".to_string()
}

/// Machine sizing hints. Carried for schedulers; the unit renderer ignores them.
#[derive(Debug, Clone, Deserialize)]
pub struct VmSpec {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub cpus: Option<u32>,
    #[serde(default)]
    pub cpu_kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckSpec {
    /// Explicit command; overrides the HTTP probe built from `path`/`port`.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default = "default_health_path")]
    pub path: String,

    /// Defaults to `http_service.internal_port`.
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_retries() -> u32 {
    3
}

fn default_grace_period() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploySpec {
    #[serde(default)]
    pub strategy: Strategy,
    /// Hosts in the first canary batch.
    #[serde(default)]
    pub canary_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSpec {
    #[serde(default = "default_log_driver")]
    pub driver: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_log_driver() -> String {
    "journald".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecuritySpec {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub no_new_privileges: bool,
    #[serde(default)]
    pub drop_capabilities: Vec<String>,
    #[serde(default)]
    pub add_capabilities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesSpec {
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub cpus: Option<String>,
}

impl DeployDescriptor {
    /// Parse a TOML descriptor, applying defaults. Fails only on syntax or a missing app name.
    pub fn parse(toml_text: &str) -> Result<Self, DescriptorError> {
        let descriptor: DeployDescriptor = toml::from_str(toml_text)?;
        if descriptor.app.trim().is_empty() {
            return Err(DescriptorError::MissingAppName);
        }
        Ok(descriptor)
    }

    /// The image source, whichever of remote or local is set (remote wins if both are).
    pub fn image(&self) -> Option<&str> {
        self.build
            .image
            .as_deref()
            .or(self.build.local_image.as_deref())
            .map(str::trim)
            .filter(|image| !image.is_empty())
    }

    /// Fully tagged image for `release`.
    ///
    /// Local images are used verbatim. Remote images without a tag or digest
    /// get one from the tag strategy.
    pub fn image_reference(&self, release: &ReleaseId) -> Option<String> {
        if let Some(local) = self.build.local_image.as_deref().map(str::trim) {
            if self.build.image.is_none() && !local.is_empty() {
                return Some(local.to_string());
            }
        }
        let image = self.image()?;
        if has_tag_or_digest(image) {
            return Some(image.to_string());
        }
        Some(match self.build.tag_strategy {
            TagStrategy::Latest => format!("{image}:latest"),
            TagStrategy::Release => format!("{image}:{release}"),
        })
    }

    /// `KEY=VALUE` lines for the environment file, in descriptor order.
    pub fn render_env_file(&self) -> String {
        render::env_file(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Rollout strategy requested by `[deploy]`, defaulting to parallel.
    pub fn strategy(&self) -> Strategy {
        self.deploy
            .as_ref()
            .map(|deploy| deploy.strategy)
            .unwrap_or_default()
    }

    /// Canary batch size requested by `[deploy]`, if any.
    pub fn canary_size(&self) -> Option<usize> {
        self.deploy.as_ref().and_then(|deploy| deploy.canary_size)
    }
}

fn has_tag_or_digest(image: &str) -> bool {
    if image.contains('@') {
        return true;
    }
    // A colon before the last slash is a registry port, not a tag.
    let last_component = image.rsplit('/').next().unwrap_or(image);
    last_component.contains(':')
}
