// ABOUTME: Config scaffolding for new control planes.
// ABOUTME: Creates shipyard.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, DEFAULT_DATABASE_URL, HostConfig};

pub fn init_config(dir: &Path, hosts: &[String], force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    for host in hosts {
        HostConfig::parse(host).map_err(Error::InvalidConfig)?;
    }

    std::fs::write(&config_path, generate_template_yaml(hosts))?;
    tracing::info!(path = %config_path.display(), "wrote config template");
    Ok(())
}

fn generate_template_yaml(hosts: &[String]) -> String {
    let hosts = if hosts.is_empty() {
        "  - deploy@server.example.com\n".to_string()
    } else {
        hosts.iter().map(|h| format!("  - {h}\n")).collect()
    };

    format!(
        r#"database:
  url:
    env: SHIPYARD_DATABASE_URL
    default: {DEFAULT_DATABASE_URL}
  max_connections: 5

worker:
  poll_interval: 2s

rollout:
  canary_size: 1

# Create and chown bind-mount directories before containers start.
# bootstrap:
#   uid: 1000
#   gid: 1000

hosts:
{hosts}"#
    )
}
