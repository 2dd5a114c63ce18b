// ABOUTME: Rollout target hosts as listed in shipyard.yml.
// ABOUTME: Parses "address", "user@address", "address:port", and "user@address:port".

use serde::Deserialize;

use crate::types::HostId;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Stable id used in rollout records. Defaults to the address.
    #[serde(default)]
    pub id: Option<String>,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl HostConfig {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("host address cannot be empty".to_string());
        }

        let (user, rest) = match s.split_once('@') {
            Some((user, rest)) => (Some(user), rest),
            None => (None, s),
        };

        let (address, port) = match rest.rsplit_once(':') {
            Some((address, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {port}"))?;
                (address, port)
            }
            None => (rest, default_port()),
        };

        if address.is_empty() {
            return Err("host address cannot be empty".to_string());
        }

        Ok(HostConfig {
            id: None,
            address: address.to_string(),
            port,
            user: user.map(str::to_string),
        })
    }

    pub fn host_id(&self) -> HostId {
        HostId::new(self.id.as_deref().unwrap_or(&self.address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_forms() {
        let host = HostConfig::parse("deploy@web1.internal:2222").unwrap();
        assert_eq!(host.user.as_deref(), Some("deploy"));
        assert_eq!(host.address, "web1.internal");
        assert_eq!(host.port, 2222);
        assert_eq!(host.host_id().as_str(), "web1.internal");

        let host = HostConfig::parse("web2.internal").unwrap();
        assert_eq!(host.port, 22);
        assert_eq!(host.user, None);
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(HostConfig::parse("  ").is_err());
        assert!(HostConfig::parse("web:ssh").is_err());
        assert!(HostConfig::parse("deploy@:22").is_err());
    }
}
