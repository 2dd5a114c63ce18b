// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Accepts host entries either as address strings or as detailed maps.

use serde::Deserialize;

use super::HostConfig;

pub fn deserialize_hosts<'de, D>(deserializer: D) -> Result<Vec<HostConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<HostEntry> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .map(HostEntry::into_host_config)
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostEntry {
    Simple(String),
    Detailed(HostConfig),
}

impl HostEntry {
    fn into_host_config(self) -> Result<HostConfig, String> {
        match self {
            HostEntry::Simple(s) => HostConfig::parse(&s),
            HostEntry::Detailed(c) => Ok(c),
        }
    }
}
