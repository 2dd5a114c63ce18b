// ABOUTME: Custom serde deserializers for deploy descriptor fields.
// ABOUTME: Keeps [env] in file order and flattens scalar values to strings.

use serde::Deserialize;

/// Deserialize a TOML table into ordered `(key, value)` pairs.
///
/// Non-string scalars (`PORT = 8080`) are stringified the way they are written.
pub fn deserialize_env<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let table = toml::Table::deserialize(deserializer)?;
    table
        .into_iter()
        .map(|(key, value)| match value {
            toml::Value::String(s) => Ok((key, s)),
            toml::Value::Integer(_) | toml::Value::Float(_) | toml::Value::Boolean(_) => {
                Ok((key, value.to_string()))
            }
            other => Err(serde::de::Error::custom(format!(
                "env.{key} must be a string, number, or boolean, got {}",
                other.type_str()
            ))),
        })
        .collect()
}
