//! Configuration of the bridge and of read callbacks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Group used by [`register_read`](crate::register_read) and by a [`ComplexReadConfig`]
/// without a group.
pub const DEFAULT_READ_GROUP: &str = "rust";

/// Settings of a [`Bridge`](crate::Bridge).
///
/// Deserializable from TOML, every field is optional:
/// ```
/// use collectd_bridge::config::{BridgeConfig, FieldOverflow};
///
/// let config = BridgeConfig::from_toml(r#"field_overflow = "truncate""#).unwrap();
/// assert_eq!(config.field_overflow, FieldOverflow::Truncate);
/// assert_eq!(config.default_read_group, "rust");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Group of the read callbacks registered without an explicit group.
    pub default_read_group: String,
    /// What to do with identifier fields that do not fit in the daemon's fixed-size buffers.
    pub field_overflow: FieldOverflow,
}

/// Policy for identifier fields (host, plugin, ...) longer than the native buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOverflow {
    /// Fail with [`CodecError::FieldTooLong`](crate::CodecError::FieldTooLong).
    #[default]
    Reject,
    /// Keep the longest prefix that fits, cut on a character boundary.
    Truncate,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_read_group: String::from(DEFAULT_READ_GROUP),
            field_overflow: FieldOverflow::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

/// Extra settings of [`register_complex_read`](crate::register_complex_read),
/// see `plugin_register_complex_read` in the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexReadConfig {
    /// Callback group, usable to unregister several read callbacks at once.
    /// Empty means [`BridgeConfig::default_read_group`].
    pub group: String,

    /// Interval between two reads. Zero lets the daemon use its global interval.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl ComplexReadConfig {
    pub fn new(group: impl Into<String>, interval: Duration) -> Self {
        Self {
            group: group.into(),
            interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{BridgeConfig, ComplexReadConfig, FieldOverflow};

    #[test]
    fn default_bridge_config() {
        let config = BridgeConfig::from_toml("").unwrap();
        assert_eq!(BridgeConfig::default(), config);
        assert_eq!(FieldOverflow::Reject, config.field_overflow);
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(BridgeConfig::from_toml("overflow = 'truncate'").is_err());
    }

    #[test]
    fn complex_read_config() {
        let config: ComplexReadConfig = toml::from_str(
            r#"
            group = "golang"
            interval = "10s"
            "#,
        )
        .unwrap();
        assert_eq!(ComplexReadConfig::new("golang", Duration::from_secs(10)), config);

        let config: ComplexReadConfig = toml::from_str("").unwrap();
        assert_eq!(ComplexReadConfig::default(), config);
        assert!(config.interval.is_zero());
    }
}
