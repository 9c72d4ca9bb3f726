//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use oms_auth::CheckMode;
use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// This is the unified configuration after merging all layers.
///
/// # Example
///
/// ```
/// use oms_runtime::config::OmsConfig;
///
/// let config = OmsConfig::default();
/// assert!(config.auth.enforce_attribute_rights_definition);
/// assert_eq!(config.proc.init_cmdline, "/bin/init");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OmsConfig {
    /// Access-control settings.
    pub auth: AuthConfig,

    /// Logging settings.
    pub log: LogConfig,

    /// Process registry settings.
    pub proc: ProcConfig,
}

impl OmsConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Check mode selected by `auth.enforce_attribute_rights_definition`.
    #[must_use]
    pub fn check_mode(&self) -> CheckMode {
        CheckMode::from_enforce_flag(self.auth.enforce_attribute_rights_definition)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default. This enables layered configuration.
    pub fn merge(&mut self, other: &Self) {
        self.auth.merge(&other.auth);
        self.log.merge(&other.log);
        self.proc.merge(&other.proc);
    }
}

/// Access-control configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Reject undeclared and unauthorized accesses (`true`), or only log
    /// them (`false`).
    pub enforce_attribute_rights_definition: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enforce_attribute_rights_definition: true,
        }
    }
}

impl AuthConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.enforce_attribute_rights_definition != default.enforce_attribute_rights_definition {
            self.enforce_attribute_rights_definition = other.enforce_attribute_rights_definition;
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl LogConfig {
    fn merge(&mut self, other: &Self) {
        if other.level != Self::default().level {
            self.level.clone_from(&other.level);
        }
    }
}

/// Process registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcConfig {
    /// Command line recorded for task `1`.
    pub init_cmdline: String,
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            init_cmdline: "/bin/init".into(),
        }
    }
}

impl ProcConfig {
    fn merge(&mut self, other: &Self) {
        if other.init_cmdline != Self::default().init_cmdline {
            self.init_cmdline.clone_from(&other.init_cmdline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_roundtrip_keeps_values() {
        let mut config = OmsConfig::default();
        config.auth.enforce_attribute_rights_definition = false;
        config.log.level = "debug".into();

        let parsed = OmsConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config = OmsConfig::from_toml("[log]\nlevel = \"info\"\n").unwrap();
        assert_eq!(config.log.level, "info");
        assert!(config.auth.enforce_attribute_rights_definition);
        assert_eq!(config.check_mode(), CheckMode::Enforcing);
    }

    #[test]
    fn merge_only_overrides_non_defaults() {
        let mut base = OmsConfig::default();
        base.log.level = "debug".into();
        base.auth.enforce_attribute_rights_definition = false;

        let mut other = OmsConfig::default();
        other.proc.init_cmdline = "/sbin/init".into();
        base.merge(&other);

        assert_eq!(base.log.level, "debug");
        assert!(!base.auth.enforce_attribute_rights_definition);
        assert_eq!(base.proc.init_cmdline, "/sbin/init");
        assert_eq!(base.check_mode(), CheckMode::Auditing);
    }
}
