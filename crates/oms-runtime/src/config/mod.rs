//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────┐
//! │  1. Environment Variables (OMS_*)       │  Runtime override
//! ├─────────────────────────────────────────┤
//! │  2. Explicit file (--config)            │  Per invocation
//! ├─────────────────────────────────────────┤
//! │  3. Project Config (.oms/config.toml)   │  Deployment-specific
//! ├─────────────────────────────────────────┤
//! │  4. Global Config (~/.oms/config.toml)  │  User defaults
//! ├─────────────────────────────────────────┤
//! │  5. Default Values (compile-time)       │  Fallback
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `OMS_ENFORCE_ATTRIBUTE_RIGHTS` | `auth.enforce_attribute_rights_definition` | bool |
//! | `OMS_LOG_LEVEL` | `log.level` | String |
//! | `OMS_INIT_CMDLINE` | `proc.init_cmdline` | String |
//!
//! # Example Configuration
//!
//! ```toml
//! # ~/.oms/config.toml
//!
//! [auth]
//! # false: log would-be denials instead of rejecting them
//! enforce_attribute_rights_definition = true
//!
//! [log]
//! level = "warn"
//!
//! [proc]
//! init_cmdline = "/bin/init"
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::{save_config, ConfigLoader};
pub use types::{AuthConfig, LogConfig, OmsConfig, ProcConfig};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".oms")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".oms";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
