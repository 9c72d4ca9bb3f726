//! Runtime-level error type.
//!
//! [`OmsError`] collects what can go wrong while assembling the runtime.

use crate::config::ConfigError;
use crate::store::StoreError;
use oms_auth::RegistryError;
use oms_model::ModelError;
use oms_types::ErrorCode;
use thiserror::Error;

/// Unified runtime error.
///
/// # Example
///
/// ```
/// use oms_model::ModelError;
/// use oms_runtime::OmsError;
/// use oms_types::ErrorCode;
///
/// let err: OmsError = ModelError::UnknownType("Vm".into()).into();
/// assert_eq!(err.code(), "MODEL_UNKNOWN_TYPE");
/// ```
#[derive(Debug, Error)]
pub enum OmsError {
    /// Type registration or tree assembly failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Permission declarations are inconsistent.
    #[error("permission registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Persisting the tree failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ErrorCode for OmsError {
    fn code(&self) -> &'static str {
        match self {
            Self::Model(e) => e.code(),
            Self::Registry(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::Store(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Model(e) => e.is_recoverable(),
            Self::Registry(e) => e.is_recoverable(),
            Self::Config(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
        }
    }
}
