//! Errors surfaced through secure proxies.
//!
//! A proxied operation fails either at the access check or in the model
//! operation it guards. [`SecurityError`] keeps both, delegating codes.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`SecurityError::Access`] | `ACCESS_*` | No |
//! | [`SecurityError::Model`] | `MODEL_*` | No |

use oms_auth::AccessError;
use oms_model::ModelError;
use oms_types::ErrorCode;
use thiserror::Error;

/// Failure of a proxied operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecurityError {
    /// Denied by the access checker.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The guarded model operation failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl SecurityError {
    /// The access error, if this is a denial.
    #[must_use]
    pub fn as_access(&self) -> Option<&AccessError> {
        match self {
            Self::Access(e) => Some(e),
            Self::Model(_) => None,
        }
    }

    /// Returns `true` if the checker denied the operation.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.as_access().is_some_and(AccessError::is_unauthorized)
    }

    /// Returns `true` if the attribute is not declared for the type.
    #[must_use]
    pub fn is_undeclared(&self) -> bool {
        self.as_access().is_some_and(AccessError::is_undeclared)
    }
}

impl ErrorCode for SecurityError {
    fn code(&self) -> &'static str {
        match self {
            Self::Access(e) => e.code(),
            Self::Model(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Access(e) => e.is_recoverable(),
            Self::Model(e) => e.is_recoverable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_delegate() {
        let access: SecurityError = AccessError::UndeclaredAttribute {
            type_name: "Compute".into(),
            attribute: "state".into(),
        }
        .into();
        assert_eq!(access.code(), "ACCESS_UNDECLARED_ATTRIBUTE");
        assert!(access.is_undeclared());
        assert!(!access.is_unauthorized());

        let model: SecurityError = ModelError::NoRuntime.into();
        assert!(model.code().starts_with("MODEL_"));
        assert!(model.as_access().is_none());
        assert!(!model.is_recoverable());
    }
}
