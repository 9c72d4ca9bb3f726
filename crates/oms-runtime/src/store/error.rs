//! Object store errors.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`StoreError::NotFound`] | `STORE_NOT_FOUND` | No |
//! | [`StoreError::Transient`] | `STORE_TRANSIENT` | No |
//! | [`StoreError::Snapshot`] | `STORE_SNAPSHOT` | No |
//! | [`StoreError::Serialize`] | `STORE_SERIALIZE` | No |

use oms_model::ModelError;
use oms_types::{ErrorCode, NodeId};
use thiserror::Error;

/// Object store error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No stored state for the node.
    #[error("node not stored: {0}")]
    NotFound(NodeId),

    /// Transient nodes are never persisted.
    #[error("transient node cannot be stored: {0}")]
    Transient(NodeId),

    /// Capturing the node's state failed.
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] ModelError),

    /// Encoding or decoding a snapshot failed.
    #[error("snapshot encoding failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "STORE_NOT_FOUND",
            Self::Transient(_) => "STORE_TRANSIENT",
            Self::Snapshot(_) => "STORE_SNAPSHOT",
            Self::Serialize(_) => "STORE_SERIALIZE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_types::assert_error_codes;

    #[test]
    fn codes_follow_convention() {
        let json_err = match serde_json::from_str::<u32>("nope") {
            Err(e) => e,
            Ok(_) => panic!("expected a parse failure"),
        };
        assert_error_codes(
            &[
                StoreError::NotFound(NodeId::new()),
                StoreError::Transient(NodeId::new()),
                StoreError::Snapshot(ModelError::NoRuntime),
                StoreError::Serialize(json_err),
            ],
            "STORE_",
        );
    }
}
