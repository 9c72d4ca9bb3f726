//! Model layer errors.
//!
//! All errors implement [`ErrorCode`] for standardized handling.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`ModelError::NotFound`] | `MODEL_NOT_FOUND` | No |
//! | [`ModelError::ContainmentRejected`] | `MODEL_CONTAINMENT_REJECTED` | No |
//! | [`ModelError::NameConflict`] | `MODEL_NAME_CONFLICT` | No |
//! | [`ModelError::WouldCycle`] | `MODEL_WOULD_CYCLE` | No |
//! | [`ModelError::NotAContainer`] | `MODEL_NOT_A_CONTAINER` | No |
//! | [`ModelError::UnknownFeature`] | `MODEL_UNKNOWN_FEATURE` | No |
//! | [`ModelError::MixedFeatureUpdate`] | `MODEL_MIXED_FEATURE_UPDATE` | No |
//! | [`ModelError::UnknownAttribute`] | `MODEL_UNKNOWN_ATTRIBUTE` | No |
//! | [`ModelError::ReadOnlyAttribute`] | `MODEL_READ_ONLY_ATTRIBUTE` | No |
//! | [`ModelError::InvalidValue`] | `MODEL_INVALID_VALUE` | No |
//! | [`ModelError::UnknownType`] | `MODEL_UNKNOWN_TYPE` | No |
//! | [`ModelError::DuplicateType`] | `MODEL_DUPLICATE_TYPE` | No |
//! | [`ModelError::OwnerInvariant`] | `MODEL_OWNER_INVARIANT` | No |
//! | [`ModelError::NoRuntime`] | `MODEL_NO_RUNTIME` | No |
//! | [`ProviderError::Failed`] | `PROVIDER_FAILED` | No |
//! | [`ProviderError::Unavailable`] | `PROVIDER_UNAVAILABLE` | Yes |
//!
//! # Example
//!
//! ```
//! use oms_model::ModelError;
//! use oms_types::ErrorCode;
//!
//! let err = ModelError::NotFound {
//!     container: "proc".into(),
//!     name: "42".into(),
//! };
//! assert_eq!(err.code(), "MODEL_NOT_FOUND");
//! assert!(!err.is_recoverable());
//! ```

use oms_types::{ErrorCode, NodeId, PrincipalId};
use thiserror::Error;

/// Model layer error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// No child (or task, or action) of that name.
    #[error("'{name}' not found in '{container}'")]
    NotFound {
        /// Container that was searched.
        container: String,
        /// Missing name.
        name: String,
    },

    /// The container's containment rule refused the candidate.
    #[error("'{container}' cannot contain a '{candidate}' (expects {expected})")]
    ContainmentRejected {
        /// Container type.
        container: String,
        /// Candidate type.
        candidate: String,
        /// Human-readable description of what the container accepts.
        expected: String,
    },

    /// A sibling with that name already exists.
    #[error("name '{name}' already used in '{container}'")]
    NameConflict {
        /// Container that holds the existing sibling.
        container: String,
        /// Conflicting name.
        name: String,
    },

    /// Adding the node would make it its own ancestor.
    #[error("adding '{name}' would create a containment cycle")]
    WouldCycle {
        /// Name of the node being added.
        name: String,
    },

    /// A container operation was attempted on a leaf node.
    #[error("node of type '{0}' is not a container")]
    NotAContainer(String),

    /// A feature tag outside the type's marker vocabulary.
    #[error("unknown feature '{feature}' for type '{type_name}'")]
    UnknownFeature {
        /// Node type.
        type_name: String,
        /// Rejected tag.
        feature: String,
    },

    /// One feature update mixed plain names with `+`/`-` prefixed ones.
    #[error("feature update mixes replace-all and +/- forms")]
    MixedFeatureUpdate,

    /// The attribute exists neither as built-in, computed nor stored value.
    #[error("type '{type_name}' has no attribute '{attribute}'")]
    UnknownAttribute {
        /// Node type.
        type_name: String,
        /// Requested attribute.
        attribute: String,
    },

    /// Write to a computed or otherwise read-only attribute.
    #[error("attribute '{attribute}' of '{type_name}' is read-only")]
    ReadOnlyAttribute {
        /// Node type.
        type_name: String,
        /// Attribute that was written.
        attribute: String,
    },

    /// A built-in attribute received a value of the wrong shape.
    #[error("attribute '{attribute}' expects {expected}")]
    InvalidValue {
        /// Attribute that was written.
        attribute: String,
        /// Expected JSON shape.
        expected: &'static str,
    },

    /// No node type registered under that name.
    #[error("unknown node type '{0}'")]
    UnknownType(String),

    /// A node type was registered twice.
    #[error("node type '{0}' registered twice")]
    DuplicateType(String),

    /// The role store reports more than one owner for a node.
    #[error("{node} has {} owners: {owners:?}", owners.len())]
    OwnerInvariant {
        /// Node with conflicting owner bindings.
        node: NodeId,
        /// All principals holding the owner role.
        owners: Vec<PrincipalId>,
    },

    /// A pending task result was supplied outside a tokio runtime.
    #[error("task completion requires a running tokio runtime")]
    NoRuntime,
}

impl ErrorCode for ModelError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "MODEL_NOT_FOUND",
            Self::ContainmentRejected { .. } => "MODEL_CONTAINMENT_REJECTED",
            Self::NameConflict { .. } => "MODEL_NAME_CONFLICT",
            Self::WouldCycle { .. } => "MODEL_WOULD_CYCLE",
            Self::NotAContainer(_) => "MODEL_NOT_A_CONTAINER",
            Self::UnknownFeature { .. } => "MODEL_UNKNOWN_FEATURE",
            Self::MixedFeatureUpdate => "MODEL_MIXED_FEATURE_UPDATE",
            Self::UnknownAttribute { .. } => "MODEL_UNKNOWN_ATTRIBUTE",
            Self::ReadOnlyAttribute { .. } => "MODEL_READ_ONLY_ATTRIBUTE",
            Self::InvalidValue { .. } => "MODEL_INVALID_VALUE",
            Self::UnknownType(_) => "MODEL_UNKNOWN_TYPE",
            Self::DuplicateType(_) => "MODEL_DUPLICATE_TYPE",
            Self::OwnerInvariant { .. } => "MODEL_OWNER_INVARIANT",
            Self::NoRuntime => "MODEL_NO_RUNTIME",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Failure reported by an injector or extender.
///
/// Provider failures never abort composition: the engine logs them and
/// records them in [`Composition::failures`](crate::Composition).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not produce its children.
    #[error("provider failed: {0}")]
    Failed(String),

    /// A backend the provider depends on is temporarily unreachable.
    #[error("provider backend unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for ProviderError {
    fn code(&self) -> &'static str {
        match self {
            Self::Failed(_) => "PROVIDER_FAILED",
            Self::Unavailable(_) => "PROVIDER_UNAVAILABLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
