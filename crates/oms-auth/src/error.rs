//! Access, registry and interaction errors.
//!
//! [`AccessError`] separates the two reasons an attribute access can fail:
//!
//! ```text
//! attribute access ──► declared in resolved table? ──no──► UndeclaredAttribute
//!                               │ yes
//!                               ▼
//!                      principal holds permission? ──no──► Unauthorized
//!                               │ yes
//!                               ▼
//!                             allowed
//! ```
//!
//! `UndeclaredAttribute` signals an API-shape mismatch (the caller asked
//! for something outside the type's public contract), `Unauthorized` a
//! rights mismatch.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`AccessError::Unauthorized`] | `ACCESS_UNAUTHORIZED` | No |
//! | [`AccessError::UndeclaredAttribute`] | `ACCESS_UNDECLARED_ATTRIBUTE` | No |
//! | [`InteractionError::OutOfOrder`] | `INTERACTION_OUT_OF_ORDER` | No |
//! | [`InteractionError::NotActive`] | `INTERACTION_NOT_ACTIVE` | No |
//! | [`RegistryError::UnknownParent`] | `REGISTRY_UNKNOWN_PARENT` | No |
//! | [`RegistryError::Cycle`] | `REGISTRY_CYCLE` | No |
//! | [`RegistryError::DuplicateType`] | `REGISTRY_DUPLICATE_TYPE` | No |

use crate::Permission;
use oms_types::ErrorCode;
use thiserror::Error;

/// An attribute access denied by the access checker.
///
/// # Example
///
/// ```
/// use oms_auth::{AccessError, Permission};
/// use oms_types::ErrorCode;
///
/// let err = AccessError::Unauthorized {
///     type_name: "Compute".into(),
///     attribute: "architecture".into(),
///     permission: Permission::READ,
///     principals: vec!["user2".into()],
/// };
/// assert_eq!(err.code(), "ACCESS_UNAUTHORIZED");
/// assert!(err.to_string().contains("architecture"));
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The attribute is declared but no active principal holds the
    /// required permission.
    #[error(
        "unauthorized: '{type_name}.{attribute}' requires '{permission}' (principals: {principals:?})"
    )]
    Unauthorized {
        /// Type whose table declared the attribute.
        type_name: String,
        /// Attribute being accessed.
        attribute: String,
        /// Permission that was required.
        permission: Permission,
        /// Principals bound to the interaction at check time.
        principals: Vec<String>,
    },

    /// The attribute is not part of the type's resolved permission table.
    #[error("attribute '{attribute}' is not declared for type '{type_name}'")]
    UndeclaredAttribute {
        /// Type that was checked.
        type_name: String,
        /// Attribute being accessed.
        attribute: String,
    },
}

impl AccessError {
    /// Returns `true` for [`AccessError::Unauthorized`].
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns `true` for [`AccessError::UndeclaredAttribute`].
    #[must_use]
    pub fn is_undeclared(&self) -> bool {
        matches!(self, Self::UndeclaredAttribute { .. })
    }
}

impl ErrorCode for AccessError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "ACCESS_UNAUTHORIZED",
            Self::UndeclaredAttribute { .. } => "ACCESS_UNDECLARED_ATTRIBUTE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Misuse of an [`Interaction`](crate::Interaction).
///
/// These are programming errors: a binding exited out of order means the
/// operation that entered it lost track of its own scope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InteractionError {
    /// A binding was exited while a more recent one was still active.
    #[error("interaction exit out of order: expected binding #{expected}, got #{got}")]
    OutOfOrder {
        /// Binding at the top of the stack.
        expected: u64,
        /// Binding that was passed to `exit`.
        got: u64,
    },

    /// `exit` was called with no active binding.
    #[error("interaction exit without matching enter (binding #{0})")]
    NotActive(u64),
}

impl ErrorCode for InteractionError {
    fn code(&self) -> &'static str {
        match self {
            Self::OutOfOrder { .. } => "INTERACTION_OUT_OF_ORDER",
            Self::NotActive(_) => "INTERACTION_NOT_ACTIVE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Failure while resolving permission tables at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A type names a parent that was never declared.
    #[error("type '{type_name}' extends undeclared parent '{parent}'")]
    UnknownParent {
        /// Declaring type.
        type_name: String,
        /// Missing parent.
        parent: String,
    },

    /// The ancestry of a type loops back onto itself.
    #[error("type ancestry cycle through '{0}'")]
    Cycle(String),

    /// The same type was declared twice.
    #[error("type '{0}' declared twice")]
    DuplicateType(String),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownParent { .. } => "REGISTRY_UNKNOWN_PARENT",
            Self::Cycle(_) => "REGISTRY_CYCLE",
            Self::DuplicateType(_) => "REGISTRY_DUPLICATE_TYPE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
