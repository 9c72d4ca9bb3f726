//! Principal (actor identity) types.
//!
//! A [`Principal`] is "who is acting". What that principal may do is
//! decided elsewhere: permission grants and role bindings live in the
//! auth layer, and the tree only ever sees principals through an
//! interaction.

use crate::PrincipalId;
use serde::{Deserialize, Serialize};

/// The actor performing an operation on the tree.
///
/// | Variant | Description | Typical Use |
/// |---------|-------------|-------------|
/// | `User` | Authenticated user | Shell sessions, HTTP requests |
/// | `System` | Internal operations | Startup, background daemons |
///
/// `System` bypasses attribute permission checks; it never appears as an
/// owner of a node.
///
/// # Example
///
/// ```
/// use oms_types::{Principal, PrincipalId};
///
/// let user = Principal::User(PrincipalId::new("user1"));
/// assert!(user.is_user());
/// assert_eq!(user.id(), "user1");
///
/// assert!(Principal::System.is_system());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// Authenticated user identified by [`PrincipalId`].
    User(PrincipalId),

    /// Internal operations not attributable to a user.
    System,
}

impl Principal {
    /// Convenience constructor for a user principal.
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self::User(PrincipalId::new(name))
    }

    /// Returns `true` if this is a [`Principal::User`].
    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// Returns `true` if this is [`Principal::System`].
    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    /// Returns the [`PrincipalId`] if this is a User, otherwise `None`.
    #[must_use]
    pub fn user_id(&self) -> Option<&PrincipalId> {
        match self {
            Self::User(id) => Some(id),
            Self::System => None,
        }
    }

    /// Returns the textual identity (`"system"` for the system principal).
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::System => write!(f, "system"),
        }
    }
}
