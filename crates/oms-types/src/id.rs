//! Identifier types for OMS.
//!
//! Node identities are UUID-based so they survive persistence and can be
//! compared across store transactions. Principal identities are the
//! authentication names users log in with. Task identities are small
//! sequential integers, as shown by process listings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identity of a node in the object tree.
///
/// A node keeps its [`NodeId`] across renames and moves; the `name` of a
/// node is only its key inside the current parent container.
///
/// # Example
///
/// ```
/// use oms_types::NodeId;
///
/// let a = NodeId::new();
/// let b = NodeId::new();
/// assert_ne!(a, b);
/// assert!(a.to_string().starts_with("node:"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Creates a new random node ID (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Authentication identity of a principal (e.g. `"user1"`, `"root"`).
///
/// Unlike [`NodeId`], principal IDs are chosen by the authentication
/// backend, so they are plain strings rather than UUIDs.
///
/// # Why No Default?
///
/// There is no meaningful anonymous principal name. Construct explicitly
/// with [`PrincipalId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal ID from its authentication name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Sequential identifier of a background task.
///
/// Task `1` is the init task; newly registered tasks count up from `2`.
/// The textual form is the bare number, which is also the task's name
/// inside the process container.
///
/// ```
/// use oms_types::TaskId;
///
/// let id: TaskId = "7".parse().unwrap();
/// assert_eq!(id, TaskId(7));
/// assert_eq!(id.next(), TaskId(8));
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl TaskId {
    /// The init task.
    pub const INIT: TaskId = TaskId(1);

    /// Returns the following ID.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(TaskId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_uniqueness() {
        assert_ne!(NodeId::new(), NodeId::new());
    }

    #[test]
    fn node_id_uuid() {
        let id = NodeId::new();
        assert_eq!(id.uuid(), id.0);
    }

    #[test]
    fn principal_id_display() {
        let id = PrincipalId::new("user1");
        assert_eq!(id.as_str(), "user1");
        assert_eq!(format!("{id}"), "user1");
        assert_eq!(PrincipalId::from("user1"), id);
    }

    #[test]
    fn task_id_parse_rejects_garbage() {
        assert!("abc".parse::<TaskId>().is_err());
    }

    #[test]
    fn task_id_ordering() {
        assert!(TaskId::INIT < TaskId::INIT.next());
    }

    #[test]
    fn node_id_serde() {
        let id = NodeId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
