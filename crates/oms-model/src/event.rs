//! Model events and the sink contract.
//!
//! The model layer publishes a [`ModelEvent`] for every structural change.
//! Delivery is the runtime's concern: it provides an event bus implementing
//! [`EventSink`]. The model never waits on subscribers.
//!
//! | Event | Emitted by |
//! |-------|------------|
//! | `Created` | adding a detached node to a container |
//! | `Moved` | adding a node that had another parent, renaming |
//! | `OwnerChanged` | changing the owner to a different principal |
//! | `Removed` | removing a child |

use oms_types::{NodeId, PrincipalId};
use serde::{Deserialize, Serialize};

/// A structural change of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModelEvent {
    /// A node was attached for the first time.
    Created {
        /// The new child.
        node: NodeId,
        /// Its container.
        parent: NodeId,
        /// Assigned name.
        name: String,
    },
    /// A node changed container or name.
    Moved {
        /// The moved node.
        node: NodeId,
        /// Previous container.
        from: NodeId,
        /// New container (equal to `from` for renames).
        to: NodeId,
        /// Previous name.
        old_name: String,
        /// New name.
        new_name: String,
    },
    /// The owner role moved to another principal.
    OwnerChanged {
        /// The node.
        node: NodeId,
        /// Previous owner.
        old: Option<PrincipalId>,
        /// New owner.
        new: Option<PrincipalId>,
    },
    /// A child was detached.
    Removed {
        /// The removed node.
        node: NodeId,
        /// Its former container.
        parent: NodeId,
        /// Its former name.
        name: String,
    },
}

impl ModelEvent {
    /// The node the event is about.
    #[must_use]
    pub fn node(&self) -> NodeId {
        match self {
            Self::Created { node, .. }
            | Self::Moved { node, .. }
            | Self::OwnerChanged { node, .. }
            | Self::Removed { node, .. } => *node,
        }
    }

    /// Short event name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Moved { .. } => "moved",
            Self::OwnerChanged { .. } => "owner_changed",
            Self::Removed { .. } => "removed",
        }
    }
}

/// Receiver of model events.
pub trait EventSink: Send + Sync {
    /// Publishes one event. Must not block.
    fn publish(&self, event: ModelEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, event: ModelEvent) {
        tracing::trace!(event = event.kind(), node = %event.node(), "event dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tagged() {
        let ev = ModelEvent::Removed {
            node: NodeId::new(),
            parent: NodeId::new(),
            name: "vm1".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "removed");
        assert_eq!(json["name"], "vm1");
        let back: ModelEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn node_accessor() {
        let id = NodeId::new();
        let ev = ModelEvent::OwnerChanged {
            node: id,
            old: None,
            new: Some(PrincipalId::new("alice")),
        };
        assert_eq!(ev.node(), id);
        assert_eq!(ev.kind(), "owner_changed");
    }
}
