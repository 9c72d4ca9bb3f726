//! Container operations.
//!
//! Containers are plain [`Node`]s whose type has a containment rule. The
//! operations on them are split the way the runtime consumes them:
//!
//! | Trait | Operations | Backed by |
//! |-------|------------|-----------|
//! | [`ContainerCore`] | `get`, `list_names`, `list_content`, `iter` | the composed view |
//! | [`ContainerMut`] | `can_contain`, `add`, `rename`, `remove` | persisted children |
//!
//! Both traits use associated item and error types so that the secure
//! proxies in the runtime can offer the same surface over wrapped nodes.
//!
//! [`Container`] is the unchecked implementation over a [`NodeRef`].

use crate::compose::{Composition, CompositionEngine};
use crate::event::{EventSink, ModelEvent};
use crate::{ModelError, Node, NodeRef};
use std::sync::Arc;
use uuid::Uuid;

/// Read-only container operations.
pub trait ContainerCore {
    /// Child handle type.
    type Item;
    /// Error type.
    type Error;

    /// Visible child named `name`.
    fn get(&self, name: &str) -> Result<Self::Item, Self::Error>;

    /// Visible names, ordered.
    fn list_names(&self) -> Result<Vec<String>, Self::Error>;

    /// Visible children, ordered by name.
    fn list_content(&self) -> Result<Vec<Self::Item>, Self::Error>;

    /// Visible `(name, child)` pairs, ordered by name.
    fn iter(&self) -> Result<std::vec::IntoIter<(String, Self::Item)>, Self::Error>;
}

/// Mutating container operations.
pub trait ContainerMut: ContainerCore {
    /// Returns `true` if the containment rule accepts `candidate`.
    fn can_contain(&self, candidate: &Node) -> Result<bool, Self::Error>;

    /// Adds `item`, returning the name it was stored under.
    fn add(&self, item: NodeRef) -> Result<String, Self::Error>;

    /// Renames a persisted child.
    fn rename(&self, old: &str, new: &str) -> Result<(), Self::Error>;

    /// Detaches and returns a persisted child.
    fn remove(&self, name: &str) -> Result<Self::Item, Self::Error>;
}

/// Unchecked container handle.
///
/// Created with [`Model::container`](crate::Model::container).
#[derive(Clone)]
pub struct Container {
    node: NodeRef,
    engine: CompositionEngine,
    events: Arc<dyn EventSink>,
}

impl Container {
    pub(crate) fn new(
        node: NodeRef,
        engine: CompositionEngine,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ModelError> {
        if !node.is_container() {
            return Err(node.not_a_container());
        }
        Ok(Self {
            node,
            engine,
            events,
        })
    }

    /// The container node.
    #[must_use]
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Full composition, including provider failures.
    ///
    /// # Errors
    ///
    /// Never fails for a valid container; kept fallible for symmetry with
    /// the engine.
    pub fn compose(&self) -> Result<Composition, ModelError> {
        self.engine.compose(&self.node)
    }

    fn not_found(&self, name: &str) -> ModelError {
        ModelError::NotFound {
            container: self.node.path(),
            name: name.to_string(),
        }
    }

    fn fresh_name(children: &std::collections::BTreeMap<String, NodeRef>) -> String {
        loop {
            let candidate = Uuid::new_v4().to_string();
            if !children.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("node", &self.node).finish()
    }
}

impl ContainerCore for Container {
    type Item = NodeRef;
    type Error = ModelError;

    fn get(&self, name: &str) -> Result<NodeRef, ModelError> {
        self.compose()?
            .children
            .remove(name)
            .ok_or_else(|| self.not_found(name))
    }

    fn list_names(&self) -> Result<Vec<String>, ModelError> {
        Ok(self.compose()?.names())
    }

    fn list_content(&self) -> Result<Vec<NodeRef>, ModelError> {
        Ok(self.compose()?.children.into_values().collect())
    }

    fn iter(&self) -> Result<std::vec::IntoIter<(String, NodeRef)>, ModelError> {
        let items: Vec<_> = self.compose()?.children.into_iter().collect();
        Ok(items.into_iter())
    }
}

impl ContainerMut for Container {
    fn can_contain(&self, candidate: &Node) -> Result<bool, ModelError> {
        let rule = self
            .node
            .kind()
            .containment()
            .ok_or_else(|| self.node.not_a_container())?;
        Ok(rule.accepts(candidate))
    }

    fn add(&self, item: NodeRef) -> Result<String, ModelError> {
        let container = &self.node;
        if !self.can_contain(&item)? {
            let expected = container
                .kind()
                .containment()
                .map(ToString::to_string)
                .unwrap_or_default();
            tracing::debug!(
                container = container.type_name(),
                candidate = item.type_name(),
                "containment rejected"
            );
            return Err(ModelError::ContainmentRejected {
                container: container.type_name().to_string(),
                candidate: item.type_name().to_string(),
                expected,
            });
        }
        if item.is_ancestor_or_self(container) {
            return Err(ModelError::WouldCycle {
                name: item.name().unwrap_or_default(),
            });
        }

        // A concurrent move may refile the item between reading its parent
        // and locking; reattach reports that and the parent is re-read.
        let label = container.path();
        let (old_parent, old_name, name) = loop {
            let old_parent = item.parent();
            if old_parent
                .as_ref()
                .is_some_and(|p| Arc::ptr_eq(p, container))
            {
                return Ok(item.name().unwrap_or_default());
            }
            let moved = item.reattach(old_parent.as_ref(), container, |children, current| {
                match current {
                    Some(n) if children.contains_key(n) => Err(ModelError::NameConflict {
                        container: label.clone(),
                        name: n.to_string(),
                    }),
                    Some(n) => Ok(n.to_string()),
                    None => Ok(Self::fresh_name(children)),
                }
            })?;
            if let Some((old_name, name)) = moved {
                break (old_parent, old_name, name);
            }
        };

        let event = match (old_parent, old_name) {
            (Some(from), Some(old_name)) => ModelEvent::Moved {
                node: item.id(),
                from: from.id(),
                to: container.id(),
                old_name,
                new_name: name.clone(),
            },
            _ => ModelEvent::Created {
                node: item.id(),
                parent: container.id(),
                name: name.clone(),
            },
        };
        tracing::debug!(event = event.kind(), container = %container.id(), name = %name, "child added");
        self.events.publish(event);
        Ok(name)
    }

    fn rename(&self, old: &str, new: &str) -> Result<(), ModelError> {
        let container = &self.node;
        let label = container.path();
        if let Some(child) = container.rename_child(old, new, &label)? {
            self.events.publish(ModelEvent::Moved {
                node: child.id(),
                from: container.id(),
                to: container.id(),
                old_name: old.to_string(),
                new_name: new.to_string(),
            });
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<NodeRef, ModelError> {
        let container = &self.node;
        let child = container
            .detach_child(name)?
            .ok_or_else(|| self.not_found(name))?;

        tracing::debug!(container = %container.id(), name, "child removed");
        self.events.publish(ModelEvent::Removed {
            node: child.id(),
            parent: container.id(),
            name: name.to_string(),
        });
        Ok(child)
    }
}
