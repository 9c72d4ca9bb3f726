//! Per-type action tables.
//!
//! Actions are named operations attached to node types ("start", "stop",
//! "reboot" on a compute node). They are looked up by the target's type
//! through the same [`TypeFilter`]s providers use, and are exposed to
//! browsing clients as a transient `actions` container of `Action` nodes.
//!
//! ```text
//! ActionTable
//!   (Kind("Compute"), "start")   ─┐
//!   (Kind("Compute"), "stop")    ─┼──► invoke(/computes/vm1, …)
//!   (Kind("Folder"),  "archive") ─┴──► /srv/actions/archive
//!                                       (Actions, transient)
//! ```
//!
//! The `actions` container only appears under containers; actions of leaf
//! types are reachable through execution alone.
//!
//! When several entries match a type under the same action name, the one
//! registered last wins, so specific handlers are registered after
//! generic ones.

use crate::compose::{Extender, ProviderResult};
use crate::schema::{NodeType, TypeFilter};
use crate::{Model, ModelError, Node, NodeRef};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type name of the transient actions container.
pub const ACTIONS_TYPE: &str = "Actions";
/// Type name of one action node.
pub const ACTION_TYPE: &str = "Action";

/// Handler run by an action.
pub type ActionHandler = Arc<dyn Fn(&NodeRef, &Value) -> Result<Value, ModelError> + Send + Sync>;

#[derive(Clone)]
struct ActionEntry {
    filter: TypeFilter,
    name: String,
    description: String,
    handler: ActionHandler,
}

/// Resolved action for one type.
#[derive(Clone)]
pub struct Action {
    /// Action name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// The handler.
    pub handler: ActionHandler,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registered actions, keyed by type filter and name.
#[derive(Default)]
pub struct ActionTable {
    entries: RwLock<Vec<ActionEntry>>,
}

impl ActionTable {
    /// Name of the transient container listing a node's actions.
    pub const CONTAINER: &'static str = "actions";

    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` as action `name` for types matching `filter`.
    pub fn register<F>(&self, filter: TypeFilter, name: &str, description: &str, handler: F)
    where
        F: Fn(&NodeRef, &Value) -> Result<Value, ModelError> + Send + Sync + 'static,
    {
        tracing::debug!(action = name, ?filter, "registered action");
        self.entries.write().push(ActionEntry {
            filter,
            name: name.to_string(),
            description: description.to_string(),
            handler: Arc::new(handler),
        });
    }

    /// Actions available on `kind`, ordered by name.
    #[must_use]
    pub fn actions_for(&self, kind: &NodeType) -> BTreeMap<String, Action> {
        let mut out = BTreeMap::new();
        for entry in self.entries.read().iter().filter(|e| e.filter.matches(kind)) {
            out.insert(
                entry.name.clone(),
                Action {
                    name: entry.name.clone(),
                    description: entry.description.clone(),
                    handler: Arc::clone(&entry.handler),
                },
            );
        }
        out
    }

    /// Runs action `name` on `target`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::NotFound`] if the target's type has no such action
    /// - whatever the handler returns
    pub fn invoke(&self, target: &NodeRef, name: &str, args: &Value) -> Result<Value, ModelError> {
        let action = self
            .actions_for(target.kind())
            .remove(name)
            .ok_or_else(|| ModelError::NotFound {
                container: format!("{}/{}", target.path(), Self::CONTAINER),
                name: name.to_string(),
            })?;
        tracing::debug!(action = name, target = %target.id(), "invoking action");
        (action.handler)(target, args)
    }

    /// Extender exposing the `actions` container on every container whose
    /// type has at least one action.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownType`] if `Actions` or `Action` are not
    /// registered.
    pub fn extender(self: &Arc<Self>, model: &Model) -> Result<ActionsExtender, ModelError> {
        Ok(ActionsExtender {
            table: Arc::clone(self),
            actions_type: model.types().get(ACTIONS_TYPE)?,
            action_type: model.types().get(ACTION_TYPE)?,
        })
    }
}

impl std::fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTable")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

/// Produces the transient `actions` container.
pub struct ActionsExtender {
    table: Arc<ActionTable>,
    actions_type: Arc<NodeType>,
    action_type: Arc<NodeType>,
}

impl Extender for ActionsExtender {
    fn name(&self) -> &str {
        "actions"
    }

    fn extend(&self, container: &NodeRef) -> ProviderResult {
        if container.kind().is_a(ACTIONS_TYPE) {
            return Ok(Vec::new());
        }
        let actions = self.table.actions_for(container.kind());
        if actions.is_empty() {
            return Ok(Vec::new());
        }

        let holder = Node::builder(Arc::clone(&self.actions_type))
            .name(ActionTable::CONTAINER)
            .transient()
            .build();
        let nodes: Vec<(String, NodeRef)> = actions
            .into_values()
            .map(|action| {
                let node = Node::builder(Arc::clone(&self.action_type))
                    .name(action.name.clone())
                    .attr("action", json!(action.name))
                    .attr("description", json!(action.description))
                    .transient()
                    .build();
                (action.name, node)
            })
            .collect();
        for (_, node) in &nodes {
            node.set_parent(Some(&holder));
        }
        holder
            .with_children_mut(|children| children.extend(nodes))
            .map_err(|e| crate::ProviderError::Failed(e.to_string()))?;

        Ok(vec![(ActionTable::CONTAINER.to_string(), holder)])
    }
}
