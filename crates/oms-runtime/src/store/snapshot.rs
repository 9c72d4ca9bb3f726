//! Whole-node snapshots: the unit written to the object store.

use super::StoreError;
use chrono::{DateTime, Utc};
use oms_model::Node;
use oms_types::{NodeId, PrincipalId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Persistent state of one node.
///
/// Children are recorded by id; only persisted children are included,
/// never what extenders contribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: Option<String>,
    pub parent: Option<NodeId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Held feature tags (type capabilities are implied by `type_name`).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub features: BTreeSet<String>,
    pub owner: Option<PrincipalId>,
    #[serde(default)]
    pub inherit_permissions: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<BTreeMap<String, NodeId>>,
}

impl NodeSnapshot {
    /// Captures `node`'s current state.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transient`] for nodes produced by extenders.
    pub fn capture(node: &Node) -> Result<Self, StoreError> {
        if node.is_transient() {
            return Err(StoreError::Transient(node.id()));
        }
        let children = if node.is_container() {
            Some(
                node.persisted_children()?
                    .into_iter()
                    .map(|(name, child)| (name, child.id()))
                    .collect(),
            )
        } else {
            None
        };
        Ok(Self {
            id: node.id(),
            type_name: node.type_name().to_string(),
            name: node.name(),
            parent: node.parent().map(|p| p.id()),
            created_at: node.created_at(),
            modified_at: node.modified_at(),
            features: node.held_features(),
            owner: node.owner_mirror(),
            inherit_permissions: node.inherits_permissions(),
            attrs: node.attrs(),
            children,
        })
    }

    /// Encodes the snapshot as pretty JSON.
    ///
    /// # Errors
    ///
    /// [`StoreError::Serialize`] if an attribute value cannot be encoded.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// [`StoreError::Serialize`] on malformed input.
    pub fn from_json(s: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_model::{builtin, Node};
    use serde_json::json;

    #[test]
    fn capture_leaf() {
        let types = builtin::registry().unwrap();
        let vm = Node::builder(types.get("Compute").unwrap())
            .name("vm1")
            .attr("architecture", json!("x86_64"))
            .feature("virtual")
            .build();

        let snap = NodeSnapshot::capture(&vm).unwrap();
        assert_eq!(snap.type_name, "Compute");
        assert_eq!(snap.name.as_deref(), Some("vm1"));
        assert_eq!(snap.attrs["architecture"], json!("x86_64"));
        assert!(snap.features.contains("virtual"));
        assert!(snap.children.is_none());

        let decoded = NodeSnapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn transient_is_refused() {
        let types = builtin::registry().unwrap();
        let node = Node::builder(types.get("Folder").unwrap()).transient().build();
        assert!(matches!(
            NodeSnapshot::capture(&node),
            Err(StoreError::Transient(_))
        ));
    }
}
