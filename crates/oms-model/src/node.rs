//! Nodes of the object tree.
//!
//! A [`Node`] is shared as [`NodeRef`] (`Arc<Node>`). Containers own their
//! children through strong references; a child only keeps a [`Weak`] link
//! back to its parent, so ownership always points downwards and the tree
//! cannot form reference cycles.
//!
//! ```text
//!            ┌──────────── root (Container) ─────────────┐
//!   children │ Arc                                  Arc  │ children
//!            ▼                                           ▼
//!     computes (Container)                        proc (Proc)
//!            │ ▲ Weak parent                          │ ▲
//!            ▼ │                                      ▼ │
//!        vm1 (Compute)                            2 (Task)
//! ```
//!
//! # Attributes
//!
//! [`Node::get_attr`] serves, in order:
//!
//! | Source | Names | Writable via `set_attr` |
//! |--------|-------|-------------------------|
//! | Built-in | `name`, `oid`, `type`, `ctime`, `mtime`, `features`, `owner`, `transient`, `inherit_permissions` | `features`, `inherit_permissions` |
//! | Computed | declared by the type (e.g. `uptime`) | No |
//! | Stored | anything set with `set_attr` | Yes |
//!
//! Writing a stored attribute bumps `mtime`, except for names starting
//! with `_` and the bookkeeping attribute `metadata`. Feature and
//! permission-inheritance updates never bump it.

use crate::schema::NodeType;
use crate::ModelError;
use chrono::{DateTime, SecondsFormat, Utc};
use oms_types::{NodeId, PrincipalId};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Weak};

/// Shared handle to a node.
pub type NodeRef = Arc<Node>;

/// Attributes that never bump `mtime` when written.
const MTIME_BLACKLIST: &[&str] = &[
    "inherit_permissions",
    "owner",
    "features",
    "oid",
    "metadata",
];

/// Attributes served by the node itself rather than the type or the store.
const BUILTIN_ATTRIBUTES: &[&str] = &[
    "name",
    "oid",
    "type",
    "ctime",
    "mtime",
    "features",
    "owner",
    "transient",
    "inherit_permissions",
];

fn bumps_mtime(attribute: &str) -> bool {
    !attribute.starts_with('_') && !MTIME_BLACKLIST.contains(&attribute)
}

fn timestamp(t: &DateTime<Utc>) -> Value {
    Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true))
}

struct NodeInner {
    name: Option<String>,
    parent: Weak<Node>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    features: BTreeSet<String>,
    owner: Option<PrincipalId>,
    transient: bool,
    inherit_permissions: bool,
    attrs: BTreeMap<String, Value>,
    children: Option<BTreeMap<String, NodeRef>>,
}

/// A node of the object tree.
///
/// All state sits behind one `parking_lot::RwLock`. Container updates
/// that touch a child lock the nodes involved together, always in id
/// order; nothing else holds one node's lock while taking another's.
pub struct Node {
    id: NodeId,
    kind: Arc<NodeType>,
    inner: RwLock<NodeInner>,
}

impl Node {
    /// Creates an unnamed, detached node of `kind`.
    ///
    /// `ctime` and `mtime` are both set to now. Container types start with
    /// an empty child map.
    #[must_use]
    pub fn new(kind: Arc<NodeType>) -> NodeRef {
        NodeBuilder::new(kind).build()
    }

    /// Creates a detached node with an explicit name.
    #[must_use]
    pub fn named(kind: Arc<NodeType>, name: impl Into<String>) -> NodeRef {
        NodeBuilder::new(kind).name(name).build()
    }

    /// Starts building a node of `kind`.
    #[must_use]
    pub fn builder(kind: Arc<NodeType>) -> NodeBuilder {
        NodeBuilder::new(kind)
    }

    /// Stable identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's type.
    #[must_use]
    pub fn kind(&self) -> &Arc<NodeType> {
        &self.kind
    }

    /// Shorthand for `kind().name()`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.kind.name()
    }

    /// Returns `true` if the node's type is a container.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// Key of this node in its parent, if named.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.inner.read().name.clone()
    }

    /// Display name: the computed `nickname` if the type has one, else the
    /// name.
    #[must_use]
    pub fn nickname(&self) -> Option<String> {
        if let Some(f) = self.kind.computed("nickname") {
            if let Value::String(s) = f(self) {
                return Some(s);
            }
        }
        self.name()
    }

    /// Current parent, if attached and still alive.
    #[must_use]
    pub fn parent(&self) -> Option<NodeRef> {
        self.inner.read().parent.upgrade()
    }

    /// Parent chain, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            out.push(node);
        }
        out
    }

    /// Returns `true` if `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, other: &Node) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        other
            .ancestors()
            .iter()
            .any(|a| std::ptr::eq(Arc::as_ptr(a), self))
    }

    /// Slash-separated path from the root, e.g. `/proc/2`.
    #[must_use]
    pub fn path(&self) -> String {
        let mut parts: Vec<String> = self
            .ancestors()
            .iter()
            .rev()
            .skip(1) // the root has no key
            .map(|n| n.name().unwrap_or_default())
            .collect();
        if self.parent().is_some() {
            parts.push(self.name().unwrap_or_default());
        }
        format!("/{}", parts.join("/"))
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.read().created_at
    }

    /// Last modification time.
    #[must_use]
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.inner.read().modified_at
    }

    /// Sets `mtime` to now.
    pub fn touch(&self) {
        self.inner.write().modified_at = Utc::now();
    }

    /// Returns `true` for nodes produced by an extender.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.inner.read().transient
    }

    /// Returns `true` if role lookups continue on the parent.
    #[must_use]
    pub fn inherits_permissions(&self) -> bool {
        self.inner.read().inherit_permissions
    }

    /// Sets permission inheritance. Does not bump `mtime`.
    pub fn set_inherit_permissions(&self, inherit: bool) {
        self.inner.write().inherit_permissions = inherit;
    }

    /// Type capabilities together with the held marker tags.
    #[must_use]
    pub fn features(&self) -> BTreeSet<String> {
        let mut out = self.kind.capabilities().clone();
        out.extend(self.inner.read().features.iter().cloned());
        out
    }

    /// Marker tags currently held (without type capabilities).
    #[must_use]
    pub fn held_features(&self) -> BTreeSet<String> {
        self.inner.read().features.clone()
    }

    /// Updates the held marker tags.
    ///
    /// | Form | Example | Effect |
    /// |------|---------|--------|
    /// | Replace-all | `["a", "b"]` | held = {a, b} |
    /// | Add | `["+a"]` | held ∪= {a} |
    /// | Remove | `["-a"]` | held −= {a} |
    /// | Add + remove | `["+a", "-b"]` | both, atomically |
    ///
    /// Empty strings are ignored. Every name must belong to the type's
    /// marker vocabulary or be currently held. The update is validated
    /// completely before anything changes.
    ///
    /// # Errors
    ///
    /// - [`ModelError::MixedFeatureUpdate`] if plain and prefixed values mix
    /// - [`ModelError::UnknownFeature`] for a name outside the vocabulary
    pub fn set_features<I, S>(&self, values: I) -> Result<(), ModelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        let prefixed = values
            .iter()
            .filter(|v| v.starts_with('+') || v.starts_with('-'))
            .count();
        if prefixed != 0 && prefixed != values.len() {
            return Err(ModelError::MixedFeatureUpdate);
        }

        let mut inner = self.inner.write();
        let known = |name: &str, held: &BTreeSet<String>| {
            self.kind.markers().contains(name) || held.contains(name)
        };

        let updated = if prefixed == 0 {
            let mut next = BTreeSet::new();
            for name in values {
                if !known(&name, &inner.features) {
                    return Err(self.unknown_feature(name));
                }
                next.insert(name);
            }
            next
        } else {
            let mut next = inner.features.clone();
            for value in values {
                let (op, name) = value.split_at(1);
                if name.is_empty() {
                    continue;
                }
                if !known(name, &inner.features) {
                    return Err(self.unknown_feature(name.to_string()));
                }
                if op == "+" {
                    next.insert(name.to_string());
                } else {
                    next.remove(name);
                }
            }
            next
        };

        tracing::trace!(node = %self.id, features = ?updated, "features updated");
        inner.features = updated;
        Ok(())
    }

    fn unknown_feature(&self, feature: String) -> ModelError {
        ModelError::UnknownFeature {
            type_name: self.type_name().to_string(),
            feature,
        }
    }

    /// Owner as last recorded on the node.
    ///
    /// This is a mirror of the owner role binding maintained by
    /// [`Model::set_owner`](crate::Model::set_owner); the role store
    /// stays authoritative.
    #[must_use]
    pub fn owner_mirror(&self) -> Option<PrincipalId> {
        self.inner.read().owner.clone()
    }

    pub(crate) fn set_owner_mirror(&self, owner: Option<PrincipalId>) {
        self.inner.write().owner = owner;
    }

    /// Raw stored attribute (no built-ins, no computed values).
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<Value> {
        self.inner.read().attrs.get(name).cloned()
    }

    /// Copy of all stored attributes.
    #[must_use]
    pub fn attrs(&self) -> BTreeMap<String, Value> {
        self.inner.read().attrs.clone()
    }

    /// Reads an attribute: built-in, computed, then stored.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownAttribute`] if no source knows `name`.
    pub fn get_attr(&self, name: &str) -> Result<Value, ModelError> {
        if let Some(v) = self.builtin(name) {
            return Ok(v);
        }
        if let Some(f) = self.kind.computed(name) {
            return Ok(f(self));
        }
        self.attr(name).ok_or_else(|| ModelError::UnknownAttribute {
            type_name: self.type_name().to_string(),
            attribute: name.to_string(),
        })
    }

    fn builtin(&self, name: &str) -> Option<Value> {
        let inner = self.inner.read();
        let v = match name {
            "name" => inner.name.clone().map_or(Value::Null, Value::String),
            "oid" => Value::String(self.id.uuid().to_string()),
            "type" => Value::String(self.type_name().to_string()),
            "ctime" => timestamp(&inner.created_at),
            "mtime" => timestamp(&inner.modified_at),
            "features" => {
                let mut all = self.kind.capabilities().clone();
                all.extend(inner.features.iter().cloned());
                Value::Array(all.into_iter().map(Value::String).collect())
            }
            "owner" => inner
                .owner
                .as_ref()
                .map_or(Value::Null, |o| Value::String(o.to_string())),
            "transient" => Value::Bool(inner.transient),
            "inherit_permissions" => Value::Bool(inner.inherit_permissions),
            _ => return None,
        };
        Some(v)
    }

    /// Writes an attribute.
    ///
    /// `features` accepts an array of strings (see [`set_features`](Self::set_features)),
    /// `inherit_permissions` a boolean. Other built-ins and computed
    /// attributes are read-only.
    ///
    /// # Errors
    ///
    /// - [`ModelError::ReadOnlyAttribute`] for read-only attributes
    /// - [`ModelError::InvalidValue`] if a built-in gets the wrong shape
    /// - errors of [`set_features`](Self::set_features)
    pub fn set_attr(&self, name: &str, value: Value) -> Result<(), ModelError> {
        match name {
            "features" => {
                let Value::Array(items) = value else {
                    return Err(invalid(name, "an array of strings"));
                };
                let tags = items
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => Ok(s),
                        _ => Err(invalid("features", "an array of strings")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                return self.set_features(tags);
            }
            "inherit_permissions" => {
                let Value::Bool(b) = value else {
                    return Err(invalid(name, "a boolean"));
                };
                self.set_inherit_permissions(b);
                return Ok(());
            }
            _ => {}
        }

        if BUILTIN_ATTRIBUTES.contains(&name) || self.kind.computed(name).is_some() {
            return Err(ModelError::ReadOnlyAttribute {
                type_name: self.type_name().to_string(),
                attribute: name.to_string(),
            });
        }

        let mut inner = self.inner.write();
        inner.attrs.insert(name.to_string(), value);
        if bumps_mtime(name) {
            inner.modified_at = Utc::now();
        }
        Ok(())
    }

    /// Persisted children, without any provider contribution.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotAContainer`] for leaf nodes.
    pub fn persisted_children(&self) -> Result<BTreeMap<String, NodeRef>, ModelError> {
        self.with_children(BTreeMap::clone)
    }

    // ── crate-internal tree plumbing ─────────────────────────────────

    pub(crate) fn set_name(&self, name: Option<String>) {
        self.inner.write().name = name;
    }

    pub(crate) fn set_parent(&self, parent: Option<&NodeRef>) {
        self.inner.write().parent = parent.map_or_else(Weak::new, Arc::downgrade);
    }

    /// Files `self` under `to`, detaching it from `from`, with `from`,
    /// `to` and `self` write-locked together. `from` must not be `to`.
    ///
    /// `pick` chooses the key in `to` from the node's current name.
    /// Returns `None` and changes nothing if the node's parent is no
    /// longer `from`; the caller re-reads the parent and retries.
    /// Otherwise returns the previous and the new name.
    pub(crate) fn reattach(
        self: &Arc<Self>,
        from: Option<&NodeRef>,
        to: &NodeRef,
        pick: impl FnOnce(&BTreeMap<String, NodeRef>, Option<&str>) -> Result<String, ModelError>,
    ) -> Result<Option<(Option<String>, String)>, ModelError> {
        let (source, mut target, mut item) = match from {
            Some(old) => {
                let (source, target, item) = write_three(old, to, self);
                (Some(source), target, item)
            }
            None => {
                let (target, item) = write_two(to, self);
                (None, target, item)
            }
        };
        let current = match (from, item.parent.upgrade()) {
            (None, None) => true,
            (Some(from), Some(parent)) => Arc::ptr_eq(from, &parent),
            _ => false,
        };
        if !current {
            return Ok(None);
        }

        let children = target
            .children
            .as_mut()
            .ok_or_else(|| to.not_a_container())?;
        let name = pick(children, item.name.as_deref())?;
        children.insert(name.clone(), Arc::clone(self));
        // extender-made nodes point at a parent that never filed them
        if let (Some(mut source), Some(old)) = (source, item.name.as_ref()) {
            if let Some(children) = source.children.as_mut() {
                if children.get(old).is_some_and(|n| Arc::ptr_eq(n, self)) {
                    children.remove(old);
                }
            }
        }
        let old_name = item.name.replace(name.clone());
        item.parent = Arc::downgrade(to);
        Ok(Some((old_name, name)))
    }

    /// Re-keys the persisted child `old` as `new`, with `self` and the
    /// child write-locked together. Returns the child, or `None` when
    /// `old == new`.
    pub(crate) fn rename_child(
        &self,
        old: &str,
        new: &str,
        label: &str,
    ) -> Result<Option<NodeRef>, ModelError> {
        loop {
            let Some(child) = self.with_children(|c| c.get(old).cloned())? else {
                return Err(ModelError::NotFound {
                    container: label.to_string(),
                    name: old.to_string(),
                });
            };
            if old == new {
                return Ok(None);
            }

            let renamed = {
                let (mut inner, mut item) = write_two(self, &child);
                let children = inner
                    .children
                    .as_mut()
                    .ok_or_else(|| self.not_a_container())?;
                if !children.get(old).is_some_and(|n| Arc::ptr_eq(n, &child)) {
                    false
                } else if children.contains_key(new) {
                    return Err(ModelError::NameConflict {
                        container: label.to_string(),
                        name: new.to_string(),
                    });
                } else {
                    children.remove(old);
                    children.insert(new.to_string(), Arc::clone(&child));
                    item.name = Some(new.to_string());
                    true
                }
            };
            if renamed {
                return Ok(Some(child));
            }
        }
    }

    /// Unfiles the persisted child `name` and clears its parent, with
    /// `self` and the child write-locked together.
    pub(crate) fn detach_child(&self, name: &str) -> Result<Option<NodeRef>, ModelError> {
        loop {
            let Some(child) = self.with_children(|c| c.get(name).cloned())? else {
                return Ok(None);
            };

            let detached = {
                let (mut inner, mut item) = write_two(self, &child);
                let children = inner
                    .children
                    .as_mut()
                    .ok_or_else(|| self.not_a_container())?;
                if children.get(name).is_some_and(|n| Arc::ptr_eq(n, &child)) {
                    children.remove(name);
                    item.parent = Weak::new();
                    true
                } else {
                    false
                }
            };
            if detached {
                return Ok(Some(child));
            }
        }
    }

    /// Marks the node as produced by an extender.
    pub(crate) fn mark_transient(&self) {
        let mut inner = self.inner.write();
        inner.transient = true;
        inner.inherit_permissions = true;
    }

    pub(crate) fn not_a_container(&self) -> ModelError {
        ModelError::NotAContainer(self.type_name().to_string())
    }

    /// Runs `f` over the persisted children.
    pub(crate) fn with_children<R>(
        &self,
        f: impl FnOnce(&BTreeMap<String, NodeRef>) -> R,
    ) -> Result<R, ModelError> {
        let inner = self.inner.read();
        inner
            .children
            .as_ref()
            .map(f)
            .ok_or_else(|| self.not_a_container())
    }

    /// Runs `f` over the persisted children under the write lock.
    pub(crate) fn with_children_mut<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, NodeRef>) -> R,
    ) -> Result<R, ModelError> {
        let mut inner = self.inner.write();
        match inner.children.as_mut() {
            Some(children) => Ok(f(children)),
            None => Err(self.not_a_container()),
        }
    }
}

type InnerGuard<'a> = RwLockWriteGuard<'a, NodeInner>;

// Nodes locked together are always locked in id order.
fn write_two<'a>(a: &'a Node, b: &'a Node) -> (InnerGuard<'a>, InnerGuard<'a>) {
    if a.id < b.id {
        let first = a.inner.write();
        (first, b.inner.write())
    } else {
        let first = b.inner.write();
        (a.inner.write(), first)
    }
}

fn write_three<'a>(
    a: &'a Node,
    b: &'a Node,
    c: &'a Node,
) -> (InnerGuard<'a>, InnerGuard<'a>, InnerGuard<'a>) {
    if a.id < b.id && a.id < c.id {
        let first = a.inner.write();
        let (b, c) = write_two(b, c);
        (first, b, c)
    } else if b.id < c.id {
        let first = b.inner.write();
        let (a, c) = write_two(a, c);
        (a, first, c)
    } else {
        let first = c.inner.write();
        let (a, b) = write_two(a, b);
        (a, b, first)
    }
}

fn invalid(attribute: &str, expected: &'static str) -> ModelError {
    ModelError::InvalidValue {
        attribute: attribute.to_string(),
        expected,
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type", &self.kind.name())
            .field("name", &inner.name)
            .field("transient", &inner.transient)
            .finish_non_exhaustive()
    }
}

/// Builder for detached nodes.
///
/// ```
/// use oms_model::{Node, TypeDef, TypeRegistry};
/// use serde_json::json;
///
/// let mut types = TypeRegistry::new();
/// let compute = types.register(TypeDef::new("Compute")).unwrap();
///
/// let vm = Node::builder(compute)
///     .name("vm1")
///     .attr("architecture", json!("x86_64"))
///     .build();
///
/// assert_eq!(vm.name().as_deref(), Some("vm1"));
/// assert_eq!(vm.get_attr("architecture").unwrap(), json!("x86_64"));
/// assert_eq!(vm.created_at(), vm.modified_at());
/// ```
#[must_use]
pub struct NodeBuilder {
    kind: Arc<NodeType>,
    name: Option<String>,
    attrs: BTreeMap<String, Value>,
    features: BTreeSet<String>,
    transient: bool,
    inherit_permissions: bool,
}

impl NodeBuilder {
    fn new(kind: Arc<NodeType>) -> Self {
        Self {
            kind,
            name: None,
            attrs: BTreeMap::new(),
            features: BTreeSet::new(),
            transient: false,
            inherit_permissions: false,
        }
    }

    /// Sets the name the node will be added under.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets an initial stored attribute.
    pub fn attr(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Sets an initial held marker tag (unchecked).
    pub fn feature(mut self, tag: impl Into<String>) -> Self {
        self.features.insert(tag.into());
        self
    }

    /// Marks the node transient (and permission-inheriting).
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self.inherit_permissions = true;
        self
    }

    /// Sets permission inheritance.
    pub fn inherit_permissions(mut self, inherit: bool) -> Self {
        self.inherit_permissions = inherit;
        self
    }

    /// Creates the node.
    #[must_use]
    pub fn build(self) -> NodeRef {
        let now = Utc::now();
        let children = self.kind.is_container().then(BTreeMap::new);
        Arc::new(Node {
            id: NodeId::new(),
            kind: self.kind,
            inner: RwLock::new(NodeInner {
                name: self.name,
                parent: Weak::new(),
                created_at: now,
                modified_at: now,
                features: self.features,
                owner: None,
                transient: self.transient,
                inherit_permissions: self.inherit_permissions,
                attrs: self.attrs,
                children,
            }),
        })
    }
}
