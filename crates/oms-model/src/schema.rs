//! Node types: capabilities, markers, containment and computed attributes.
//!
//! Types are described with [`TypeDef`] values and registered once at
//! startup in a [`TypeRegistry`]. Registration resolves single
//! inheritance: a registered [`NodeType`] carries the accumulated
//! capabilities, marker vocabulary and computed attributes of its whole
//! ancestry, so runtime checks never walk parents.
//!
//! ```text
//! TypeDef("Container")                     NodeType("Proc")
//!   ▲                                        ancestry     = [Proc, Container, Model]
//! TypeDef("Proc")                   ──►      capabilities = Container's ∪ Proc's
//!   .extends("Container")                    containment  = Kind("Task")
//!   .container(Containment::Kind("Task"))    computed     = Model's ∪ Proc's
//! ```
//!
//! The per-type permission declarations ride along in the same
//! definitions and are handed to the permission registry through
//! [`TypeRegistry::permission_registry`].

use crate::{ModelError, Node};
use oms_auth::{CheckMode, PermissionDecl, PermissionRegistry, RegistryError};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Closure computing an attribute value on every read.
pub type ComputedFn = Arc<dyn Fn(&Node) -> Value + Send + Sync>;

/// What a container accepts as children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Containment {
    /// Read-only container: `add` always fails.
    Nothing,
    /// Any node.
    Any,
    /// Nodes of the type or one of its subtypes.
    Kind(String),
    /// Nodes whose type provides the capability, or that declare or hold
    /// a marker tag of that name.
    Capability(String),
}

impl Containment {
    /// Returns `true` if `candidate` satisfies the rule.
    #[must_use]
    pub fn accepts(&self, candidate: &Node) -> bool {
        match self {
            Self::Nothing => false,
            Self::Any => true,
            Self::Kind(kind) => candidate.kind().is_a(kind),
            Self::Capability(cap) => {
                let kind = candidate.kind();
                kind.provides(cap)
                    || kind.markers().contains(cap)
                    || candidate.held_features().contains(cap)
            }
        }
    }
}

impl fmt::Display for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => f.write_str("nothing"),
            Self::Any => f.write_str("anything"),
            Self::Kind(k) => write!(f, "a '{k}'"),
            Self::Capability(c) => write!(f, "something providing '{c}'"),
        }
    }
}

/// Selects the container types a provider applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// Every container.
    Any,
    /// Containers of the type or one of its subtypes.
    Kind(String),
    /// Containers whose type provides the capability.
    Capability(String),
}

impl TypeFilter {
    /// Filter matching `kind` and its subtypes.
    #[must_use]
    pub fn kind(kind: impl Into<String>) -> Self {
        Self::Kind(kind.into())
    }

    /// Filter matching types providing `capability`.
    #[must_use]
    pub fn capability(capability: impl Into<String>) -> Self {
        Self::Capability(capability.into())
    }

    /// Returns `true` if `node_type` passes the filter.
    #[must_use]
    pub fn matches(&self, node_type: &NodeType) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(k) => node_type.is_a(k),
            Self::Capability(c) => node_type.provides(c),
        }
    }
}

/// Declarative description of a node type.
///
/// # Example
///
/// ```
/// use oms_model::{Containment, TypeDef, TypeRegistry};
///
/// let mut types = TypeRegistry::new();
/// types.register(TypeDef::new("Model").permission("name", "view")).unwrap();
/// types
///     .register(
///         TypeDef::new("Compute")
///             .extends("Model")
///             .capability("compute")
///             .marker("deployed")
///             .permission("architecture", "read"),
///     )
///     .unwrap();
///
/// let compute = types.get("Compute").unwrap();
/// assert!(compute.is_a("Model"));
/// assert!(compute.provides("compute"));
/// assert!(!compute.is_container());
/// ```
#[derive(Clone)]
pub struct TypeDef {
    name: String,
    parent: Option<String>,
    capabilities: Vec<String>,
    markers: Vec<String>,
    containment: Option<Containment>,
    computed: Vec<(String, ComputedFn)>,
    permissions: Vec<(String, PermissionDecl)>,
}

impl TypeDef {
    /// Starts a definition for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            capabilities: Vec::new(),
            markers: Vec::new(),
            containment: None,
            computed: Vec::new(),
            permissions: Vec::new(),
        }
    }

    /// Sets the parent type.
    #[must_use]
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds an interface-like capability.
    #[must_use]
    pub fn capability(mut self, name: impl Into<String>) -> Self {
        self.capabilities.push(name.into());
        self
    }

    /// Adds a feature tag to the marker vocabulary.
    #[must_use]
    pub fn marker(mut self, name: impl Into<String>) -> Self {
        self.markers.push(name.into());
        self
    }

    /// Makes the type a container with the given rule.
    #[must_use]
    pub fn container(mut self, rule: Containment) -> Self {
        self.containment = Some(rule);
        self
    }

    /// Adds a computed, read-only attribute.
    #[must_use]
    pub fn computed<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Node) -> Value + Send + Sync + 'static,
    {
        self.computed.push((name.into(), Arc::new(f)));
        self
    }

    /// Declares the permission guarding `attribute`.
    #[must_use]
    pub fn permission(mut self, attribute: impl Into<String>, decl: impl Into<PermissionDecl>) -> Self {
        self.permissions.push((attribute.into(), decl.into()));
        self
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("containment", &self.containment)
            .finish_non_exhaustive()
    }
}

/// A registered node type with its ancestry resolved.
pub struct NodeType {
    name: String,
    /// `[self, parent, grandparent, ...]`
    ancestry: Vec<String>,
    capabilities: BTreeSet<String>,
    markers: BTreeSet<String>,
    containment: Option<Containment>,
    computed: BTreeMap<String, ComputedFn>,
}

impl NodeType {
    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if this type is `kind` or derives from it.
    #[must_use]
    pub fn is_a(&self, kind: &str) -> bool {
        self.ancestry.iter().any(|a| a == kind)
    }

    /// Returns `true` if this type (or an ancestor) declares `capability`.
    #[must_use]
    pub fn provides(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Type names from this type up to the root.
    #[must_use]
    pub fn ancestry(&self) -> &[String] {
        &self.ancestry
    }

    /// Accumulated capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Accumulated marker vocabulary.
    #[must_use]
    pub fn markers(&self) -> &BTreeSet<String> {
        &self.markers
    }

    /// Containment rule, if the type is a container.
    #[must_use]
    pub fn containment(&self) -> Option<&Containment> {
        self.containment.as_ref()
    }

    /// Returns `true` if nodes of this type hold children.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.containment.is_some()
    }

    /// Computed attribute by name.
    #[must_use]
    pub fn computed(&self, name: &str) -> Option<&ComputedFn> {
        self.computed.get(name)
    }

    /// Names of all computed attributes.
    pub fn computed_names(&self) -> impl Iterator<Item = &str> {
        self.computed.keys().map(String::as_str)
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("ancestry", &self.ancestry)
            .field("containment", &self.containment)
            .finish_non_exhaustive()
    }
}

/// All node types known to the service.
///
/// Parents must be registered before their subtypes.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<NodeType>>,
    defs: Vec<TypeDef>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `def`, resolving it against its (already registered) parent.
    ///
    /// # Errors
    ///
    /// - [`ModelError::DuplicateType`] if the name is taken
    /// - [`ModelError::UnknownType`] if the parent is not registered yet
    pub fn register(&mut self, def: TypeDef) -> Result<Arc<NodeType>, ModelError> {
        if self.types.contains_key(&def.name) {
            return Err(ModelError::DuplicateType(def.name));
        }

        let parent = match &def.parent {
            Some(p) => Some(
                self.types
                    .get(p)
                    .cloned()
                    .ok_or_else(|| ModelError::UnknownType(p.clone()))?,
            ),
            None => None,
        };

        let mut ancestry = vec![def.name.clone()];
        let mut capabilities = BTreeSet::new();
        let mut markers = BTreeSet::new();
        let mut computed = BTreeMap::new();
        let mut containment = None;
        if let Some(parent) = &parent {
            ancestry.extend(parent.ancestry.iter().cloned());
            capabilities.extend(parent.capabilities.iter().cloned());
            markers.extend(parent.markers.iter().cloned());
            computed.extend(parent.computed.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
            containment = parent.containment.clone();
        }
        capabilities.extend(def.capabilities.iter().cloned());
        markers.extend(def.markers.iter().cloned());
        computed.extend(def.computed.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
        if let Some(rule) = &def.containment {
            containment = Some(rule.clone());
        }

        let node_type = Arc::new(NodeType {
            name: def.name.clone(),
            ancestry,
            capabilities,
            markers,
            containment,
            computed,
        });
        tracing::debug!(type_name = %def.name, parent = ?def.parent, "registered node type");
        self.types.insert(def.name.clone(), Arc::clone(&node_type));
        self.defs.push(def);
        Ok(node_type)
    }

    /// Registers every definition in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing definition.
    pub fn register_all(&mut self, defs: impl IntoIterator<Item = TypeDef>) -> Result<(), ModelError> {
        for def in defs {
            self.register(def)?;
        }
        Ok(())
    }

    /// Looks up a type.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownType`] if `name` was never registered.
    pub fn get(&self, name: &str) -> Result<Arc<NodeType>, ModelError> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Builds the permission registry from the registered declarations.
    ///
    /// # Errors
    ///
    /// Propagates [`RegistryError`] from resolution.
    pub fn permission_registry(&self, mode: CheckMode) -> Result<PermissionRegistry, RegistryError> {
        self.defs
            .iter()
            .fold(PermissionRegistry::builder(mode), |builder, def| {
                builder.declare(&def.name, def.parent.as_deref(), def.permissions.iter().cloned())
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types
            .register_all([
                TypeDef::new("Model")
                    .permission("name", "view")
                    .computed("kind", |n: &Node| json!(n.kind().name())),
                TypeDef::new("Container")
                    .extends("Model")
                    .container(Containment::Nothing)
                    .permission("listnames", "traverse"),
                TypeDef::new("Compute")
                    .extends("Model")
                    .capability("compute")
                    .marker("deployed")
                    .permission("architecture", "read"),
                TypeDef::new("Virtual")
                    .extends("Compute")
                    .marker("running"),
                TypeDef::new("Computes")
                    .extends("Container")
                    .container(Containment::Capability("compute".into())),
            ])
            .unwrap();
        types
    }

    #[test]
    fn ancestry_accumulates() {
        let types = registry();
        let virt = types.get("Virtual").unwrap();
        assert_eq!(virt.ancestry(), ["Virtual", "Compute", "Model"]);
        assert!(virt.is_a("Compute"));
        assert!(virt.provides("compute"));
        assert!(virt.markers().contains("deployed"));
        assert!(virt.markers().contains("running"));
        assert!(virt.computed("kind").is_some());
        assert!(!virt.is_a("Container"));
    }

    #[test]
    fn containment_inherited_and_overridden() {
        let types = registry();
        assert_eq!(
            types.get("Container").unwrap().containment(),
            Some(&Containment::Nothing)
        );
        assert_eq!(
            types.get("Computes").unwrap().containment(),
            Some(&Containment::Capability("compute".into()))
        );
        assert!(!types.get("Compute").unwrap().is_container());
    }

    #[test]
    fn parent_must_exist() {
        let mut types = TypeRegistry::new();
        let err = types
            .register(TypeDef::new("Orphan").extends("Missing"))
            .unwrap_err();
        assert_eq!(err, ModelError::UnknownType("Missing".into()));
    }

    #[test]
    fn duplicate_rejected() {
        let mut types = registry();
        let err = types.register(TypeDef::new("Model")).unwrap_err();
        assert_eq!(err, ModelError::DuplicateType("Model".into()));
    }

    #[test]
    fn filter_matching() {
        let types = registry();
        let computes = types.get("Computes").unwrap();
        assert!(TypeFilter::Any.matches(&computes));
        assert!(TypeFilter::kind("Container").matches(&computes));
        assert!(!TypeFilter::kind("Compute").matches(&computes));
        assert!(TypeFilter::capability("compute").matches(&types.get("Virtual").unwrap()));
    }

    #[test]
    fn permission_registry_follows_ancestry() {
        let types = registry();
        let perms = types.permission_registry(CheckMode::Enforcing).unwrap();
        assert!(perms.lookup("Virtual", "architecture").is_ok());
        assert!(perms.lookup("Virtual", "name").is_ok());
        assert!(perms.lookup("Virtual", "state").unwrap_err().is_undeclared());
        assert!(perms.lookup("Computes", "listnames").is_ok());
    }
}
