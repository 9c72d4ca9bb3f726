//! Permission registry: per-type permission tables resolved by ancestry.
//!
//! Every node type declares a table `attribute → PermissionDecl`. At
//! startup the declarations are collected with a
//! [`PermissionRegistryBuilder`] and resolved once: each concrete type's
//! table is the union of its ancestors' tables, with entries declared
//! closer to the type overriding ancestor entries of the same name.
//!
//! ```text
//! Model            { name: view }
//!   └─ Container   { listnames: traverse, getitem: traverse, add: add, ... }
//!        └─ Proc   { listnames: view }          ◄ overrides Container's entry
//!
//! resolved(Proc) = { name: view, listnames: view, getitem: traverse, add: add, ... }
//! ```
//!
//! The registry also carries the [`CheckMode`] selected by configuration.

use crate::{AccessError, PermissionDecl, RegistryError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// How the access checker treats would-be denials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// Denials are errors; undeclared attributes are rejected.
    #[default]
    Enforcing,
    /// Denials are logged and the access is allowed.
    ///
    /// Meant for migrating types whose tables are still incomplete.
    Auditing,
}

impl CheckMode {
    /// Maps the "enforce attribute rights definition" flag to a mode.
    #[must_use]
    pub fn from_enforce_flag(enforce: bool) -> Self {
        if enforce {
            Self::Enforcing
        } else {
            Self::Auditing
        }
    }

    /// Returns `true` for [`CheckMode::Enforcing`].
    #[must_use]
    pub fn is_enforcing(self) -> bool {
        matches!(self, Self::Enforcing)
    }
}

/// Resolved permission table of one concrete type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionTable {
    entries: BTreeMap<String, PermissionDecl>,
}

impl PermissionTable {
    /// Returns the declaration for `attribute`, if any.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&PermissionDecl> {
        self.entries.get(attribute)
    }

    /// Returns `true` if `attribute` is declared.
    #[must_use]
    pub fn contains(&self, attribute: &str) -> bool {
        self.entries.contains_key(attribute)
    }

    /// Iterates over declared attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PermissionDecl)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of declared attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Declaration {
    parent: Option<String>,
    entries: Vec<(String, PermissionDecl)>,
}

/// Collects per-type declarations before resolution.
///
/// # Example
///
/// ```
/// use oms_auth::{CheckMode, Permission, PermissionDecl, PermissionRegistry};
///
/// let registry = PermissionRegistry::builder(CheckMode::Enforcing)
///     .declare("Model", None, [("name", PermissionDecl::from(Permission::VIEW))])
///     .declare("Compute", Some("Model"), [("architecture", PermissionDecl::from("read"))])
///     .build()
///     .unwrap();
///
/// let table = registry.table("Compute").unwrap();
/// assert!(table.contains("name"));
/// assert!(table.contains("architecture"));
/// assert!(!table.contains("state"));
/// ```
pub struct PermissionRegistryBuilder {
    mode: CheckMode,
    declared: HashMap<String, Declaration>,
    order: Vec<String>,
    duplicate: Option<String>,
}

impl PermissionRegistryBuilder {
    /// Declares the table of `type_name`, extending `parent`.
    ///
    /// Declaration order does not matter; parents are resolved in
    /// [`build`](Self::build).
    #[must_use]
    pub fn declare<I, K>(mut self, type_name: &str, parent: Option<&str>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, PermissionDecl)>,
        K: Into<String>,
    {
        if self.declared.contains_key(type_name) {
            self.duplicate.get_or_insert_with(|| type_name.to_string());
            return self;
        }
        self.declared.insert(
            type_name.to_string(),
            Declaration {
                parent: parent.map(str::to_string),
                entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            },
        );
        self.order.push(type_name.to_string());
        self
    }

    /// Resolves every declared type's table.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::DuplicateType`] if a type was declared twice
    /// - [`RegistryError::UnknownParent`] if a parent was never declared
    /// - [`RegistryError::Cycle`] if an ancestry loops
    pub fn build(self) -> Result<PermissionRegistry, RegistryError> {
        if let Some(dup) = self.duplicate {
            return Err(RegistryError::DuplicateType(dup));
        }

        let mut tables = HashMap::with_capacity(self.declared.len());
        for type_name in &self.order {
            let chain = self.ancestry(type_name)?;
            let mut entries = BTreeMap::new();
            // root first, so descendants override
            for ancestor in chain.iter().rev() {
                if let Some(decl) = self.declared.get(ancestor) {
                    for (attr, perm) in &decl.entries {
                        entries.insert(attr.clone(), perm.clone());
                    }
                }
            }
            tracing::trace!(type_name = %type_name, attributes = entries.len(), "resolved permission table");
            tables.insert(type_name.clone(), Arc::new(PermissionTable { entries }));
        }

        Ok(PermissionRegistry {
            mode: self.mode,
            tables,
        })
    }

    /// Returns `[type, parent, grandparent, ...]`.
    fn ancestry(&self, type_name: &str) -> Result<Vec<String>, RegistryError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(type_name.to_string());

        while let Some(name) = current {
            if !seen.insert(name.clone()) {
                return Err(RegistryError::Cycle(name));
            }
            let decl = self
                .declared
                .get(&name)
                .ok_or_else(|| RegistryError::UnknownParent {
                    type_name: chain.last().cloned().unwrap_or_else(|| name.clone()),
                    parent: name.clone(),
                })?;
            current = decl.parent.clone();
            chain.push(name);
        }

        Ok(chain)
    }
}

/// Resolved permission tables for all registered types.
///
/// Built once at startup and shared immutably (`Arc<PermissionRegistry>`)
/// by every checker.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    mode: CheckMode,
    tables: HashMap<String, Arc<PermissionTable>>,
}

impl PermissionRegistry {
    /// Starts collecting declarations for a registry in `mode`.
    #[must_use]
    pub fn builder(mode: CheckMode) -> PermissionRegistryBuilder {
        PermissionRegistryBuilder {
            mode,
            declared: HashMap::new(),
            order: Vec::new(),
            duplicate: None,
        }
    }

    /// The configured check mode.
    #[must_use]
    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    /// Resolved table of `type_name`.
    #[must_use]
    pub fn table(&self, type_name: &str) -> Option<&Arc<PermissionTable>> {
        self.tables.get(type_name)
    }

    /// Looks up the declaration guarding `type_name.attribute`.
    ///
    /// # Errors
    ///
    /// [`AccessError::UndeclaredAttribute`] if the type is unknown or the
    /// attribute is absent from its resolved table.
    pub fn lookup(&self, type_name: &str, attribute: &str) -> Result<&PermissionDecl, AccessError> {
        self.tables
            .get(type_name)
            .and_then(|t| t.get(attribute))
            .ok_or_else(|| AccessError::UndeclaredAttribute {
                type_name: type_name.to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// Number of registered types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Permission;

    fn decl(p: &str) -> PermissionDecl {
        PermissionDecl::from(p)
    }

    #[test]
    fn child_overrides_ancestor() {
        let reg = PermissionRegistry::builder(CheckMode::Enforcing)
            .declare("Container", Some("Model"), [("listnames", decl("traverse"))])
            .declare("Model", None, [("name", decl("view"))])
            .declare("Proc", Some("Container"), [("listnames", decl("view"))])
            .build()
            .unwrap();

        let proc_table = reg.table("Proc").unwrap();
        assert_eq!(
            proc_table.get("listnames").unwrap().read_permission(),
            &Permission::VIEW
        );
        assert!(proc_table.contains("name"));

        let container = reg.table("Container").unwrap();
        assert_eq!(
            container.get("listnames").unwrap().read_permission(),
            &Permission::TRAVERSE
        );
    }

    #[test]
    fn lookup_undeclared() {
        let reg = PermissionRegistry::builder(CheckMode::Enforcing)
            .declare("Model", None, [("name", decl("view"))])
            .build()
            .unwrap();

        let err = reg.lookup("Model", "state").unwrap_err();
        assert!(err.is_undeclared());
        let err = reg.lookup("Missing", "name").unwrap_err();
        assert!(err.is_undeclared());
        assert!(reg.lookup("Model", "name").is_ok());
    }

    #[test]
    fn unknown_parent_rejected() {
        let err = PermissionRegistry::builder(CheckMode::Enforcing)
            .declare("Compute", Some("Model"), [("architecture", decl("read"))])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownParent {
                type_name: "Compute".into(),
                parent: "Model".into(),
            }
        );
    }

    #[test]
    fn cycle_rejected() {
        let err = PermissionRegistry::builder(CheckMode::Enforcing)
            .declare("A", Some("B"), Vec::<(String, PermissionDecl)>::new())
            .declare("B", Some("A"), Vec::<(String, PermissionDecl)>::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::Cycle(_)));
    }

    #[test]
    fn duplicate_rejected() {
        let err = PermissionRegistry::builder(CheckMode::Auditing)
            .declare("A", None, [("x", decl("view"))])
            .declare("A", None, [("y", decl("view"))])
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateType("A".into()));
    }

    #[test]
    fn mode_from_flag() {
        assert_eq!(CheckMode::from_enforce_flag(true), CheckMode::Enforcing);
        assert_eq!(CheckMode::from_enforce_flag(false), CheckMode::Auditing);
        assert!(CheckMode::default().is_enforcing());
    }
}
