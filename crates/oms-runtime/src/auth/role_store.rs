//! Default implementation of [`RoleStore`].
//!
//! Provides [`DefaultRoleStore`]: a thread-safe, in-memory store of
//! principal grants, role definitions and per-node role bindings.
//!
//! # Architecture
//!
//! ```text
//! RoleStore trait (oms-auth)          ← abstract definition
//!          │
//!          └── DefaultRoleStore (THIS MODULE)  ← concrete impl
//! ```
//!
//! # Default Roles
//!
//! [`DefaultRoleStore::with_defaults`] defines the `owner` role with every
//! built-in permission except `oms.admin`.

use oms_auth::{Permission, Role, RoleStore};
use oms_types::{NodeId, PrincipalId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Thread-safe, in-memory principal/role store.
///
/// # Thread Safety
///
/// Each table sits behind its own `RwLock`. Permission checks only take
/// read locks, so concurrent checks never block each other.
///
/// # Example
///
/// ```
/// use oms_auth::{Permission, Role, RoleStore};
/// use oms_runtime::DefaultRoleStore;
/// use oms_types::{NodeId, Principal, PrincipalId};
///
/// let store = DefaultRoleStore::with_defaults();
/// let alice = PrincipalId::new("alice");
/// let node = NodeId::new();
///
/// assert!(!store.has_permission(&Principal::User(alice.clone()), &[node], &Permission::READ));
///
/// store.assign_role(node, &alice, Role::OWNER);
/// assert!(store.has_permission(&Principal::User(alice), &[node], &Permission::READ));
/// ```
#[derive(Debug, Default)]
pub struct DefaultRoleStore {
    /// Node-independent grants.
    grants: RwLock<HashMap<PrincipalId, BTreeSet<Permission>>>,
    /// Permissions each role confers.
    roles: RwLock<HashMap<Role, BTreeSet<Permission>>>,
    /// Role bindings per node, in assignment order.
    bindings: RwLock<HashMap<NodeId, Vec<(PrincipalId, Role)>>>,
}

impl DefaultRoleStore {
    /// Creates an empty store with no roles defined.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the built-in `owner` role.
    #[must_use]
    pub fn with_defaults() -> Self {
        let store = Self::new();
        store.define_role(
            Role::OWNER,
            [
                Permission::VIEW,
                Permission::READ,
                Permission::TRAVERSE,
                Permission::ADD,
                Permission::MODIFY,
                Permission::DELETE,
                Permission::EXECUTE,
            ],
        );
        store
    }

    /// Grants `permission` to `principal` on every node.
    pub fn grant_permission(&self, principal: &PrincipalId, permission: Permission) {
        tracing::debug!(principal = %principal, %permission, "permission granted");
        self.grants
            .write()
            .entry(principal.clone())
            .or_default()
            .insert(permission);
    }

    /// Revokes a node-independent grant.
    ///
    /// Returns `true` if the grant existed.
    pub fn revoke_permission(&self, principal: &PrincipalId, permission: &Permission) -> bool {
        let mut grants = self.grants.write();
        let Some(set) = grants.get_mut(principal) else {
            return false;
        };
        let removed = set.remove(permission);
        if set.is_empty() {
            grants.remove(principal);
        }
        if removed {
            tracing::debug!(principal = %principal, %permission, "permission revoked");
        }
        removed
    }

    /// Defines (or redefines) what `role` confers.
    pub fn define_role(&self, role: Role, permissions: impl IntoIterator<Item = Permission>) {
        let permissions: BTreeSet<Permission> = permissions.into_iter().collect();
        tracing::debug!(role = %role, count = permissions.len(), "role defined");
        self.roles.write().insert(role, permissions);
    }

    /// Drops every binding on `node`.
    pub fn clear_node(&self, node: NodeId) {
        self.bindings.write().remove(&node);
    }

    /// Number of nodes carrying at least one binding.
    #[must_use]
    pub fn bound_node_count(&self) -> usize {
        self.bindings.read().len()
    }
}

impl RoleStore for DefaultRoleStore {
    fn granted_permissions(&self, principal: &PrincipalId) -> BTreeSet<Permission> {
        self.grants
            .read()
            .get(principal)
            .cloned()
            .unwrap_or_default()
    }

    fn roles_on(&self, node: NodeId, principal: &PrincipalId) -> Vec<Role> {
        self.bindings
            .read()
            .get(&node)
            .map(|b| {
                b.iter()
                    .filter(|(p, _)| p == principal)
                    .map(|(_, r)| r.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn role_permissions(&self, role: &Role) -> BTreeSet<Permission> {
        self.roles.read().get(role).cloned().unwrap_or_default()
    }

    fn assign_role(&self, node: NodeId, principal: &PrincipalId, role: Role) {
        let mut bindings = self.bindings.write();
        let entry = bindings.entry(node).or_default();
        if !entry.iter().any(|(p, r)| p == principal && *r == role) {
            entry.push((principal.clone(), role));
        }
    }

    fn unset_role(&self, node: NodeId, principal: &PrincipalId, role: &Role) -> bool {
        let mut bindings = self.bindings.write();
        let Some(entry) = bindings.get_mut(&node) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|(p, r)| !(p == principal && r == role));
        let removed = entry.len() != before;
        if entry.is_empty() {
            bindings.remove(&node);
        }
        removed
    }

    fn principals_for_role(&self, node: NodeId, role: &Role) -> Vec<PrincipalId> {
        self.bindings
            .read()
            .get(&node)
            .map(|b| {
                b.iter()
                    .filter(|(_, r)| r == role)
                    .map(|(p, _)| p.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn replace_role(
        &self,
        node: NodeId,
        role: &Role,
        principal: Option<&PrincipalId>,
    ) -> Vec<PrincipalId> {
        let mut bindings = self.bindings.write();
        let entry = bindings.entry(node).or_default();
        let previous: Vec<PrincipalId> = entry
            .iter()
            .filter(|(_, r)| r == role)
            .map(|(p, _)| p.clone())
            .collect();
        entry.retain(|(_, r)| r != role);
        if let Some(new) = principal {
            entry.push((new.clone(), role.clone()));
        }
        if entry.is_empty() {
            bindings.remove(&node);
        }
        previous
    }
}
