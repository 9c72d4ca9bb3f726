//! Roles and the principal/role store contract.
//!
//! Permissions reach a principal two ways:
//!
//! - **Granted** directly to the principal, valid everywhere
//! - Through a **role** bound to the principal on a specific node
//!
//! ```text
//! RoleStore trait (THIS MODULE)       ← abstract definition
//!          │
//!          └── DefaultRoleStore (oms-runtime)  ← concrete impl
//! ```
//!
//! The [`Role::OWNER`] role is special: at most one principal holds it on
//! a given node. The model layer keeps that invariant when changing
//! owners and reports violations found in the store.

use crate::Permission;
use oms_types::{NodeId, Principal, PrincipalId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// A named bundle of permissions bound per node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// The owner of a node.
    pub const OWNER: Role = Role(Cow::Borrowed("owner"));

    /// Creates a role from an arbitrary name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Store of direct grants and per-node role bindings.
///
/// Implementations must be thread-safe; every method takes `&self`.
///
/// # Scopes
///
/// [`has_permission`](Self::has_permission) receives the list of nodes
/// whose role bindings apply (the node itself, followed by its ancestors
/// for as long as permissions are inherited). Computing that list is the
/// caller's concern.
pub trait RoleStore: Send + Sync {
    /// Permissions granted to `principal` regardless of node.
    fn granted_permissions(&self, principal: &PrincipalId) -> BTreeSet<Permission>;

    /// Roles `principal` holds on `node`.
    fn roles_on(&self, node: NodeId, principal: &PrincipalId) -> Vec<Role>;

    /// Permissions a role confers.
    fn role_permissions(&self, role: &Role) -> BTreeSet<Permission>;

    /// Binds `role` to `principal` on `node`.
    fn assign_role(&self, node: NodeId, principal: &PrincipalId, role: Role);

    /// Unbinds `role` from `principal` on `node`.
    ///
    /// Returns `true` if the binding existed.
    fn unset_role(&self, node: NodeId, principal: &PrincipalId, role: &Role) -> bool;

    /// Principals holding `role` on `node`.
    fn principals_for_role(&self, node: NodeId, role: &Role) -> Vec<PrincipalId>;

    /// Makes `principal` the only holder of `role` on `node` (`None`
    /// leaves it unheld) and returns the previous holders.
    ///
    /// The default runs a read, unset and assign in sequence. Stores
    /// shared between threads should override it to swap under one lock.
    fn replace_role(
        &self,
        node: NodeId,
        role: &Role,
        principal: Option<&PrincipalId>,
    ) -> Vec<PrincipalId> {
        let previous = self.principals_for_role(node, role);
        for old in &previous {
            if Some(old) != principal {
                self.unset_role(node, old, role);
            }
        }
        if let Some(new) = principal {
            if !previous.contains(new) {
                self.assign_role(node, new, role.clone());
            }
        }
        previous
    }

    /// Returns `true` if `principal` holds `permission` directly or through
    /// a role on any of `scopes`.
    ///
    /// [`Principal::System`] holds every permission.
    fn has_permission(
        &self,
        principal: &Principal,
        scopes: &[NodeId],
        permission: &Permission,
    ) -> bool {
        let id = match principal {
            Principal::System => return true,
            Principal::User(id) => id,
        };

        if self.granted_permissions(id).contains(permission) {
            return true;
        }

        scopes.iter().any(|node| {
            self.roles_on(*node, id)
                .iter()
                .any(|role| self.role_permissions(role).contains(permission))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FixedStore {
        grants: HashMap<PrincipalId, BTreeSet<Permission>>,
        bindings: Mutex<Vec<(NodeId, PrincipalId, Role)>>,
    }

    impl RoleStore for FixedStore {
        fn granted_permissions(&self, principal: &PrincipalId) -> BTreeSet<Permission> {
            self.grants.get(principal).cloned().unwrap_or_default()
        }

        fn roles_on(&self, node: NodeId, principal: &PrincipalId) -> Vec<Role> {
            self.bindings
                .lock()
                .iter()
                .filter(|(n, p, _)| *n == node && p == principal)
                .map(|(_, _, r)| r.clone())
                .collect()
        }

        fn role_permissions(&self, role: &Role) -> BTreeSet<Permission> {
            if role == &Role::OWNER {
                [Permission::MODIFY].into_iter().collect()
            } else {
                BTreeSet::new()
            }
        }

        fn assign_role(&self, node: NodeId, principal: &PrincipalId, role: Role) {
            self.bindings.lock().push((node, principal.clone(), role));
        }

        fn unset_role(&self, node: NodeId, principal: &PrincipalId, role: &Role) -> bool {
            let mut b = self.bindings.lock();
            let before = b.len();
            b.retain(|(n, p, r)| !(*n == node && p == principal && r == role));
            b.len() != before
        }

        fn principals_for_role(&self, node: NodeId, role: &Role) -> Vec<PrincipalId> {
            self.bindings
                .lock()
                .iter()
                .filter(|(n, _, r)| *n == node && r == role)
                .map(|(_, p, _)| p.clone())
                .collect()
        }
    }

    #[test]
    fn system_holds_everything() {
        let store = FixedStore::default();
        assert!(store.has_permission(&Principal::System, &[], &Permission::NOTHING));
    }

    #[test]
    fn direct_grant() {
        let mut store = FixedStore::default();
        store.grants.insert(
            PrincipalId::new("user1"),
            [Permission::READ].into_iter().collect(),
        );
        assert!(store.has_permission(&Principal::user("user1"), &[], &Permission::READ));
        assert!(!store.has_permission(&Principal::user("user2"), &[], &Permission::READ));
    }

    #[test]
    fn role_applies_only_in_scope() {
        let store = FixedStore::default();
        let node = NodeId::new();
        let elsewhere = NodeId::new();
        let alice = PrincipalId::new("alice");
        store.assign_role(node, &alice, Role::OWNER);

        let p = Principal::User(alice.clone());
        assert!(store.has_permission(&p, &[node], &Permission::MODIFY));
        assert!(store.has_permission(&p, &[elsewhere, node], &Permission::MODIFY));
        assert!(!store.has_permission(&p, &[elsewhere], &Permission::MODIFY));

        assert!(store.unset_role(node, &alice, &Role::OWNER));
        assert!(!store.unset_role(node, &alice, &Role::OWNER));
        assert!(!store.has_permission(&p, &[node], &Permission::MODIFY));
    }

    #[test]
    fn replace_role_leaves_single_holder() {
        let store = FixedStore::default();
        let node = NodeId::new();
        let alice = PrincipalId::new("alice");
        let bob = PrincipalId::new("bob");
        store.assign_role(node, &alice, Role::OWNER);
        store.assign_role(node, &bob, Role::OWNER);

        let previous = store.replace_role(node, &Role::OWNER, Some(&bob));
        assert_eq!(previous, [alice, bob.clone()]);
        assert_eq!(store.principals_for_role(node, &Role::OWNER), [bob.clone()]);

        assert_eq!(store.replace_role(node, &Role::OWNER, None), [bob]);
        assert!(store.principals_for_role(node, &Role::OWNER).is_empty());
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::OWNER.to_string(), "owner");
        assert_eq!(Role::from("owner"), Role::OWNER);
    }
}
