//! Attribute-level access checks.
//!
//! [`AccessChecker`] answers one question: may the principals bound to an
//! interaction read (or write) a named attribute of a node?
//!
//! ```text
//! check_read(node, "architecture", interaction)
//!     │
//!     ├─ lookup(node type, attribute)     ── missing ──► UndeclaredAttribute
//!     │
//!     ├─ scopes = node [+ ancestors while permissions are inherited]
//!     │
//!     └─ any principal holds permission?  ── no ──────► Unauthorized
//!                    │ yes
//!                    ▼
//!                   Ok
//! ```
//!
//! # Modes
//!
//! | Mode | Undeclared | Denied |
//! |------|------------|--------|
//! | [`CheckMode::Enforcing`] | error | error |
//! | [`CheckMode::Auditing`] | warn, allowed | warn, allowed |
//!
//! # Audit Logging
//!
//! - Allowed accesses: debug level
//! - Denied accesses: warn level

use oms_auth::{AccessError, CheckMode, Interaction, Permission, PermissionRegistry, RoleStore};
use oms_model::Node;
use oms_types::NodeId;
use std::fmt;
use std::sync::Arc;

/// Direction of an attribute access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reading the attribute (or calling a read-declared operation).
    Read,
    /// Writing the attribute (or calling a mutating operation).
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Checks attribute accesses against the permission registry and the
/// role store.
pub struct AccessChecker {
    permissions: Arc<PermissionRegistry>,
    roles: Arc<dyn RoleStore>,
}

impl AccessChecker {
    /// Creates a checker.
    #[must_use]
    pub fn new(permissions: Arc<PermissionRegistry>, roles: Arc<dyn RoleStore>) -> Self {
        Self { permissions, roles }
    }

    /// The registry's check mode.
    #[must_use]
    pub fn mode(&self) -> CheckMode {
        self.permissions.mode()
    }

    /// The permission registry consulted.
    #[must_use]
    pub fn permissions(&self) -> &Arc<PermissionRegistry> {
        &self.permissions
    }

    /// Checks a read of `attribute` on `node`.
    ///
    /// # Errors
    ///
    /// - [`AccessError::UndeclaredAttribute`] if the type does not declare it
    /// - [`AccessError::Unauthorized`] if no bound principal holds the read permission
    ///
    /// Neither is returned in [`CheckMode::Auditing`].
    pub fn check_read(
        &self,
        node: &Node,
        attribute: &str,
        interaction: &Interaction,
    ) -> Result<(), AccessError> {
        self.check(node, attribute, interaction, Access::Read)
    }

    /// Checks a write of `attribute` on `node`.
    ///
    /// Uses the declared write permission, falling back to the read one.
    ///
    /// # Errors
    ///
    /// Same as [`check_read`](Self::check_read).
    pub fn check_write(
        &self,
        node: &Node,
        attribute: &str,
        interaction: &Interaction,
    ) -> Result<(), AccessError> {
        self.check(node, attribute, interaction, Access::Write)
    }

    /// Nodes whose role bindings apply to `node`: the node itself, then
    /// its ancestors for as long as each link inherits permissions.
    #[must_use]
    pub fn scopes(node: &Node) -> Vec<NodeId> {
        let mut scopes = vec![node.id()];
        if !node.inherits_permissions() {
            return scopes;
        }
        for ancestor in node.ancestors() {
            scopes.push(ancestor.id());
            if !ancestor.inherits_permissions() {
                break;
            }
        }
        scopes
    }

    fn check(
        &self,
        node: &Node,
        attribute: &str,
        interaction: &Interaction,
        access: Access,
    ) -> Result<(), AccessError> {
        let type_name = node.type_name();
        let enforcing = self.mode().is_enforcing();

        let decl = match self.permissions.lookup(type_name, attribute) {
            Ok(decl) => decl,
            Err(e) => {
                tracing::warn!(
                    node = %node.id(),
                    type_name,
                    attribute,
                    %access,
                    enforcing,
                    "access to undeclared attribute"
                );
                return if enforcing { Err(e) } else { Ok(()) };
            }
        };

        let permission = match access {
            Access::Read => decl.read_permission(),
            Access::Write => decl.write_permission(),
        };

        let principals = interaction.principals();
        let scopes = Self::scopes(node);
        let allowed = principals
            .iter()
            .any(|p| self.roles.has_permission(p, &scopes, permission));

        if allowed {
            tracing::debug!(
                node = %node.id(),
                type_name,
                attribute,
                %access,
                %permission,
                "access allowed"
            );
            return Ok(());
        }

        let names: Vec<String> = principals.iter().map(|p| p.id().to_string()).collect();
        tracing::warn!(
            node = %node.id(),
            type_name,
            attribute,
            %access,
            %permission,
            principals = ?names,
            enforcing,
            "access denied"
        );
        if enforcing {
            Err(unauthorized(type_name, attribute, permission, names))
        } else {
            Ok(())
        }
    }
}

fn unauthorized(
    type_name: &str,
    attribute: &str,
    permission: &Permission,
    principals: Vec<String>,
) -> AccessError {
    AccessError::Unauthorized {
        type_name: type_name.to_string(),
        attribute: attribute.to_string(),
        permission: permission.clone(),
        principals,
    }
}

impl fmt::Debug for AccessChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessChecker")
            .field("mode", &self.mode())
            .field("types", &self.permissions.type_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DefaultRoleStore;
    use oms_auth::Role;
    use oms_model::{builtin, ContainerMut, Model, Node, NullSink, ProviderRegistry};
    use oms_types::{Principal, PrincipalId};
    use serde_json::json;

    struct Setup {
        checker: AccessChecker,
        roles: Arc<DefaultRoleStore>,
        types: oms_model::TypeRegistry,
    }

    fn setup(mode: CheckMode) -> Setup {
        let types = builtin::registry().unwrap();
        let permissions = Arc::new(types.permission_registry(mode).unwrap());
        let roles = Arc::new(DefaultRoleStore::with_defaults());
        Setup {
            checker: AccessChecker::new(permissions, Arc::clone(&roles) as Arc<dyn RoleStore>),
            roles,
            types,
        }
    }

    fn compute(types: &oms_model::TypeRegistry) -> Arc<Node> {
        Node::builder(types.get("Compute").unwrap())
            .attr("architecture", json!("linux"))
            .build()
    }

    #[test]
    fn direct_grant_allows_read() {
        let s = setup(CheckMode::Enforcing);
        s.roles.grant_permission(&PrincipalId::new("user1"), Permission::READ);
        let node = compute(&s.types);
        let user1 = Interaction::for_principal(Principal::user("user1"));

        assert!(s.checker.check_read(&node, "architecture", &user1).is_ok());
        // write falls back to read when undeclared
        assert!(s.checker.check_write(&node, "architecture", &user1).is_ok());
    }

    #[test]
    fn missing_permission_is_unauthorized() {
        let s = setup(CheckMode::Enforcing);
        s.roles
            .grant_permission(&PrincipalId::new("user2"), Permission::NOTHING);
        let node = compute(&s.types);
        let user2 = Interaction::for_principal(Principal::user("user2"));

        let err = s.checker.check_read(&node, "architecture", &user2).unwrap_err();
        assert_eq!(
            err,
            AccessError::Unauthorized {
                type_name: "Compute".into(),
                attribute: "architecture".into(),
                permission: Permission::READ,
                principals: vec!["user2".into()],
            }
        );
    }

    #[test]
    fn undeclared_wins_over_unauthorized() {
        let s = setup(CheckMode::Enforcing);
        let node = compute(&s.types);
        let nobody = Interaction::for_principal(Principal::user("nobody"));
        let err = s.checker.check_read(&node, "state", &nobody).unwrap_err();
        assert!(err.is_undeclared());
    }

    #[test]
    fn inactive_interaction_is_denied() {
        let s = setup(CheckMode::Enforcing);
        let node = compute(&s.types);
        let err = s
            .checker
            .check_read(&node, "architecture", &Interaction::new())
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn system_holds_everything() {
        let s = setup(CheckMode::Enforcing);
        let node = compute(&s.types);
        let system = Interaction::for_principal(Principal::System);
        assert!(s.checker.check_write(&node, "owner", &system).is_ok());
    }

    #[test]
    fn any_bound_principal_suffices() {
        let s = setup(CheckMode::Enforcing);
        s.roles.grant_permission(&PrincipalId::new("admin"), Permission::READ);
        let node = compute(&s.types);
        let interaction = Interaction::for_principal(Principal::user("guest"));
        assert!(s.checker.check_read(&node, "architecture", &interaction).is_err());

        let binding = interaction.enter(Principal::user("admin"));
        assert!(s.checker.check_read(&node, "architecture", &interaction).is_ok());
        interaction.exit(binding).unwrap();
        assert!(s.checker.check_read(&node, "architecture", &interaction).is_err());
    }

    #[test]
    fn write_uses_write_permission() {
        let s = setup(CheckMode::Enforcing);
        let alice = PrincipalId::new("alice");
        s.roles.grant_permission(&alice, Permission::VIEW);
        let node = compute(&s.types);
        let interaction = Interaction::for_principal(Principal::User(alice.clone()));

        assert!(s.checker.check_read(&node, "hostname", &interaction).is_ok());
        assert!(s.checker.check_write(&node, "hostname", &interaction).is_err());

        s.roles.grant_permission(&alice, Permission::MODIFY);
        assert!(s.checker.check_write(&node, "hostname", &interaction).is_ok());
    }

    #[test]
    fn owner_role_on_node() {
        let s = setup(CheckMode::Enforcing);
        let node = compute(&s.types);
        let bob = PrincipalId::new("bob");
        let interaction = Interaction::for_principal(Principal::User(bob.clone()));
        assert!(s.checker.check_read(&node, "architecture", &interaction).is_err());

        s.roles.assign_role(node.id(), &bob, Role::OWNER);
        assert!(s.checker.check_read(&node, "architecture", &interaction).is_ok());
    }

    #[test]
    fn scopes_follow_inheritance() {
        let s = setup(CheckMode::Enforcing);
        let root = Node::new(s.types.get("Folder").unwrap());
        let mid = Node::builder(s.types.get("Folder").unwrap())
            .inherit_permissions(true)
            .build();
        let leaf = Node::builder(s.types.get("Compute").unwrap())
            .inherit_permissions(true)
            .build();
        let model = Model::new(
            Arc::new(builtin::registry().unwrap()),
            Arc::new(ProviderRegistry::new()),
            Arc::clone(&s.roles) as Arc<dyn RoleStore>,
            Arc::new(NullSink),
        );
        model.container(&root).unwrap().add(Arc::clone(&mid)).unwrap();
        model.container(&mid).unwrap().add(Arc::clone(&leaf)).unwrap();

        assert_eq!(
            AccessChecker::scopes(&leaf),
            vec![leaf.id(), mid.id(), root.id()]
        );
        assert_eq!(AccessChecker::scopes(&mid), vec![mid.id(), root.id()]);
        assert_eq!(AccessChecker::scopes(&root), vec![root.id()]);

        mid.set_inherit_permissions(false);
        assert_eq!(AccessChecker::scopes(&leaf), vec![leaf.id(), mid.id()]);
    }

    #[test]
    fn auditing_allows_and_logs() {
        let s = setup(CheckMode::Auditing);
        let node = compute(&s.types);
        let nobody = Interaction::for_principal(Principal::user("nobody"));
        assert!(s.checker.check_read(&node, "architecture", &nobody).is_ok());
        assert!(s.checker.check_read(&node, "state", &nobody).is_ok());
        assert_eq!(s.checker.mode(), CheckMode::Auditing);
    }
}
