//! Secure proxies over model nodes.
//!
//! A [`SecureNode`] pairs a node with the [`Interaction`] it is accessed
//! under. Every attribute read or write and every container operation
//! passes through the [`AccessChecker`] before reaching the node.
//!
//! ```text
//! caller ──► SecureNode ──check──► AccessChecker
//!                │                     │ ok
//!                └──────── op ─────────┴──► Node / Container
//!                                             │
//!            children come back wrapped ◄─────┘
//!            with the same interaction
//! ```
//!
//! # Container Operations
//!
//! | Operation | Checked as | Access |
//! |-----------|------------|--------|
//! | `get` | `getitem` | read |
//! | `list_names` | `listnames` | read |
//! | `list_content` | `listcontent` | read |
//! | `iter` | `iter` | read |
//! | `can_contain` | `can_contain` | read |
//! | `add` | `add` | write |
//! | `rename` | `rename` | write |
//! | `remove` | `remove` | write |
//!
//! # Re-wrapping
//!
//! Proxies never nest. [`ProxyFactory::rewrap`] returns a proxy unchanged
//! when it already carries the requested interaction, and otherwise binds
//! the underlying node to the new one.

use super::{AccessChecker, SecurityError};
use oms_auth::Interaction;
use oms_model::{
    ActionTable, Container, ContainerCore, ContainerMut, Model, Node, NodeRef,
};
use oms_types::{NodeId, PrincipalId};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Creates [`SecureNode`]s bound to an interaction.
#[derive(Clone)]
pub struct ProxyFactory {
    checker: Arc<AccessChecker>,
    model: Model,
    actions: Arc<ActionTable>,
}

impl ProxyFactory {
    /// Creates a factory.
    #[must_use]
    pub fn new(checker: Arc<AccessChecker>, model: Model, actions: Arc<ActionTable>) -> Self {
        Self {
            checker,
            model,
            actions,
        }
    }

    /// The checker every proxy consults.
    #[must_use]
    pub fn checker(&self) -> &Arc<AccessChecker> {
        &self.checker
    }

    /// Wraps `node` for access under `interaction`.
    #[must_use]
    pub fn wrap(&self, node: NodeRef, interaction: &Arc<Interaction>) -> SecureNode {
        SecureNode {
            node,
            interaction: Arc::clone(interaction),
            factory: self.clone(),
        }
    }

    /// Re-wraps an existing proxy.
    ///
    /// Returns `proxy` itself if it is already bound to `interaction`;
    /// otherwise a proxy over the same node bound to `interaction`.
    #[must_use]
    pub fn rewrap(&self, proxy: SecureNode, interaction: &Arc<Interaction>) -> SecureNode {
        if Arc::ptr_eq(&proxy.interaction, interaction) {
            return proxy;
        }
        self.wrap(proxy.node, interaction)
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("checker", &self.checker)
            .finish_non_exhaustive()
    }
}

/// A node accessed under an interaction.
#[derive(Clone)]
pub struct SecureNode {
    node: NodeRef,
    interaction: Arc<Interaction>,
    factory: ProxyFactory,
}

impl SecureNode {
    /// Identity of the underlying node. Not access-checked.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// Type name of the underlying node. Not access-checked.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.node.type_name()
    }

    /// Returns `true` if the underlying node is a container.
    #[must_use]
    pub fn is_container(&self) -> bool {
        self.node.is_container()
    }

    /// The interaction this proxy checks against.
    #[must_use]
    pub fn interaction(&self) -> &Arc<Interaction> {
        &self.interaction
    }

    /// The unprotected node.
    ///
    /// Trusted code only: anything done through the returned reference
    /// bypasses the checker.
    #[must_use]
    pub fn unwrap_node(&self) -> &NodeRef {
        &self.node
    }

    fn checker(&self) -> &AccessChecker {
        &self.factory.checker
    }

    fn check_read(&self, attribute: &str) -> Result<(), SecurityError> {
        self.checker()
            .check_read(&self.node, attribute, &self.interaction)?;
        Ok(())
    }

    fn check_write(&self, attribute: &str) -> Result<(), SecurityError> {
        self.checker()
            .check_write(&self.node, attribute, &self.interaction)?;
        Ok(())
    }

    fn wrap_child(&self, child: NodeRef) -> SecureNode {
        self.factory.wrap(child, &self.interaction)
    }

    fn container(&self) -> Result<Container, SecurityError> {
        Ok(self.factory.model.container(&self.node)?)
    }

    /// Reads an attribute.
    ///
    /// # Errors
    ///
    /// Access denial, or [`ModelError::UnknownAttribute`](oms_model::ModelError::UnknownAttribute)
    /// if the node has no value for a declared name.
    pub fn get_attr(&self, name: &str) -> Result<Value, SecurityError> {
        self.check_read(name)?;
        Ok(self.node.get_attr(name)?)
    }

    /// Writes an attribute.
    ///
    /// # Errors
    ///
    /// Access denial, or the model's rejection of the value.
    pub fn set_attr(&self, name: &str, value: Value) -> Result<(), SecurityError> {
        self.check_write(name)?;
        Ok(self.node.set_attr(name, value)?)
    }

    /// The node's display name, checked as `name`.
    ///
    /// # Errors
    ///
    /// Access denial.
    pub fn name(&self) -> Result<Option<String>, SecurityError> {
        self.check_read("name")?;
        Ok(self.node.name())
    }

    /// Nickname (computed `nickname`, else the name), checked as `nickname`.
    ///
    /// # Errors
    ///
    /// Access denial.
    pub fn nickname(&self) -> Result<Option<String>, SecurityError> {
        self.check_read("nickname")?;
        Ok(self.node.nickname())
    }

    /// Feature tags, checked as a read of `features`.
    ///
    /// # Errors
    ///
    /// Access denial.
    pub fn features(&self) -> Result<Vec<String>, SecurityError> {
        self.check_read("features")?;
        Ok(self.node.features().into_iter().collect())
    }

    /// Updates feature tags, checked as a write of `features`.
    ///
    /// # Errors
    ///
    /// Access denial, or the model's rejection of the update.
    pub fn set_features<I, S>(&self, values: I) -> Result<(), SecurityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.check_write("features")?;
        Ok(self.node.set_features(values)?)
    }

    /// Current owner, checked as a read of `owner`.
    ///
    /// # Errors
    ///
    /// Access denial, or [`ModelError::OwnerInvariant`](oms_model::ModelError::OwnerInvariant).
    pub fn owner(&self) -> Result<Option<PrincipalId>, SecurityError> {
        self.check_read("owner")?;
        Ok(self.factory.model.owner(&self.node)?)
    }

    /// Changes the owner, checked as a write of `owner`.
    ///
    /// # Errors
    ///
    /// Access denial.
    pub fn set_owner(&self, principal: Option<PrincipalId>) -> Result<(), SecurityError> {
        self.check_write("owner")?;
        self.factory.model.set_owner(&self.node, principal);
        Ok(())
    }

    /// Runs the action `action` on the node, checked as `execute`.
    ///
    /// # Errors
    ///
    /// Access denial, [`ModelError::NotFound`](oms_model::ModelError::NotFound)
    /// for an unknown action, or the handler's own error.
    pub fn execute(&self, action: &str, args: &Value) -> Result<Value, SecurityError> {
        self.check_read("execute")?;
        tracing::info!(
            node = %self.node.id(),
            action,
            principals = ?self.interaction.principals(),
            "executing action"
        );
        Ok(self.factory.actions.invoke(&self.node, action, args)?)
    }

    /// Walks a slash-separated path of child names, e.g. `proc/completed`.
    ///
    /// Every step is a checked `getitem`. Empty segments and `.` are
    /// skipped.
    ///
    /// # Errors
    ///
    /// The first failing step's error.
    pub fn traverse(&self, path: &str) -> Result<SecureNode, SecurityError> {
        let mut current = self.clone();
        for step in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            current = current.get(step)?;
        }
        Ok(current)
    }
}

impl ContainerCore for SecureNode {
    type Item = SecureNode;
    type Error = SecurityError;

    fn get(&self, name: &str) -> Result<SecureNode, SecurityError> {
        self.check_read("getitem")?;
        let child = self.container()?.get(name)?;
        Ok(self.wrap_child(child))
    }

    fn list_names(&self) -> Result<Vec<String>, SecurityError> {
        self.check_read("listnames")?;
        Ok(self.container()?.list_names()?)
    }

    fn list_content(&self) -> Result<Vec<SecureNode>, SecurityError> {
        self.check_read("listcontent")?;
        Ok(self
            .container()?
            .list_content()?
            .into_iter()
            .map(|c| self.wrap_child(c))
            .collect())
    }

    fn iter(&self) -> Result<std::vec::IntoIter<(String, SecureNode)>, SecurityError> {
        self.check_read("iter")?;
        let items: Vec<_> = self
            .container()?
            .iter()?
            .map(|(name, c)| (name, self.wrap_child(c)))
            .collect();
        Ok(items.into_iter())
    }
}

impl ContainerMut for SecureNode {
    fn can_contain(&self, candidate: &Node) -> Result<bool, SecurityError> {
        self.check_read("can_contain")?;
        Ok(self.container()?.can_contain(candidate)?)
    }

    fn add(&self, item: NodeRef) -> Result<String, SecurityError> {
        self.check_write("add")?;
        Ok(self.container()?.add(item)?)
    }

    fn rename(&self, old: &str, new: &str) -> Result<(), SecurityError> {
        self.check_write("rename")?;
        Ok(self.container()?.rename(old, new)?)
    }

    fn remove(&self, name: &str) -> Result<SecureNode, SecurityError> {
        self.check_write("remove")?;
        let removed = self.container()?.remove(name)?;
        Ok(self.wrap_child(removed))
    }
}

impl fmt::Debug for SecureNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureNode")
            .field("node", &self.node.id())
            .field("type", &self.node.type_name())
            .field("principals", &self.interaction.principals())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DefaultRoleStore;
    use oms_auth::{CheckMode, Permission, RoleStore};
    use oms_model::{builtin, NullSink, ProviderRegistry};
    use oms_types::Principal;
    use serde_json::json;

    fn factory() -> (ProxyFactory, Arc<DefaultRoleStore>) {
        let types = Arc::new(builtin::registry().unwrap());
        let permissions = Arc::new(types.permission_registry(CheckMode::Enforcing).unwrap());
        let roles = Arc::new(DefaultRoleStore::with_defaults());
        let roles_dyn: Arc<dyn RoleStore> = Arc::clone(&roles) as Arc<dyn RoleStore>;
        let model = Model::new(
            types,
            Arc::new(ProviderRegistry::new()),
            Arc::clone(&roles_dyn),
            Arc::new(NullSink),
        );
        let checker = Arc::new(AccessChecker::new(permissions, roles_dyn));
        (
            ProxyFactory::new(checker, model, Arc::new(ActionTable::new())),
            roles,
        )
    }

    #[test]
    fn rewrap_same_interaction_is_identity() {
        let (factory, _) = factory();
        let node = factory.model.create("Folder").unwrap();
        let a = Arc::new(Interaction::for_principal(Principal::user("a")));
        let b = Arc::new(Interaction::for_principal(Principal::user("b")));

        let proxy = factory.wrap(Arc::clone(&node), &a);
        let same = factory.rewrap(proxy.clone(), &a);
        assert!(Arc::ptr_eq(same.interaction(), &a));

        let rebound = factory.rewrap(proxy, &b);
        assert!(Arc::ptr_eq(rebound.interaction(), &b));
        assert!(Arc::ptr_eq(rebound.unwrap_node(), &node));
    }

    #[test]
    fn attribute_write_checked() {
        let (factory, roles) = factory();
        let vm = factory.model.create("Compute").unwrap();
        let user = PrincipalId::new("op");
        roles.grant_permission(&user, Permission::VIEW);
        let interaction = Arc::new(Interaction::for_principal(Principal::User(user.clone())));
        let proxy = factory.wrap(Arc::clone(&vm), &interaction);

        let err = proxy.set_attr("hostname", json!("tux")).unwrap_err();
        assert!(err.is_unauthorized());
        assert!(vm.attr("hostname").is_none());

        roles.grant_permission(&user, Permission::MODIFY);
        proxy.set_attr("hostname", json!("tux")).unwrap();
        assert_eq!(proxy.get_attr("hostname").unwrap(), json!("tux"));
    }

    #[test]
    fn children_inherit_interaction() {
        let (factory, roles) = factory();
        let root = factory.model.create("Root").unwrap();
        let child = factory.model.create_named("Folder", "child").unwrap();
        factory
            .model
            .container(&root)
            .unwrap()
            .add(child)
            .unwrap();

        let user = PrincipalId::new("walker");
        roles.grant_permission(&user, Permission::TRAVERSE);
        let interaction = Arc::new(Interaction::for_principal(Principal::User(user)));
        let proxy = factory.wrap(root, &interaction);

        let got = proxy.get("child").unwrap();
        assert!(Arc::ptr_eq(got.interaction(), &interaction));
        assert_eq!(proxy.list_names().unwrap(), ["child"]);

        // traversal is allowed but reading the name needs view
        assert!(got.name().unwrap_err().is_unauthorized());
    }

    #[test]
    fn container_mutations_need_their_permissions() {
        let (factory, roles) = factory();
        let root = factory.model.create("Root").unwrap();
        let user = PrincipalId::new("u");
        let interaction = Arc::new(Interaction::for_principal(Principal::User(user.clone())));
        let proxy = factory.wrap(Arc::clone(&root), &interaction);

        let item = factory.model.create_named("Folder", "x").unwrap();
        assert!(proxy.add(Arc::clone(&item)).unwrap_err().is_unauthorized());

        roles.grant_permission(&user, Permission::ADD);
        assert_eq!(proxy.add(item).unwrap(), "x");
        assert!(proxy.rename("x", "y").unwrap_err().is_unauthorized());
        assert!(proxy.remove("x").unwrap_err().is_unauthorized());

        roles.grant_permission(&user, Permission::DELETE);
        let removed = proxy.remove("x").unwrap();
        assert!(removed.unwrap_node().parent().is_none());
    }

    #[test]
    fn leaf_has_no_container_ops() {
        let (factory, _) = factory();
        let vm = factory.model.create("Compute").unwrap();
        let system = Arc::new(Interaction::for_principal(Principal::System));
        let proxy = factory.wrap(vm, &system);

        // Compute does not declare getitem
        assert!(proxy.get("x").unwrap_err().is_undeclared());
        assert!(proxy.traverse("").is_ok());
    }
}
