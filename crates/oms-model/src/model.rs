//! The model handle: types, providers, roles and events in one place.
//!
//! [`Model`] is cheap to clone (every field is an `Arc`) and is what the
//! runtime hands to anything that creates nodes, composes containers or
//! changes ownership.

use crate::compose::{Composition, CompositionEngine, ProviderRegistry};
use crate::container::Container;
use crate::event::{EventSink, ModelEvent};
use crate::schema::TypeRegistry;
use crate::{ModelError, Node, NodeRef};
use oms_auth::{Role, RoleStore};
use oms_types::PrincipalId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Shared context of the object model.
#[derive(Clone)]
pub struct Model {
    types: Arc<TypeRegistry>,
    providers: Arc<ProviderRegistry>,
    roles: Arc<dyn RoleStore>,
    events: Arc<dyn EventSink>,
    owner_lock: Arc<Mutex<()>>,
}

impl Model {
    /// Assembles a model.
    #[must_use]
    pub fn new(
        types: Arc<TypeRegistry>,
        providers: Arc<ProviderRegistry>,
        roles: Arc<dyn RoleStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            types,
            providers,
            roles,
            events,
            owner_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Registered node types.
    #[must_use]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Registered providers.
    #[must_use]
    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    /// Principal/role store.
    #[must_use]
    pub fn roles(&self) -> &Arc<dyn RoleStore> {
        &self.roles
    }

    /// Event sink.
    #[must_use]
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Composition engine over the registered providers.
    #[must_use]
    pub fn engine(&self) -> CompositionEngine {
        CompositionEngine::new(Arc::clone(&self.providers))
    }

    /// Creates a detached, unnamed node of the registered type `type_name`.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownType`] if the type is not registered.
    pub fn create(&self, type_name: &str) -> Result<NodeRef, ModelError> {
        Ok(Node::new(self.types.get(type_name)?))
    }

    /// Creates a detached node with an explicit name.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownType`] if the type is not registered.
    pub fn create_named(&self, type_name: &str, name: impl Into<String>) -> Result<NodeRef, ModelError> {
        Ok(Node::named(self.types.get(type_name)?, name))
    }

    /// Container handle over `node`.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotAContainer`] for leaf nodes.
    pub fn container(&self, node: &NodeRef) -> Result<Container, ModelError> {
        Container::new(Arc::clone(node), self.engine(), Arc::clone(&self.events))
    }

    /// Composes `node`'s visible children.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotAContainer`] for leaf nodes.
    pub fn compose(&self, node: &NodeRef) -> Result<Composition, ModelError> {
        self.engine().compose(node)
    }

    /// Current owner of `node`, as recorded in the role store.
    ///
    /// # Errors
    ///
    /// [`ModelError::OwnerInvariant`] if more than one principal holds the
    /// owner role. The violation is also logged at error level.
    pub fn owner(&self, node: &Node) -> Result<Option<PrincipalId>, ModelError> {
        let mut owners = self.roles.principals_for_role(node.id(), &Role::OWNER);
        match owners.len() {
            0 => Ok(None),
            1 => Ok(owners.pop()),
            n => {
                tracing::error!(node = %node.id(), owners = n, ?owners, "owner invariant violated");
                Err(ModelError::OwnerInvariant {
                    node: node.id(),
                    owners,
                })
            }
        }
    }

    /// Makes `principal` the sole owner of `node` (`None` clears it).
    ///
    /// Every previous owner binding is removed in the same store update,
    /// which also repairs a node found with several owners. Concurrent
    /// calls through clones of this model are serialized so the node's
    /// owner mirror matches the store. `OwnerChanged` is published only
    /// if the owner actually changed.
    pub fn set_owner(&self, node: &Node, principal: Option<PrincipalId>) {
        let _guard = self.owner_lock.lock();
        let previous = self
            .roles
            .replace_role(node.id(), &Role::OWNER, principal.as_ref());
        node.set_owner_mirror(principal.clone());

        if previous.len() > 1 {
            tracing::error!(node = %node.id(), ?previous, "repaired multiple owners");
        }
        let unchanged = match (&principal, previous.as_slice()) {
            (None, []) => true,
            (Some(new), [old]) => new == old,
            _ => false,
        };
        if unchanged {
            return;
        }

        tracing::debug!(node = %node.id(), old = ?previous.first(), new = ?principal, "owner changed");
        self.events.publish(ModelEvent::OwnerChanged {
            node: node.id(),
            old: previous.into_iter().next(),
            new: principal,
        });
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("types", &self.types.len())
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}
