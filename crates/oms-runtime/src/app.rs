//! Runtime assembly.
//!
//! [`OmsBuilder`] performs startup registration in a fixed order; there
//! is no runtime discovery of types or providers.
//!
//! ```text
//! before init ─► types (built-in + extra)
//!             ─► permission registry (check mode from config)
//!             ─► role store, event bus, model
//!             ─► providers (extra injectors/extenders, in order)
//!             ─► actions + actions extender
//!             ─► tree: /computes, /proc (+ init task)
//!             ─► checker, proxy factory
//! after init  ─► Oms
//! ```
//!
//! # Tree Layout
//!
//! ```text
//! /                 (Root)
//! ├── computes      (Computes)
//! └── proc          (Proc)
//!     ├── 1         (Task, init)
//!     └── completed (CompletedProc, transient)
//! ```

use crate::auth::DefaultRoleStore;
use crate::config::OmsConfig;
use crate::engine::EventBus;
use crate::error::OmsError;
use crate::security::{AccessChecker, ProxyFactory, SecureNode};
use crate::store::{CommitReport, ObjectStore, StoreError};
use oms_auth::{Interaction, PermissionRegistry, RoleStore};
use oms_model::builtin::{self, COMPUTES_TYPE, COMPUTE_TYPE, ROOT_TYPE};
use oms_model::{
    ActionHandler, ActionTable, ContainerMut, EventSink, Extender, Injector, Model, ModelError,
    NodeRef, ProcessRegistry, ProviderRegistry, TypeDef, TypeFilter, TypeRegistry,
};
use oms_types::Principal;
use serde_json::{json, Value};
use std::sync::Arc;

/// Name of the compute container under the root.
pub const COMPUTES: &str = "computes";

/// Deferred provider registration, replayed in order once the registry exists.
type Registration = Box<dyn FnOnce(&ProviderRegistry) + Send>;

/// An assembled OMS runtime.
pub struct Oms {
    config: OmsConfig,
    model: Model,
    permissions: Arc<PermissionRegistry>,
    roles: Arc<DefaultRoleStore>,
    events: Arc<EventBus>,
    actions: Arc<ActionTable>,
    procs: Arc<ProcessRegistry>,
    proxies: ProxyFactory,
    root: NodeRef,
}

impl Oms {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> OmsBuilder {
        OmsBuilder::new()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &OmsConfig {
        &self.config
    }

    /// The model handle.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Resolved permission tables.
    #[must_use]
    pub fn permissions(&self) -> &Arc<PermissionRegistry> {
        &self.permissions
    }

    /// The role store.
    #[must_use]
    pub fn roles(&self) -> &Arc<DefaultRoleStore> {
        &self.roles
    }

    /// The event bus.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Registered actions.
    #[must_use]
    pub fn actions(&self) -> &Arc<ActionTable> {
        &self.actions
    }

    /// The process registry.
    #[must_use]
    pub fn procs(&self) -> &Arc<ProcessRegistry> {
        &self.procs
    }

    /// The proxy factory.
    #[must_use]
    pub fn proxies(&self) -> &ProxyFactory {
        &self.proxies
    }

    /// The unprotected tree root.
    #[must_use]
    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// A fresh interaction with `principal` as its base binding.
    #[must_use]
    pub fn interaction(&self, principal: Principal) -> Arc<Interaction> {
        Arc::new(Interaction::for_principal(principal))
    }

    /// The root wrapped for `interaction`.
    #[must_use]
    pub fn secure_root(&self, interaction: &Arc<Interaction>) -> SecureNode {
        self.proxies.wrap(Arc::clone(&self.root), interaction)
    }

    /// Writes every persisted node of the tree to `store` in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// [`StoreError`] from snapshotting or the backend.
    pub async fn persist<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<CommitReport, StoreError> {
        let mut txn = store.begin().await;
        let count = txn.write_tree(&self.root)?;
        tracing::debug!(txn = %txn.id(), nodes = count, "persisting tree");
        store.commit(txn).await
    }
}

impl std::fmt::Debug for Oms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oms")
            .field("model", &self.model)
            .field("mode", &self.permissions.mode())
            .field("procs", &self.procs)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Oms`].
///
/// # Example
///
/// ```
/// use oms_runtime::Oms;
///
/// let oms = Oms::builder().build().unwrap();
/// assert_eq!(oms.root().path(), "/");
/// assert_eq!(oms.procs().tasks().len(), 1);
/// ```
#[derive(Default)]
pub struct OmsBuilder {
    config: OmsConfig,
    types: Vec<TypeDef>,
    providers: Vec<Registration>,
    actions: Vec<(TypeFilter, String, String, ActionHandler)>,
    roles: Option<Arc<DefaultRoleStore>>,
}

impl OmsBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config`.
    #[must_use]
    pub fn with_config(mut self, config: OmsConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers an extra type after the built-in ones.
    #[must_use]
    pub fn with_type(mut self, def: TypeDef) -> Self {
        self.types.push(def);
        self
    }

    /// Uses an existing role store instead of a fresh one.
    #[must_use]
    pub fn with_roles(mut self, roles: Arc<DefaultRoleStore>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Registers an injector. Order of registration is kept.
    #[must_use]
    pub fn with_injector(mut self, filter: TypeFilter, injector: impl Injector + 'static) -> Self {
        self.providers
            .push(Box::new(move |registry| registry.register_injector(filter, injector)));
        self
    }

    /// Registers an extender. Order of registration is kept.
    #[must_use]
    pub fn with_extender(mut self, filter: TypeFilter, extender: impl Extender + 'static) -> Self {
        self.providers
            .push(Box::new(move |registry| registry.register_extender(filter, extender)));
        self
    }

    /// Registers an action.
    #[must_use]
    pub fn with_action<F>(mut self, filter: TypeFilter, name: &str, description: &str, handler: F) -> Self
    where
        F: Fn(&NodeRef, &Value) -> Result<Value, ModelError> + Send + Sync + 'static,
    {
        self.actions
            .push((filter, name.to_string(), description.to_string(), Arc::new(handler)));
        self
    }

    /// Assembles the runtime.
    ///
    /// # Errors
    ///
    /// - [`OmsError::Model`] if a type definition is invalid
    /// - [`OmsError::Registry`] if permission declarations are inconsistent
    pub fn build(self) -> Result<Oms, OmsError> {
        let mode = self.config.check_mode();
        tracing::info!(?mode, extra_types = self.types.len(), "before application initialized");

        let mut types = TypeRegistry::new();
        types.register_all(builtin::type_defs())?;
        types.register_all(self.types)?;
        let permissions = Arc::new(types.permission_registry(mode)?);

        let roles = self
            .roles
            .unwrap_or_else(|| Arc::new(DefaultRoleStore::with_defaults()));
        let events = Arc::new(EventBus::new());
        let providers = Arc::new(ProviderRegistry::new());
        let model = Model::new(
            Arc::new(types),
            Arc::clone(&providers),
            Arc::clone(&roles) as Arc<dyn RoleStore>,
            Arc::clone(&events) as Arc<dyn EventSink>,
        );

        for register in self.providers {
            register(&providers);
        }

        let actions = Arc::new(ActionTable::new());
        register_builtin_actions(&actions);
        for (filter, name, description, handler) in self.actions {
            actions.register(filter, &name, &description, move |node, args| handler(node, args));
        }
        providers.register_extender(TypeFilter::Any, actions.extender(&model)?);

        let root = model.create(ROOT_TYPE)?;
        let root_container = model.container(&root)?;
        root_container.add(model.create_named(COMPUTES_TYPE, COMPUTES)?)?;
        let procs = ProcessRegistry::new(&model, &self.config.proc.init_cmdline)?;
        root_container.add(Arc::clone(procs.container()))?;

        let checker = Arc::new(AccessChecker::new(
            Arc::clone(&permissions),
            Arc::clone(&roles) as Arc<dyn RoleStore>,
        ));
        let proxies = ProxyFactory::new(checker, model.clone(), Arc::clone(&actions));

        tracing::info!(
            types = model.types().len(),
            injectors = providers.injector_count(),
            extenders = providers.extender_count(),
            "application initialized"
        );

        Ok(Oms {
            config: self.config,
            model,
            permissions,
            roles,
            events,
            actions,
            procs,
            proxies,
            root,
        })
    }
}

impl std::fmt::Debug for OmsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmsBuilder")
            .field("config", &self.config)
            .field("types", &self.types.len())
            .field("providers", &self.providers.len())
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// `start` / `stop` on compute nodes toggle the `running` feature.
fn register_builtin_actions(actions: &ActionTable) {
    actions.register(
        TypeFilter::kind(COMPUTE_TYPE),
        "start",
        "Mark the compute as running",
        |node, _args| {
            node.set_features(["+running"])?;
            Ok(json!({ "features": node.features() }))
        },
    );
    actions.register(
        TypeFilter::kind(COMPUTE_TYPE),
        "stop",
        "Mark the compute as stopped",
        |node, _args| {
            node.set_features(["-running"])?;
            Ok(json!({ "features": node.features() }))
        },
    );
}
