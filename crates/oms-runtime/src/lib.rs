//! OMS runtime.
//!
//! Wires the object model into a running system: attribute-level
//! security proxies, role storage, configuration, the model event bus and
//! the object store.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Core Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  oms-types (ids, principals, ErrorCode)                     │
//! │  oms-auth  (permissions, roles, interactions)               │
//! │  oms-model (types, nodes, containers, composition, proc)    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Runtime Layer  ◄── HERE                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  oms-runtime (security, auth, config, engine, store, app)   │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  oms-cli (uses OmsError → anyhow)                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`app`] | [`Oms`] assembly and startup ordering |
//! | [`auth`] | [`DefaultRoleStore`] |
//! | [`config`] | Layered TOML + environment configuration |
//! | [`engine`] | [`EventBus`] broadcasting model events |
//! | [`security`] | [`AccessChecker`] and [`SecureNode`] proxies |
//! | [`store`] | [`ObjectStore`] trait and [`MemoryStore`] |
//!
//! # Example
//!
//! ```
//! use oms_runtime::Oms;
//! use oms_types::Principal;
//!
//! let oms = Oms::builder().build().unwrap();
//! let interaction = oms.interaction(Principal::System);
//! let root = oms.secure_root(&interaction);
//! let init = root.traverse("proc/1").unwrap();
//! assert_eq!(init.get_attr("cmdline").unwrap(), "/bin/init");
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod security;
pub mod store;

pub use app::{Oms, OmsBuilder, COMPUTES};
pub use auth::DefaultRoleStore;
pub use config::{ConfigError, ConfigLoader, OmsConfig};
pub use engine::EventBus;
pub use error::OmsError;
pub use security::{Access, AccessChecker, ProxyFactory, SecureNode, SecurityError};
pub use store::{
    CommitReport, MemoryStore, NodeSnapshot, ObjectStore, StoreError, Stored, Transaction,
};
