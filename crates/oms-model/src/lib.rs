//! Object tree for OMS.
//!
//! A live tree of administrative objects: compute nodes, processes and
//! containers of each. The children a container shows are composed on
//! every read from what is persisted plus what registered providers
//! contribute.
//!
//! # Crate Architecture
//!
//! ```text
//! oms-types  (IDs, Principal)
//!     ↑
//! oms-auth   (Permission, PermissionRegistry, RoleStore)
//!     ↑
//! oms-model  ◄── THIS CRATE
//! (Node, TypeRegistry, CompositionEngine, Container, ProcessRegistry)
//!     ↑
//! oms-runtime (secure proxies, event bus, store)
//! ```
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`node`] | [`Node`], attributes, feature tags |
//! | [`schema`] | [`TypeDef`], [`NodeType`], [`TypeRegistry`], [`Containment`], [`TypeFilter`] |
//! | [`compose`] | [`Injector`], [`Extender`], [`ProviderRegistry`], [`CompositionEngine`] |
//! | [`container`] | [`ContainerCore`], [`ContainerMut`], [`Container`] |
//! | [`model`] | [`Model`] handle, ownership |
//! | [`proc`] | [`ProcessRegistry`] |
//! | [`action`] | [`ActionTable`] |
//! | [`event`] | [`ModelEvent`], [`EventSink`] |
//! | [`builtin`] | built-in type definitions |

pub mod action;
pub mod builtin;
pub mod compose;
pub mod container;
pub mod error;
pub mod event;
pub mod model;
pub mod node;
pub mod proc;
pub mod schema;

pub use action::{Action, ActionHandler, ActionTable, ActionsExtender};
pub use compose::{
    Composition, CompositionEngine, Extender, Injector, Pass, ProviderFailure, ProviderRegistry,
    ProviderResult,
};
pub use container::{Container, ContainerCore, ContainerMut};
pub use error::{ModelError, ProviderError};
pub use event::{EventSink, ModelEvent, NullSink};
pub use model::Model;
pub use node::{Node, NodeBuilder, NodeRef};
pub use proc::ProcessRegistry;
pub use schema::{ComputedFn, Containment, NodeType, TypeDef, TypeFilter, TypeRegistry};
