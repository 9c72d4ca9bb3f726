//! Core types for the OpenNode Management Service (OMS).
//!
//! This crate holds the identifiers every other OMS crate agrees on.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  oms-types   : NodeId, PrincipalId, TaskId, Principal  ◄ HERE│
//! │  oms-auth    : permissions, registry, interaction, roles    │
//! │  oms-model   : node tree, composition, containers, proc     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  oms-runtime : checker, proxies, config, event bus, store   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  oms-cli     : inspection client                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use oms_types::{NodeId, Principal, TaskId};
//!
//! let node = NodeId::new();
//! let admin = Principal::user("admin");
//! let init = TaskId::INIT;
//!
//! assert_eq!(admin.id(), "admin");
//! assert_eq!(init.to_string(), "1");
//! assert_ne!(node, NodeId::new());
//! ```

mod error;
mod id;
mod principal;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{NodeId, PrincipalId, TaskId};
pub use principal::Principal;
