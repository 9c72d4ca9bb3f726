//! Attribute-level security for the object tree.
//!
//! Permission primitives ([`Interaction`](oms_auth::Interaction),
//! [`PermissionRegistry`](oms_auth::PermissionRegistry),
//! [`RoleStore`](oms_auth::RoleStore)) are defined in `oms-auth`.
//! This module puts them to work:
//!
//! - [`AccessChecker`]: decides single attribute accesses
//! - [`ProxyFactory`] / [`SecureNode`]: route every node access through the checker
//! - [`SecurityError`]: what a proxied operation returns on failure
//!
//! # Architecture
//!
//! ```text
//! oms-auth (primitives)
//!     Interaction, PermissionRegistry, RoleStore
//!         ↓
//! oms-runtime/security (enforcement)
//!     AccessChecker ◄── SecureNode ◄── ProxyFactory
//! ```

mod checker;
mod error;
mod proxy;

pub use checker::{Access, AccessChecker};
pub use error::SecurityError;
pub use proxy::{ProxyFactory, SecureNode};
