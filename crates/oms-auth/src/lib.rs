//! Permission primitives for OMS.
//!
//! This crate provides the attribute-level permission model. Every read or
//! write of a node attribute is decided from three inputs:
//!
//! ```text
//! Allowed = Declaration(WHAT) ∩ Principals(WHO) ∩ Roles(WHERE)
//! ```
//!
//! | Layer | Type | Controls |
//! |-------|------|----------|
//! | [`PermissionDecl`] + [`PermissionRegistry`] | Struct | Which permission guards each attribute of each type |
//! | [`Interaction`] | Struct | Which principals are acting in the current operation |
//! | [`RoleStore`] | Trait | Which permissions a principal holds, globally or per node |
//!
//! # Crate Architecture
//!
//! ```text
//! oms-types  (IDs, Principal)
//!     ↑
//! oms-auth  ◄── THIS CRATE
//! (Permission, PermissionRegistry, Interaction, RoleStore)
//!     ↑
//! oms-model (node tree, uses Role::OWNER through RoleStore)
//!     ↑
//! oms-runtime (AccessChecker, DefaultRoleStore impl)
//! ```
//!
//! # Design Principles
//!
//! - **Trait definitions here, implementations in consumers**: oms-runtime
//!   provides `DefaultRoleStore` and the access checker
//! - **Explicit interactions**: no global "current principal"; an
//!   [`Interaction`] is passed to every secure proxy
//! - **Undeclared is not unauthorized**: an attribute missing from the
//!   resolved table is an [`AccessError::UndeclaredAttribute`]

pub mod error;
pub mod interaction;
pub mod permission;
pub mod registry;
pub mod role;

pub use error::{AccessError, InteractionError, RegistryError};
pub use interaction::{Binding, Interaction};
pub use permission::{Permission, PermissionDecl};
pub use registry::{CheckMode, PermissionRegistry, PermissionRegistryBuilder, PermissionTable};
pub use role::{Role, RoleStore};

// Re-export Principal from oms_types for convenience
pub use oms_types::Principal;
