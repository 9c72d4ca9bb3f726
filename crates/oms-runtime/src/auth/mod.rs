//! Principal and role bookkeeping.
//!
//! The [`RoleStore`](oms_auth::RoleStore) contract lives in `oms-auth`;
//! [`DefaultRoleStore`] is the in-memory implementation the runtime uses.

mod role_store;

pub use role_store::DefaultRoleStore;
