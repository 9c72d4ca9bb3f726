//! Permission names and per-attribute permission declarations.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// A named permission, e.g. `"view"` or `"traverse"`.
///
/// Permissions are opaque names; what they mean is defined by which
/// attributes declare them and which principals or roles are granted them.
///
/// # Example
///
/// ```
/// use oms_auth::Permission;
///
/// let custom = Permission::new("read");
/// assert_eq!(custom.as_str(), "read");
/// assert_eq!(Permission::VIEW.as_str(), "view");
/// assert_ne!(custom, Permission::NOTHING);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    /// See a node at all (its name and basic metadata).
    pub const VIEW: Permission = Permission(Cow::Borrowed("view"));
    /// Read attribute values.
    pub const READ: Permission = Permission(Cow::Borrowed("read"));
    /// List and look up container children.
    pub const TRAVERSE: Permission = Permission(Cow::Borrowed("traverse"));
    /// Add children to a container.
    pub const ADD: Permission = Permission(Cow::Borrowed("add"));
    /// Change attribute values and rename children.
    pub const MODIFY: Permission = Permission(Cow::Borrowed("modify"));
    /// Remove children from a container.
    pub const DELETE: Permission = Permission(Cow::Borrowed("delete"));
    /// Run actions attached to a node.
    pub const EXECUTE: Permission = Permission(Cow::Borrowed("execute"));
    /// Change ownership and security bookkeeping.
    pub const ADMIN: Permission = Permission(Cow::Borrowed("admin"));
    /// A permission nobody is expected to hold.
    pub const NOTHING: Permission = Permission(Cow::Borrowed("oms.nothing"));

    /// Creates a permission from an arbitrary name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the permission name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Permission requirement declared for one attribute.
///
/// Either a single permission guarding reads (writes fall back to the same
/// permission), or a `(read, write)` pair.
///
/// ```
/// use oms_auth::{Permission, PermissionDecl};
///
/// let ro = PermissionDecl::from(Permission::VIEW);
/// assert_eq!(ro.write_permission(), &Permission::VIEW);
///
/// let rw = PermissionDecl::from((Permission::VIEW, Permission::MODIFY));
/// assert_eq!(rw.read_permission(), &Permission::VIEW);
/// assert_eq!(rw.write_permission(), &Permission::MODIFY);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecl {
    read: Permission,
    write: Option<Permission>,
}

impl PermissionDecl {
    /// Declaration with a read permission only.
    #[must_use]
    pub fn read(read: Permission) -> Self {
        Self { read, write: None }
    }

    /// Declaration with distinct read and write permissions.
    #[must_use]
    pub fn read_write(read: Permission, write: Permission) -> Self {
        Self {
            read,
            write: Some(write),
        }
    }

    /// Permission required to read the attribute.
    #[must_use]
    pub fn read_permission(&self) -> &Permission {
        &self.read
    }

    /// Permission required to write the attribute.
    ///
    /// Falls back to the read permission when no write permission was
    /// declared.
    #[must_use]
    pub fn write_permission(&self) -> &Permission {
        self.write.as_ref().unwrap_or(&self.read)
    }

    /// Returns `true` if an explicit write permission was declared.
    #[must_use]
    pub fn has_write(&self) -> bool {
        self.write.is_some()
    }
}

impl From<Permission> for PermissionDecl {
    fn from(read: Permission) -> Self {
        Self::read(read)
    }
}

impl From<(Permission, Permission)> for PermissionDecl {
    fn from((read, write): (Permission, Permission)) -> Self {
        Self::read_write(read, write)
    }
}

impl From<&str> for PermissionDecl {
    fn from(read: &str) -> Self {
        Self::read(Permission::new(read))
    }
}

impl From<(&str, &str)> for PermissionDecl {
    fn from((read, write): (&str, &str)) -> Self {
        Self::read_write(Permission::new(read), Permission::new(write))
    }
}
