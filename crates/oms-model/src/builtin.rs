//! Built-in node types and their permission declarations.
//!
//! Startup walks [`type_defs`] in order; there is no runtime scanning.
//!
//! | Type | Extends | Containment | Notes |
//! |------|---------|-------------|-------|
//! | `Model` | | | base: name, times, features, owner |
//! | `Container` | `Model` | nothing | container operations |
//! | `Root` | `Container` | any | tree root |
//! | `Folder` | `Container` | any | generic grouping |
//! | `Compute` | `Model` | | capability `compute`; `state` deliberately undeclared |
//! | `Computes` | `Container` | capability `compute` | |
//! | `Proc` | `Container` | kind `Task` | live tasks |
//! | `CompletedProc` | `Container` | kind `Task` | finished tasks |
//! | `Task` | `Model` | | computed `uptime`, `nickname` |
//! | `Actions` | `Container` | nothing | transient action listing |
//! | `Action` | `Model` | | |

use crate::action::{ACTIONS_TYPE, ACTION_TYPE};
use crate::proc::{COMPLETED_PROC_TYPE, PROC_TYPE, TASK_TYPE};
use crate::schema::{Containment, TypeDef, TypeRegistry};
use crate::{ModelError, Node};
use chrono::Utc;
use oms_auth::Permission;
use serde_json::{json, Value};

/// Base type of every node.
pub const MODEL_TYPE: &str = "Model";
/// Base container type.
pub const CONTAINER_TYPE: &str = "Container";
/// Type of the tree root.
pub const ROOT_TYPE: &str = "Root";
/// Generic container.
pub const FOLDER_TYPE: &str = "Folder";
/// Compute node.
pub const COMPUTE_TYPE: &str = "Compute";
/// Container of compute nodes.
pub const COMPUTES_TYPE: &str = "Computes";

fn uptime(node: &Node) -> Value {
    let elapsed = Utc::now().signed_duration_since(node.created_at());
    json!(elapsed.num_milliseconds().max(0) as f64 / 1000.0)
}

fn task_nickname(node: &Node) -> Value {
    node.attr("cmdline").unwrap_or(Value::Null)
}

/// The built-in type definitions, parents first.
#[must_use]
pub fn type_defs() -> Vec<TypeDef> {
    let view = Permission::VIEW;
    let read = Permission::READ;
    let traverse = Permission::TRAVERSE;

    vec![
        TypeDef::new(MODEL_TYPE)
            .permission("name", view.clone())
            .permission("oid", view.clone())
            .permission("type", view.clone())
            .permission("ctime", view.clone())
            .permission("mtime", view.clone())
            .permission("nickname", view.clone())
            .permission("transient", view.clone())
            .permission("features", (view.clone(), Permission::MODIFY))
            .permission("metadata", (view.clone(), Permission::MODIFY))
            .permission("owner", (view.clone(), Permission::ADMIN))
            .permission("inherit_permissions", (view.clone(), Permission::ADMIN))
            .permission("execute", Permission::EXECUTE),
        TypeDef::new(CONTAINER_TYPE)
            .extends(MODEL_TYPE)
            .container(Containment::Nothing)
            .permission("listnames", traverse.clone())
            .permission("listcontent", traverse.clone())
            .permission("iter", traverse.clone())
            .permission("getitem", traverse.clone())
            .permission("content", traverse.clone())
            .permission("can_contain", Permission::ADD)
            .permission("add", Permission::ADD)
            .permission("rename", Permission::MODIFY)
            .permission("remove", Permission::DELETE),
        TypeDef::new(ROOT_TYPE)
            .extends(CONTAINER_TYPE)
            .container(Containment::Any),
        TypeDef::new(FOLDER_TYPE)
            .extends(CONTAINER_TYPE)
            .container(Containment::Any),
        TypeDef::new(COMPUTE_TYPE)
            .extends(MODEL_TYPE)
            .capability("compute")
            .marker("virtual")
            .marker("deployed")
            .marker("running")
            .permission("architecture", read.clone())
            .permission("hostname", (view.clone(), Permission::MODIFY)),
        TypeDef::new(COMPUTES_TYPE)
            .extends(CONTAINER_TYPE)
            .container(Containment::Capability("compute".into())),
        TypeDef::new(PROC_TYPE)
            .extends(CONTAINER_TYPE)
            .container(Containment::Kind(TASK_TYPE.into())),
        TypeDef::new(COMPLETED_PROC_TYPE)
            .extends(CONTAINER_TYPE)
            .container(Containment::Kind(TASK_TYPE.into())),
        TypeDef::new(TASK_TYPE)
            .extends(MODEL_TYPE)
            .computed("uptime", uptime)
            .computed("nickname", task_nickname)
            .permission("id", read.clone())
            .permission("cmdline", read.clone())
            .permission("ptid", read.clone())
            .permission("timestamp", read.clone())
            .permission("uptime", read.clone())
            .permission("completed_at", read),
        TypeDef::new(ACTIONS_TYPE)
            .extends(CONTAINER_TYPE)
            .container(Containment::Nothing),
        TypeDef::new(ACTION_TYPE)
            .extends(MODEL_TYPE)
            .permission("action", view.clone())
            .permission("description", view),
    ]
}

/// A registry holding the built-in types.
///
/// # Errors
///
/// Only if the built-in definitions themselves are inconsistent.
pub fn registry() -> Result<TypeRegistry, ModelError> {
    let mut types = TypeRegistry::new();
    types.register_all(type_defs())?;
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oms_auth::CheckMode;

    #[test]
    fn builtins_register() {
        let types = registry().unwrap();
        assert_eq!(types.len(), type_defs().len());
        assert!(types.get(PROC_TYPE).unwrap().is_a(CONTAINER_TYPE));
        assert!(types.get(TASK_TYPE).unwrap().computed("uptime").is_some());
    }

    #[test]
    fn compute_state_is_undeclared() {
        let perms = registry()
            .unwrap()
            .permission_registry(CheckMode::Enforcing)
            .unwrap();
        assert_eq!(
            perms
                .lookup(COMPUTE_TYPE, "architecture")
                .unwrap()
                .read_permission(),
            &Permission::READ
        );
        assert!(perms.lookup(COMPUTE_TYPE, "state").unwrap_err().is_undeclared());
        assert_eq!(
            perms.lookup(PROC_TYPE, "remove").unwrap().read_permission(),
            &Permission::DELETE
        );
    }

    #[test]
    fn task_computed_attributes() {
        let types = registry().unwrap();
        let task = Node::builder(types.get(TASK_TYPE).unwrap())
            .attr("cmdline", json!("/bin/sleep 5"))
            .build();
        assert_eq!(task.nickname().as_deref(), Some("/bin/sleep 5"));
        let up = task.get_attr("uptime").unwrap().as_f64().unwrap();
        assert!(up >= 0.0);
    }
}
