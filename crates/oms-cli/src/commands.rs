//! Subcommand implementations.
//!
//! Every command works on [`SecureNode`]s, so what is listed or printed
//! is exactly what the calling principal may see.

use anyhow::{bail, Result};
use oms_model::proc::TASK_TYPE;
use oms_model::{ContainerCore, ProcessRegistry};
use oms_runtime::{NodeSnapshot, Oms, SecureNode, SecurityError};
use serde_json::{Map, Value};
use std::io::Write;

/// Lists a container's children, one per line, containers marked with `/`.
pub fn ls(node: &SecureNode, out: &mut impl Write) -> Result<()> {
    if !node.is_container() {
        let name = node.name()?.unwrap_or_default();
        writeln!(out, "{name}")?;
        return Ok(());
    }
    for (name, child) in node.iter()? {
        let marker = if child.is_container() { "/" } else { "" };
        writeln!(out, "{name}{marker}\t{}", child.type_name())?;
    }
    Ok(())
}

/// Prints every declared attribute the caller may read, as JSON.
///
/// Attributes the caller lacks rights for are left out; so are declared
/// names that carry no value (container operations, `execute`).
pub fn cat(oms: &Oms, node: &SecureNode, out: &mut impl Write) -> Result<()> {
    let mut attrs = Map::new();
    if let Some(table) = oms.permissions().table(node.type_name()) {
        for (attribute, _) in table.iter() {
            match node.get_attr(attribute) {
                Ok(value) => {
                    attrs.insert(attribute.to_string(), value);
                }
                Err(SecurityError::Access(e)) => {
                    tracing::debug!(attribute, error = %e, "attribute hidden");
                }
                Err(SecurityError::Model(_)) => {}
            }
        }
    }
    writeln!(out, "{}", serde_json::to_string_pretty(&Value::Object(attrs))?)?;
    Ok(())
}

/// Prints the stored form of a node. Only available to the system
/// principal.
pub fn snapshot(node: &SecureNode, out: &mut impl Write) -> Result<()> {
    if !node.interaction().has_system() {
        bail!("raw snapshots are only available to the system principal");
    }
    let snapshot = NodeSnapshot::capture(node.unwrap_node())?;
    writeln!(out, "{}", snapshot.to_json()?)?;
    Ok(())
}

/// Lists live tasks: id, parent id, uptime in seconds, command line.
pub fn ps(root: &SecureNode, out: &mut impl Write) -> Result<()> {
    let proc = root.traverse(ProcessRegistry::NAME)?;
    writeln!(out, "{:>5} {:>5} {:>10}  CMD", "TID", "PTID", "UPTIME")?;
    for task in proc.list_content()? {
        if task.type_name() != TASK_TYPE {
            continue;
        }
        let uptime = task.get_attr("uptime")?.as_f64().unwrap_or_default();
        writeln!(
            out,
            "{:>5} {:>5} {:>10.2}  {}",
            task.get_attr("id")?,
            task.get_attr("ptid")?,
            uptime,
            task.get_attr("cmdline")?.as_str().unwrap_or_default(),
        )?;
    }
    Ok(())
}
