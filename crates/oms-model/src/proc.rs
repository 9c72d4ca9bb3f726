//! Process registry: live and completed background tasks.
//!
//! Tasks live as `Task` nodes in a `proc` container. When a task finishes
//! it moves to a `completed` container which is not a persisted child of
//! `proc`: an extender exposes it as a transient child on every read.
//!
//! ```text
//! /proc                 (Proc)
//!   ├── 1               (Task, /bin/init, ptid 0)
//!   ├── 2               (Task, live)
//!   └── completed       (CompletedProc, transient via extender)
//!         └── 3         (Task, finished)
//! ```
//!
//! Task ids are sequential. `1` is the init task created with the
//! registry; registered tasks start at `2`.
//!
//! # Completion
//!
//! [`ProcessRegistry::register`] optionally takes a future standing for
//! the task's pending result. A tokio task awaits it and then moves the
//! task to `completed`. The caller keeps its own handle on the result
//! (a shared future, a channel receiver); the registry only observes
//! completion and never returns the value.

use crate::compose::{Extender, ProviderResult};
use crate::container::{ContainerCore, ContainerMut};
use crate::schema::TypeFilter;
use crate::{Model, ModelError, Node, NodeRef};
use chrono::{SecondsFormat, Utc};
use oms_types::TaskId;
use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Type name of the live task container.
pub const PROC_TYPE: &str = "Proc";
/// Type name of the completed task container.
pub const COMPLETED_PROC_TYPE: &str = "CompletedProc";
/// Type name of a task.
pub const TASK_TYPE: &str = "Task";

/// Live and completed tasks.
pub struct ProcessRegistry {
    model: Model,
    proc: NodeRef,
    completed: NodeRef,
    next_id: AtomicU64,
}

impl ProcessRegistry {
    /// Name of the `proc` container inside its parent.
    pub const NAME: &'static str = "proc";
    /// Name of the transient completed container inside `proc`.
    pub const COMPLETED: &'static str = "completed";

    /// Creates the registry with its init task and registers the extender
    /// exposing completed tasks. The extender retires once the registry is
    /// dropped.
    ///
    /// The returned `proc` container is detached; attach it where it
    /// belongs with [`container`](Self::container).
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownType`] if `Proc`, `CompletedProc` or `Task` are
    /// not registered.
    pub fn new(model: &Model, init_cmdline: &str) -> Result<Arc<Self>, ModelError> {
        let proc = model.create_named(PROC_TYPE, Self::NAME)?;
        let completed = model.create_named(COMPLETED_PROC_TYPE, Self::COMPLETED)?;

        let registry = Arc::new(Self {
            model: model.clone(),
            proc,
            completed,
            next_id: AtomicU64::new(TaskId::INIT.next().0),
        });

        let init = registry.task_node(TaskId::INIT, init_cmdline, TaskId(0))?;
        registry.model.container(&registry.proc)?.add(init)?;

        model.providers().register_extender(
            TypeFilter::kind(PROC_TYPE),
            CompletedExtender {
                registry: Arc::downgrade(&registry),
            },
        );

        tracing::debug!(init = init_cmdline, "process registry ready");
        Ok(registry)
    }

    /// The `proc` container node.
    #[must_use]
    pub fn container(&self) -> &NodeRef {
        &self.proc
    }

    fn task_node(&self, id: TaskId, cmdline: &str, ptid: TaskId) -> Result<NodeRef, ModelError> {
        let kind = self.model.types().get(TASK_TYPE)?;
        Ok(Node::builder(kind)
            .name(id.to_string())
            .attr("id", json!(id.0))
            .attr("cmdline", json!(cmdline))
            .attr("ptid", json!(ptid.0))
            .attr(
                "timestamp",
                json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            )
            .build())
    }

    /// Registers a task and returns its id.
    ///
    /// If `pending` is given, a tokio task awaits it and then moves the
    /// task to the completed set. That happens exactly once, even if the
    /// registering operation is long gone or the task was unregistered by
    /// hand in the meantime.
    ///
    /// # Errors
    ///
    /// - [`ModelError::NoRuntime`] if `pending` is given outside a tokio runtime
    /// - [`ModelError::UnknownType`] if `Task` is not registered
    pub fn register<F>(
        self: &Arc<Self>,
        pending: Option<F>,
        cmdline: &str,
        parent: TaskId,
    ) -> Result<TaskId, ModelError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = match pending {
            Some(_) => Some(
                tokio::runtime::Handle::try_current().map_err(|_| ModelError::NoRuntime)?,
            ),
            None => None,
        };

        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let node = self.task_node(id, cmdline, parent)?;
        self.model.container(&self.proc)?.add(node)?;
        tracing::debug!(task = %id, cmdline, ptid = %parent, "task registered");

        if let (Some(pending), Some(handle)) = (pending, handle) {
            let registry = Arc::clone(self);
            handle.spawn(async move {
                // the result belongs to the caller
                let _ = pending.await;
                match registry.unregister(id) {
                    Ok(_) => {}
                    Err(ModelError::NotFound { .. }) => {
                        tracing::debug!(task = %id, "task already completed");
                    }
                    Err(e) => {
                        tracing::warn!(task = %id, error = %e, "failed to complete task");
                    }
                }
            });
        }

        Ok(id)
    }

    /// Registers a task without a pending result.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownType`] if `Task` is not registered.
    pub fn register_detached(self: &Arc<Self>, cmdline: &str, parent: TaskId) -> Result<TaskId, ModelError> {
        self.register(None::<std::future::Ready<()>>, cmdline, parent)
    }

    /// Moves a live task to the completed set.
    ///
    /// Published as `Removed` from `proc` followed by `Created` in
    /// `completed`.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotFound`] if `id` is not a live task.
    pub fn unregister(&self, id: TaskId) -> Result<NodeRef, ModelError> {
        let task = self.model.container(&self.proc)?.remove(&id.to_string())?;
        task.set_attr(
            "completed_at",
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        )?;
        self.model.container(&self.completed)?.add(Arc::clone(&task))?;
        tracing::debug!(task = %id, "task completed");
        Ok(task)
    }

    /// Live tasks ordered by name.
    #[must_use]
    pub fn tasks(&self) -> Vec<NodeRef> {
        self.proc
            .with_children(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Completed tasks ordered by name.
    #[must_use]
    pub fn completed(&self) -> Vec<NodeRef> {
        self.completed
            .with_children(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `id` is live.
    #[must_use]
    pub fn is_live(&self, id: TaskId) -> bool {
        self.proc
            .with_children(|c| c.contains_key(&id.to_string()))
            .unwrap_or(false)
    }

    /// Live or completed task by id.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotFound`] if the id was never registered.
    pub fn get(&self, id: TaskId) -> Result<NodeRef, ModelError> {
        let name = id.to_string();
        self.model
            .container(&self.proc)?
            .get(&name)
            .or_else(|_| self.model.container(&self.completed)?.get(&name))
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("live", &self.tasks().len())
            .field("completed", &self.completed().len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

/// Exposes the completed container under its registry's `proc` node.
struct CompletedExtender {
    registry: Weak<ProcessRegistry>,
}

impl Extender for CompletedExtender {
    fn name(&self) -> &str {
        "proc.completed"
    }

    fn extend(&self, container: &NodeRef) -> ProviderResult {
        let Some(registry) = self.registry.upgrade() else {
            return Ok(Vec::new());
        };
        if !Arc::ptr_eq(container, &registry.proc) {
            return Ok(Vec::new());
        }
        Ok(vec![(
            ProcessRegistry::COMPLETED.to_string(),
            Arc::clone(&registry.completed),
        )])
    }

    fn is_retired(&self) -> bool {
        self.registry.strong_count() == 0
    }
}
