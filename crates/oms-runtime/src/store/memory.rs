//! In-memory [`ObjectStore`].

use super::{CommitReport, ObjectStore, Stored, StoreError, Transaction};
use async_trait::async_trait;
use oms_types::NodeId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory, last-committer-wins object store.
///
/// The state lock is only ever held inside synchronous sections, never
/// across an `.await`.
#[derive(Debug)]
pub struct MemoryStore {
    root: NodeId,
    state: RwLock<HashMap<NodeId, Stored>>,
}

impl MemoryStore {
    /// Creates an empty store whose root will be `root`.
    #[must_use]
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    fn revisions(&self) -> HashMap<NodeId, u64> {
        self.state
            .read()
            .iter()
            .map(|(id, s)| (*id, s.revision))
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn root_id(&self) -> NodeId {
        self.root
    }

    async fn read(&self, id: NodeId) -> Result<Stored, StoreError> {
        self.state
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn begin(&self) -> Transaction {
        Transaction::new(self.revisions())
    }

    async fn commit(&self, txn: Transaction) -> Result<CommitReport, StoreError> {
        let (txn_id, base, writes, deletes) = txn.into_parts();
        let mut report = CommitReport::default();
        let mut state = self.state.write();

        for (id, snapshot) in writes {
            let current = state.get(&id).map_or(0, |s| s.revision);
            let seen = base.get(&id).copied().unwrap_or(0);
            if current != seen {
                tracing::debug!(
                    txn = %txn_id,
                    node = %id,
                    seen,
                    current,
                    "conflict resolved: last commit wins"
                );
                report.conflicts.push(id);
            }
            state.insert(
                id,
                Stored {
                    snapshot,
                    revision: current + 1,
                },
            );
            report.written += 1;
        }

        for id in deletes {
            if state.remove(&id).is_some() {
                report.deleted += 1;
            }
        }

        tracing::debug!(
            txn = %txn_id,
            written = report.written,
            deleted = report.deleted,
            conflicts = report.conflicts.len(),
            "transaction committed"
        );
        Ok(report)
    }
}
