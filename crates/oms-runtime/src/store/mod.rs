//! Object store abstraction.
//!
//! The [`ObjectStore`] trait is the interface to whatever persists the
//! tree. The runtime ships [`MemoryStore`]; durable backends plug in
//! behind the same trait.
//!
//! # Transactions
//!
//! ```text
//! begin() ──► Transaction ──write(node)──► … ──► commit(txn)
//!               │ records the revisions                │
//!               │ it started from                      ▼
//!               └──────────────────────────► last committer wins
//! ```
//!
//! A transaction records whole-node snapshots. On commit every snapshot
//! replaces the stored state of its node, even if another transaction
//! committed that node after this one began. Such overwrites are reported
//! in [`CommitReport::conflicts`] and logged at debug level.

mod error;
mod memory;
mod snapshot;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use snapshot::NodeSnapshot;

use async_trait::async_trait;
use oms_model::Node;
use oms_types::NodeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

/// A stored snapshot and its revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored {
    pub snapshot: NodeSnapshot,
    /// Starts at 1 and increments with every committed write.
    pub revision: u64,
}

/// Outcome of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub written: usize,
    pub deleted: usize,
    /// Nodes committed by someone else after this transaction began and
    /// now overwritten.
    pub conflicts: Vec<NodeId>,
}

/// Pending writes, applied atomically by [`ObjectStore::commit`].
#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    base: HashMap<NodeId, u64>,
    writes: BTreeMap<NodeId, NodeSnapshot>,
    deletes: BTreeSet<NodeId>,
}

impl Transaction {
    /// Starts a transaction from the given revision table.
    #[must_use]
    pub fn new(base: HashMap<NodeId, u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            base,
            writes: BTreeMap::new(),
            deletes: BTreeSet::new(),
        }
    }

    /// Transaction id, for logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Revision of `node` when the transaction began (0 if absent).
    #[must_use]
    pub fn base_revision(&self, node: NodeId) -> u64 {
        self.base.get(&node).copied().unwrap_or(0)
    }

    /// Records `node`'s current state.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transient`] for extender-produced nodes.
    pub fn write(&mut self, node: &Node) -> Result<(), StoreError> {
        let snapshot = NodeSnapshot::capture(node)?;
        self.write_snapshot(snapshot);
        Ok(())
    }

    /// Records a prepared snapshot.
    pub fn write_snapshot(&mut self, snapshot: NodeSnapshot) {
        self.deletes.remove(&snapshot.id);
        self.writes.insert(snapshot.id, snapshot);
    }

    /// Records `node` and every persisted descendant.
    ///
    /// Returns the number of nodes recorded.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transient`] if `node` itself is transient.
    pub fn write_tree(&mut self, node: &Node) -> Result<usize, StoreError> {
        self.write(node)?;
        let mut count = 1;
        if node.is_container() {
            for child in node.persisted_children()?.values() {
                count += self.write_tree(child)?;
            }
        }
        Ok(count)
    }

    /// Records the removal of `node`'s stored state.
    pub fn delete(&mut self, node: NodeId) {
        self.writes.remove(&node);
        self.deletes.insert(node);
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Uuid,
        HashMap<NodeId, u64>,
        BTreeMap<NodeId, NodeSnapshot>,
        BTreeSet<NodeId>,
    ) {
        (self.id, self.base, self.writes, self.deletes)
    }
}

/// Persistence interface for the object tree.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Id of the root node.
    fn root_id(&self) -> NodeId;

    /// Stored state of the root node.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] until the root has been committed.
    async fn root(&self) -> Result<Stored, StoreError> {
        self.read(self.root_id()).await
    }

    /// Stored state of `id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if never committed or deleted.
    async fn read(&self, id: NodeId) -> Result<Stored, StoreError>;

    /// Starts a transaction.
    async fn begin(&self) -> Transaction;

    /// Applies a transaction atomically, last committer wins.
    ///
    /// # Errors
    ///
    /// Backend failures only; conflicts are not errors.
    async fn commit(&self, txn: Transaction) -> Result<CommitReport, StoreError>;
}
