// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Pool
//!
//! The shared, versioned store of inventory and composed nodes that every
//! allocation reads from and commits to.
//!
//! # Optimistic Concurrency
//!
//! ```text
//! snapshot() ──► version 7, inventory, nodes
//!      │ mutate a private copy
//!      ▼
//! commit(tx{base_version: 7})
//!      ├─ store still at 7 ──► version 8, post-commit hooks run
//!      └─ store moved on   ──► OptimisticLock (caller retries the whole unit)
//! ```
//!
//! A failed unit of work never touches the store, so nothing it reserved
//! is visible to anyone else.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{ComponentId, ComponentKind, ComposedNode, ComposedNodeState, Inventory};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("optimistic lock conflict: expected version {expected}, found {actual}")]
    OptimisticLock { expected: u64, actual: u64 },

    #[error("lock timeout: {0}")]
    LockTimeout(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl PersistenceError {
    /// Conflicts worth re-running the whole unit of work for
    ///
    /// Unique-constraint violations are included: concurrent inserts of the
    /// same natural key race in the store's uniqueness check.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PersistenceError::OptimisticLock { .. }
                | PersistenceError::LockTimeout(_)
                | PersistenceError::UniqueConstraintViolation(_)
        )
    }
}

/// Entity touched by a commit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangedEntity {
    ComputerSystem(ComponentId),
    Component(ComponentKind, ComponentId),
    RemoteVolume(ComponentId),
    StoragePool(ComponentId),
    ComposedNode(Uuid),
}

/// Consistent view of the pool at one version
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    pub version: u64,
    pub inventory: Inventory,
    pub nodes: BTreeMap<Uuid, ComposedNode>,
}

/// Pending changes based on one snapshot version
#[derive(Debug, Clone)]
pub struct PoolTransaction {
    pub base_version: u64,
    pub inventory: Inventory,
    pub upserted_nodes: Vec<ComposedNode>,
    pub removed_nodes: Vec<Uuid>,
    pub changed: BTreeSet<ChangedEntity>,
}

impl PoolTransaction {
    /// Start from a snapshot; the inventory copy is what gets committed
    pub fn new(snapshot: &PoolSnapshot) -> Self {
        Self {
            base_version: snapshot.version,
            inventory: snapshot.inventory.clone(),
            upserted_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            changed: BTreeSet::new(),
        }
    }

    pub fn mark(&mut self, entity: ChangedEntity) {
        self.changed.insert(entity);
    }

    pub fn upsert_node(&mut self, node: ComposedNode) {
        self.mark(ChangedEntity::ComposedNode(node.id));
        self.upserted_nodes.retain(|n| n.id != node.id);
        self.upserted_nodes.push(node);
    }

    pub fn remove_node(&mut self, id: Uuid) {
        self.mark(ChangedEntity::ComposedNode(id));
        self.upserted_nodes.retain(|n| n.id != id);
        self.removed_nodes.push(id);
    }
}

/// What post-commit hooks observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    pub version: u64,
    pub changed: Vec<ChangedEntity>,
}

pub type CommitHook = Box<dyn Fn(&CommitEvent) + Send + Sync>;

/// Transactional store behind the allocator
pub trait ResourcePool: Send + Sync {
    fn snapshot(&self) -> Result<PoolSnapshot, PersistenceError>;

    /// Apply a transaction if the store is still at its base version
    fn commit(&self, tx: PoolTransaction) -> Result<u64, PersistenceError>;

    fn composed_node(&self, id: Uuid) -> Result<Option<ComposedNode>, PersistenceError> {
        Ok(self.snapshot()?.nodes.get(&id).cloned())
    }

    /// Single-commit state change; conflicts surface to the caller
    fn update_node_state(&self, id: Uuid, state: ComposedNodeState) -> Result<ComposedNode, PersistenceError> {
        let snapshot = self.snapshot()?;
        let mut node = snapshot
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(format!("composed node {}", id)))?;
        node.set_state(state);
        let mut tx = PoolTransaction::new(&snapshot);
        tx.upsert_node(node.clone());
        self.commit(tx)?;
        Ok(node)
    }

    /// Register a hook run synchronously after every successful commit
    fn on_commit(&self, hook: CommitHook);
}

/// Process-local [`ResourcePool`]
#[derive(Default)]
pub struct InMemoryResourcePool {
    state: RwLock<PoolSnapshot>,
    hooks: RwLock<Vec<CommitHook>>,
    injected_conflicts: AtomicU32,
}

impl InMemoryResourcePool {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            state: RwLock::new(PoolSnapshot {
                version: 0,
                inventory,
                nodes: BTreeMap::new(),
            }),
            ..Default::default()
        }
    }

    /// Fail the next `count` commits with an optimistic-lock conflict
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn version(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).version
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ResourcePool for InMemoryResourcePool {
    fn snapshot(&self) -> Result<PoolSnapshot, PersistenceError> {
        Ok(self.state.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn commit(&self, tx: PoolTransaction) -> Result<u64, PersistenceError> {
        let event = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if self.take_injected_conflict() || state.version != tx.base_version {
                warn!(expected = tx.base_version, actual = state.version, "Commit rejected");
                return Err(PersistenceError::OptimisticLock {
                    expected: tx.base_version,
                    actual: state.version,
                });
            }

            state.inventory = tx.inventory;
            for id in &tx.removed_nodes {
                state.nodes.remove(id);
            }
            for node in tx.upserted_nodes {
                state.nodes.insert(node.id, node);
            }
            state.version += 1;
            debug!(version = state.version, changed = tx.changed.len(), "Committed pool transaction");

            CommitEvent {
                version: state.version,
                changed: tx.changed.into_iter().collect(),
            }
        };

        for hook in self.hooks.read().unwrap_or_else(PoisonError::into_inner).iter() {
            hook(&event);
        }
        Ok(event.version)
    }

    fn on_commit(&self, hook: CommitHook) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }
}
