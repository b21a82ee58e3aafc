// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Assembly
//!
//! Executes an allocated node's task list in order. Each task has a
//! compensating rollback; when a task fails the completed ones are rolled
//! back in reverse and the node is left `Failed` until it is decomposed.
//!
//! ```text
//! Allocated ─► Assembling ─► task 1 ─► task 2 ─► ... ─► Assembled
//!                               │
//!                               └─ failure ─► rollback(done, reversed) ─► Failed
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::pool::{PoolTransaction, ResourcePool};
use super::AllocationError;
use crate::domain::{ComposedNode, ComposedNodeState, NodeTask};
use crate::retry::{retry_on_conflict_async, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TaskError(pub String);

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Performs side effects against the management agents
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, node: &ComposedNode, task: &NodeTask) -> Result<(), TaskError>;

    /// Undo a previously successful `execute`
    async fn rollback(&self, node: &ComposedNode, task: &NodeTask) -> Result<(), TaskError>;
}

pub struct NodeAssembler {
    pool: Arc<dyn ResourcePool>,
    executor: Arc<dyn TaskExecutor>,
    policy: RetryPolicy,
}

impl NodeAssembler {
    pub fn new(pool: Arc<dyn ResourcePool>, executor: Arc<dyn TaskExecutor>, policy: RetryPolicy) -> Self {
        Self { pool, executor, policy }
    }

    /// Run every queued task of an `Allocated` node
    pub async fn assemble(&self, id: Uuid) -> Result<ComposedNode, AllocationError> {
        let node = self.update_node(id, |node| {
            if node.state != ComposedNodeState::Allocated {
                return Err(AllocationError::InvalidState {
                    node: node.id,
                    state: node.state,
                    expected: ComposedNodeState::Allocated,
                });
            }
            node.set_state(ComposedNodeState::Assembling);
            Ok(())
        })
        .await?;
        info!(node = %id, tasks = node.assembly_tasks.len(), "Assembling composed node");

        let mut done: Vec<&NodeTask> = Vec::new();
        for task in &node.assembly_tasks {
            if *task == NodeTask::SetComposedNodeStateToAssembled {
                continue;
            }
            debug!(node = %id, task = task.name(), "Running assembly task");
            if let Err(err) = self.executor.execute(&node, task).await {
                error!(node = %id, task = task.name(), error = %err, "Assembly task failed");
                self.roll_back(&node, &done).await;
                self.update_node(id, |node| {
                    node.set_state(ComposedNodeState::Failed);
                    Ok(())
                })
                .await?;
                return Err(AllocationError::Assembly {
                    task: task.name(),
                    message: err.0,
                });
            }
            done.push(task);
        }

        let assembled = self.update_node(id, |node| {
            node.assembly_tasks.clear();
            node.set_state(ComposedNodeState::Assembled);
            Ok(())
        })
        .await?;
        info!(node = %id, "Composed node assembled");
        Ok(assembled)
    }

    async fn roll_back(&self, node: &ComposedNode, done: &[&NodeTask]) {
        for task in done.iter().rev() {
            if let Err(err) = self.executor.rollback(node, task).await {
                warn!(node = %node.id, task = task.name(), error = %err, "Rollback failed");
            }
        }
    }

    /// Apply `change` to the stored node under retry and return the result
    async fn update_node<F>(&self, id: Uuid, change: F) -> Result<ComposedNode, AllocationError>
    where
        F: Fn(&mut ComposedNode) -> Result<(), AllocationError>,
    {
        retry_on_conflict_async(self.policy, AllocationError::is_retryable, |_| {
            let snapshot = self.pool.snapshot()?;
            let mut node = snapshot
                .nodes
                .get(&id)
                .cloned()
                .ok_or(AllocationError::NodeNotFound(id))?;
            change(&mut node)?;

            let mut tx = PoolTransaction::new(&snapshot);
            tx.upsert_node(node.clone());
            self.pool.commit(tx)?;
            Ok(node)
        })
        .await
        .map_err(AllocationError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::pool::InMemoryResourcePool;
    use crate::domain::{ComponentId, Inventory};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        fail_on: Option<&'static str>,
        log: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskExecutor for Recorder {
        async fn execute(&self, _node: &ComposedNode, task: &NodeTask) -> Result<(), TaskError> {
            if self.fail_on == Some(task.name()) {
                return Err(TaskError::new("agent refused"));
            }
            self.log.lock().unwrap().push(format!("run {}", task.name()));
            Ok(())
        }

        async fn rollback(&self, _node: &ComposedNode, task: &NodeTask) -> Result<(), TaskError> {
            self.log.lock().unwrap().push(format!("undo {}", task.name()));
            Ok(())
        }
    }

    fn allocated_node(pool: &InMemoryResourcePool) -> Uuid {
        let system = ComponentId::from("/Systems/1");
        let mut node = ComposedNode::new("n", system.clone());
        node.assembly_tasks = vec![
            NodeTask::PowerOff { system: system.clone() },
            NodeTask::ContinuouslyOverrideBootSource {
                system,
                target: crate::domain::BootSourceTarget::Pxe,
            },
            NodeTask::SetComposedNodeStateToAssembled,
        ];
        node.set_state(ComposedNodeState::Allocated);
        let id = node.id;
        let mut tx = PoolTransaction::new(&pool.snapshot().unwrap());
        tx.upsert_node(node);
        pool.commit(tx).unwrap();
        id
    }

    #[tokio::test]
    async fn test_tasks_run_in_order() {
        let pool = Arc::new(InMemoryResourcePool::new(Inventory::default()));
        let id = allocated_node(&pool);
        let recorder = Arc::new(Recorder::default());
        let assembler = NodeAssembler::new(pool.clone(), recorder.clone(), RetryPolicy::default());

        let node = assembler.assemble(id).await.unwrap();

        assert_eq!(node.state, ComposedNodeState::Assembled);
        assert!(node.assembly_tasks.is_empty());
        assert_eq!(
            *recorder.log.lock().unwrap(),
            vec!["run PowerOff", "run ContinuouslyOverrideBootSource"]
        );
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_marks_failed() {
        let pool = Arc::new(InMemoryResourcePool::new(Inventory::default()));
        let id = allocated_node(&pool);
        let recorder = Arc::new(Recorder {
            fail_on: Some("ContinuouslyOverrideBootSource"),
            ..Default::default()
        });
        let assembler = NodeAssembler::new(pool.clone(), recorder.clone(), RetryPolicy::default());

        let err = assembler.assemble(id).await.unwrap_err();

        assert!(matches!(err, AllocationError::Assembly { task: "ContinuouslyOverrideBootSource", .. }));
        assert_eq!(*recorder.log.lock().unwrap(), vec!["run PowerOff", "undo PowerOff"]);
        let stored = pool.composed_node(id).unwrap().unwrap();
        assert_eq!(stored.state, ComposedNodeState::Failed);
    }

    #[tokio::test]
    async fn test_only_allocated_nodes_assemble() {
        let pool = Arc::new(InMemoryResourcePool::new(Inventory::default()));
        let id = allocated_node(&pool);
        let assembler = NodeAssembler::new(pool.clone(), Arc::new(Recorder::default()), RetryPolicy::default());

        assembler.assemble(id).await.unwrap();
        let err = assembler.assemble(id).await.unwrap_err();
        assert!(matches!(err, AllocationError::InvalidState { state: ComposedNodeState::Assembled, .. }));
    }

    #[tokio::test]
    async fn test_conflict_backoff_does_not_stall_runtime() {
        let pool = Arc::new(InMemoryResourcePool::new(Inventory::default()));
        let id = allocated_node(&pool);
        pool.inject_conflicts(2);
        let policy = RetryPolicy::new(3).with_backoff(std::time::Duration::from_millis(50));
        let assembler = NodeAssembler::new(pool.clone(), Arc::new(Recorder::default()), policy);

        let ticks = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            })
        };

        let node = assembler.assemble(id).await.unwrap();
        ticker.abort();

        assert_eq!(node.state, ComposedNodeState::Assembled);
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) >= 5);
    }
}
