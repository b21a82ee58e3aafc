// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Allocator
//!
//! Runs allocation and decomposition as retried units of work against a
//! [`ResourcePool`]. Each attempt starts from a fresh snapshot; a lost
//! commit race discards everything the attempt reserved.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::pool::{ChangedEntity, PoolTransaction, ResourcePool};
use super::strategy::select_strategy;
use super::AllocationError;
use crate::domain::{
    BootSourceTarget, ComponentKind, ComposedNode, ComposedNodeState, NodeTask, RemoteDriveOrigin,
    RequestedNode,
};
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::state_machine::{AllocationStage, AllocationStep, TrackedMachine};

pub type AllocationLifecycle = TrackedMachine<AllocationStage>;

pub struct NodeAllocator {
    pool: Arc<dyn ResourcePool>,
    policy: RetryPolicy,
}

impl NodeAllocator {
    pub fn new(pool: Arc<dyn ResourcePool>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &Arc<dyn ResourcePool> {
        &self.pool
    }

    /// Allocate a node for `request`; the committed node is `Allocated`
    pub fn compose(&self, request: &RequestedNode) -> Result<ComposedNode, AllocationError> {
        self.compose_with_lifecycle(request).0
    }

    /// Like [`compose`](Self::compose), also returning the lifecycle of the
    /// final attempt
    pub fn compose_with_lifecycle(
        &self,
        request: &RequestedNode,
    ) -> (Result<ComposedNode, AllocationError>, AllocationLifecycle) {
        let mut lifecycle = AllocationLifecycle::new(AllocationStage::Received);

        let result = retry_on_conflict(self.policy, AllocationError::is_retryable, |attempt| {
            lifecycle = AllocationLifecycle::new(AllocationStage::Received);
            self.allocate_once(request, attempt, &mut lifecycle)
        })
        .map_err(AllocationError::from);

        let result = result.and_then(|node| {
            lifecycle.step(AllocationStep::QueueAssemblyTasks, Utc::now())?;
            Ok(node)
        });

        match result {
            Ok(node) => {
                info!(
                    node = %node.id,
                    name = %node.name,
                    system = %node.computer_system,
                    tasks = node.assembly_tasks.len(),
                    "Composed node allocated"
                );
                (Ok(node), lifecycle)
            }
            Err(err) => {
                match lifecycle.step(AllocationStep::Fail(err.to_string()), Utc::now()) {
                    Ok(output) if output.release_required => {
                        debug!(name = %request.name, "Discarded uncommitted reservations")
                    }
                    Ok(_) => {}
                    Err(transition) => warn!(error = %transition, "Lifecycle already terminal"),
                }
                warn!(name = %request.name, error = %err, "Allocation failed");
                (Err(err), lifecycle)
            }
        }
    }

    fn allocate_once(
        &self,
        request: &RequestedNode,
        attempt: u32,
        lifecycle: &mut AllocationLifecycle,
    ) -> Result<ComposedNode, AllocationError> {
        let snapshot = self.pool.snapshot()?;
        let strategy = select_strategy(request)?;
        debug!(attempt, strategy = strategy.name(), version = snapshot.version, "Allocating");

        strategy.validate(request, &snapshot.inventory)?;
        lifecycle.step(AllocationStep::Validate, Utc::now())?;

        let selection = strategy.find_computer_system(request, &snapshot.inventory)?;
        lifecycle.step(AllocationStep::FindResources, Utc::now())?;

        let mut tx = PoolTransaction::new(&snapshot);
        let mut node = strategy.allocate_with_computer_system(request, selection, &mut tx)?;
        node.assembly_tasks.extend(default_tasks(&node));
        node.set_state(ComposedNodeState::Allocated);
        tx.upsert_node(node.clone());
        lifecycle.step(AllocationStep::Allocate, Utc::now())?;

        self.pool.commit(tx)?;
        Ok(node)
    }

    /// Release everything bound to a node and delete it
    pub fn decompose(&self, id: Uuid) -> Result<(), AllocationError> {
        retry_on_conflict(self.policy, AllocationError::is_retryable, |_| {
            let snapshot = self.pool.snapshot()?;
            let node = snapshot
                .nodes
                .get(&id)
                .cloned()
                .ok_or(AllocationError::NodeNotFound(id))?;

            let mut tx = PoolTransaction::new(&snapshot);
            release(&node, &mut tx);
            tx.remove_node(id);
            self.pool.commit(tx)?;
            Ok(())
        })
        .map_err(AllocationError::from)?;

        info!(node = %id, "Composed node decomposed");
        Ok(())
    }
}

/// Tasks every node runs after its strategy tasks
pub fn default_tasks(node: &ComposedNode) -> [NodeTask; 3] {
    let target = if !node.remote_drives.is_empty() {
        BootSourceTarget::RemoteDrive
    } else if !node.local_drives.is_empty() {
        BootSourceTarget::Hdd
    } else {
        BootSourceTarget::Pxe
    };
    [
        NodeTask::PowerOff {
            system: node.computer_system.clone(),
        },
        NodeTask::ContinuouslyOverrideBootSource {
            system: node.computer_system.clone(),
            target,
        },
        NodeTask::SetComposedNodeStateToAssembled,
    ]
}

fn release(node: &ComposedNode, tx: &mut PoolTransaction) {
    let mut changed = Vec::new();
    if let Some(system) = tx.inventory.system_mut(&node.computer_system) {
        system.allocated = false;
        changed.push(ChangedEntity::ComputerSystem(system.id.clone()));
        for p in system.processors.iter_mut().filter(|p| node.processors.contains(&p.id)) {
            p.allocated = false;
            changed.push(ChangedEntity::Component(ComponentKind::Processor, p.id.clone()));
        }
        for m in system.memory.iter_mut().filter(|m| node.memory.contains(&m.id)) {
            m.allocated = false;
            changed.push(ChangedEntity::Component(ComponentKind::Memory, m.id.clone()));
        }
        for d in system.drives.iter_mut().filter(|d| node.local_drives.contains(&d.id)) {
            d.allocated = false;
            changed.push(ChangedEntity::Component(ComponentKind::LocalDrive, d.id.clone()));
        }
        for e in system
            .ethernet_interfaces
            .iter_mut()
            .filter(|e| node.ethernet_interfaces.contains(&e.id))
        {
            e.allocated = false;
            changed.push(ChangedEntity::Component(ComponentKind::EthernetInterface, e.id.clone()));
        }
    } else {
        warn!(node = %node.id, system = %node.computer_system, "Bound system no longer in inventory");
    }

    for binding in &node.remote_drives {
        changed.push(ChangedEntity::RemoteVolume(binding.volume.clone()));
        match &binding.origin {
            RemoteDriveOrigin::Existing => {
                if let Some(volume) = tx.inventory.volume_mut(&binding.volume) {
                    volume.allocated = false;
                }
            }
            RemoteDriveOrigin::Created {
                storage_pool,
                capacity_gib,
            } => {
                tx.inventory.volumes.retain(|v| v.id != binding.volume);
                if let Some(pool) = tx.inventory.storage_pool_mut(storage_pool) {
                    pool.free_capacity_gib += capacity_gib;
                }
                changed.push(ChangedEntity::StoragePool(storage_pool.clone()));
            }
        }
    }

    for entity in changed {
        tx.mark(entity);
    }
}
