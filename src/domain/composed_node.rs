// Copyright (c) 2025 - Cowboy AI, Inc.
//! Composed Node
//!
//! The result of a successful allocation: a logical machine built from
//! one compute system plus the components bound to it. Bindings do not
//! change once assembly succeeds; decomposition releases all of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::inventory::FabricProtocol;
use super::ComponentId;

/// Observable lifecycle of a composed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComposedNodeState {
    Allocating,
    Allocated,
    Assembling,
    Assembled,
    Failed,
}

impl fmt::Display for ComposedNodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComposedNodeState::Allocating => "Allocating",
            ComposedNodeState::Allocated => "Allocated",
            ComposedNodeState::Assembling => "Assembling",
            ComposedNodeState::Assembled => "Assembled",
            ComposedNodeState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Boot source override target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootSourceTarget {
    Hdd,
    RemoteDrive,
    Pxe,
}

/// How a remote drive came to be bound to the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteDriveOrigin {
    /// Pre-existing volume, attached as is
    Existing,
    /// New volume carved from a storage pool
    Created {
        storage_pool: ComponentId,
        capacity_gib: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDriveBinding {
    pub volume: ComponentId,
    pub protocol: FabricProtocol,
    pub origin: RemoteDriveOrigin,
}

/// One side-effecting assembly step, executed at most once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeTask {
    CreateRemoteVolume {
        volume: ComponentId,
        storage_pool: ComponentId,
        capacity_gib: u64,
        source: Option<ComponentId>,
    },
    AttachRemoteDrive {
        volume: ComponentId,
        system: ComponentId,
        protocol: FabricProtocol,
    },
    PowerOff {
        system: ComponentId,
    },
    ContinuouslyOverrideBootSource {
        system: ComponentId,
        target: BootSourceTarget,
    },
    SetComposedNodeStateToAssembled,
}

impl NodeTask {
    pub fn name(&self) -> &'static str {
        match self {
            NodeTask::CreateRemoteVolume { .. } => "CreateRemoteVolume",
            NodeTask::AttachRemoteDrive { .. } => "AttachRemoteDrive",
            NodeTask::PowerOff { .. } => "PowerOff",
            NodeTask::ContinuouslyOverrideBootSource { .. } => "ContinuouslyOverrideBootSource",
            NodeTask::SetComposedNodeStateToAssembled => "SetComposedNodeStateToAssembled",
        }
    }
}

/// Logical machine assembled from disaggregated components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedNode {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub state: ComposedNodeState,
    pub computer_system: ComponentId,
    pub processors: Vec<ComponentId>,
    pub memory: Vec<ComponentId>,
    pub local_drives: Vec<ComponentId>,
    pub ethernet_interfaces: Vec<ComponentId>,
    pub remote_drives: Vec<RemoteDriveBinding>,
    /// Steps still to run before the node is usable
    pub assembly_tasks: Vec<NodeTask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ComposedNode {
    pub fn new(name: impl Into<String>, computer_system: ComponentId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: None,
            state: ComposedNodeState::Allocating,
            computer_system,
            processors: Vec::new(),
            memory: Vec::new(),
            local_drives: Vec::new(),
            ethernet_interfaces: Vec::new(),
            remote_drives: Vec::new(),
            assembly_tasks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_state(&mut self, state: ComposedNodeState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Every inventory component bound to this node, system first
    pub fn bound_components(&self) -> Vec<&ComponentId> {
        let mut ids = vec![&self.computer_system];
        ids.extend(self.processors.iter());
        ids.extend(self.memory.iter());
        ids.extend(self.local_drives.iter());
        ids.extend(self.ethernet_interfaces.iter());
        ids.extend(self.remote_drives.iter().map(|d| &d.volume));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_starts_allocating() {
        let node = ComposedNode::new("node", ComponentId::from("/redfish/v1/Systems/1"));
        assert_eq!(node.state, ComposedNodeState::Allocating);
        assert_eq!(node.bound_components().len(), 1);
    }

    #[test]
    fn test_task_names() {
        assert_eq!(NodeTask::SetComposedNodeStateToAssembled.name(), "SetComposedNodeStateToAssembled");
        let task = NodeTask::PowerOff {
            system: ComponentId::from("s"),
        };
        assert_eq!(task.name(), "PowerOff");
    }
}
