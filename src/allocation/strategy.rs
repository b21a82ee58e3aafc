// Copyright (c) 2025 - Cowboy AI, Inc.
//! Allocation Strategies
//!
//! The shape of a request decides how it is allocated:
//!
//! | Remote drives | Strategy |
//! |---|---|
//! | 0 | [`LocalAllocationStrategy`] |
//! | 1 | [`RemoteDriveAllocationStrategy`] |
//! | more | none applies |
//!
//! Every strategy runs against a [`PoolTransaction`], so reservations only
//! become visible when the allocator commits.

use tracing::debug;

use super::matching::{
    map_components, ComponentMatcher, EthernetInterfaceMatcher, Identified, LocalDriveMatcher,
    MemoryMatcher, ProcessorMatcher,
};
use super::pool::{ChangedEntity, PoolTransaction};
use super::validation::{RequestedNodeValidator, Violation, Violations};
use super::AllocationError;
use crate::domain::{
    ComponentId, ComponentKind, ComposedNode, ComputerSystem, FabricProtocol, Inventory, NodeTask,
    RemoteDriveBinding, RemoteDriveOrigin, RemoteDriveSpec, RemoteVolume, RequestedNode,
};

/// A compute system plus the components chosen on it, in processing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSelection {
    pub system: ComponentId,
    pub processors: Vec<ComponentId>,
    pub memory: Vec<ComponentId>,
    pub local_drives: Vec<ComponentId>,
    pub ethernet_interfaces: Vec<ComponentId>,
}

pub trait AllocationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, request: &RequestedNode, inventory: &Inventory) -> Result<(), AllocationError>;

    fn find_computer_system(
        &self,
        request: &RequestedNode,
        inventory: &Inventory,
    ) -> Result<SystemSelection, AllocationError> {
        find_computer_system(request, inventory)
    }

    /// Reserve everything in `tx` and return the node with its strategy tasks
    fn allocate_with_computer_system(
        &self,
        request: &RequestedNode,
        selection: SystemSelection,
        tx: &mut PoolTransaction,
    ) -> Result<ComposedNode, AllocationError>;
}

/// Pick the strategy for a request
pub fn select_strategy(request: &RequestedNode) -> Result<Box<dyn AllocationStrategy>, AllocationError> {
    match request.remote_drives.len() {
        0 => Ok(Box::new(LocalAllocationStrategy::default())),
        1 => Ok(Box::new(RemoteDriveAllocationStrategy::default())),
        n => Err(AllocationError::ResourceNotFound(format!(
            "no allocation strategy supports {} remote drives",
            n
        ))),
    }
}

/// First available system, by id, satisfying aggregate and per-component constraints
pub fn find_computer_system(
    request: &RequestedNode,
    inventory: &Inventory,
) -> Result<SystemSelection, AllocationError> {
    inventory
        .available_systems()
        .into_iter()
        .filter(|system| meets_aggregates(request, system))
        .find_map(|system| select_components(request, system))
        .ok_or_else(|| {
            AllocationError::ResourceNotFound(format!(
                "no computer system satisfies request '{}'",
                request.name
            ))
        })
}

fn meets_aggregates(request: &RequestedNode, system: &ComputerSystem) -> bool {
    let cores: u32 = system
        .available_processors()
        .iter()
        .filter_map(|p| p.total_cores)
        .sum();
    let memory: u64 = system
        .available_memory()
        .iter()
        .filter_map(|m| m.capacity_mib)
        .map(u64::from)
        .sum();

    let cores_ok = request.total_system_core_count.map_or(true, |min| cores >= min);
    let memory_ok = request.total_system_memory_mib.map_or(true, |min| memory >= min);
    let security_ok = request.security.as_ref().map_or(true, |security| {
        let present_ok = match security.tpm_present {
            Some(true) => !system.trusted_modules.is_empty(),
            Some(false) | None => true,
        };
        let type_ok = security
            .tpm_interface_type
            .map_or(true, |t| system.trusted_modules.iter().any(|m| m.interface_type == t));
        present_ok && type_ok
    });
    cores_ok && memory_ok && security_ok
}

fn complete<M: ComponentMatcher>(requested: &[M::Spec], available: &[M::Component]) -> Option<Vec<ComponentId>> {
    let mapping = map_components::<M>(requested, available);
    (mapping.len() == requested.len()).then(|| mapping.iter().map(|(_, c)| c.id().clone()).collect())
}

fn select_components(request: &RequestedNode, system: &ComputerSystem) -> Option<SystemSelection> {
    let processors = complete::<ProcessorMatcher>(&request.processors, &system.available_processors())?;
    let memory = complete::<MemoryMatcher>(&request.memory, &system.available_memory())?;
    let local_drives = complete::<LocalDriveMatcher>(&request.local_drives, &system.available_drives())?;
    let ethernet_interfaces = complete::<EthernetInterfaceMatcher>(
        &request.ethernet_interfaces,
        &system.available_ethernet_interfaces(),
    )?;
    Some(SystemSelection {
        system: system.id.clone(),
        processors,
        memory,
        local_drives,
        ethernet_interfaces,
    })
}

fn structural(validator: &RequestedNodeValidator, request: &RequestedNode) -> Result<(), AllocationError> {
    let violations = validator.validate(request);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AllocationError::Validation(Violations(violations)))
    }
}

/// Reserve the system and its selected components
fn bind_local(
    request: &RequestedNode,
    selection: SystemSelection,
    tx: &mut PoolTransaction,
) -> Result<ComposedNode, AllocationError> {
    let missing = |what: &str, id: &ComponentId| {
        AllocationError::ResourceNotFound(format!("{} {} disappeared from the pool", what, id))
    };

    let system = tx
        .inventory
        .system_mut(&selection.system)
        .ok_or_else(|| missing("computer system", &selection.system))?;
    system.allocated = true;

    let mut changed = vec![ChangedEntity::ComputerSystem(selection.system.clone())];
    for id in &selection.processors {
        let p = system.processors.iter_mut().find(|p| &p.id == id).ok_or_else(|| missing("processor", id))?;
        p.allocated = true;
        changed.push(ChangedEntity::Component(ComponentKind::Processor, id.clone()));
    }
    for id in &selection.memory {
        let m = system.memory.iter_mut().find(|m| &m.id == id).ok_or_else(|| missing("memory", id))?;
        m.allocated = true;
        changed.push(ChangedEntity::Component(ComponentKind::Memory, id.clone()));
    }
    for id in &selection.local_drives {
        let d = system.drives.iter_mut().find(|d| &d.id == id).ok_or_else(|| missing("drive", id))?;
        d.allocated = true;
        changed.push(ChangedEntity::Component(ComponentKind::LocalDrive, id.clone()));
    }
    for id in &selection.ethernet_interfaces {
        let e = system
            .ethernet_interfaces
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| missing("ethernet interface", id))?;
        e.allocated = true;
        changed.push(ChangedEntity::Component(ComponentKind::EthernetInterface, id.clone()));
    }
    for entity in changed {
        tx.mark(entity);
    }

    let mut node = ComposedNode::new(request.name.clone(), selection.system);
    node.description = request.description.clone();
    node.processors = selection.processors;
    node.memory = selection.memory;
    node.local_drives = selection.local_drives;
    node.ethernet_interfaces = selection.ethernet_interfaces;
    Ok(node)
}

/// Compute-local components only
#[derive(Debug, Default)]
pub struct LocalAllocationStrategy {
    validator: RequestedNodeValidator,
}

impl AllocationStrategy for LocalAllocationStrategy {
    fn name(&self) -> &'static str {
        "local"
    }

    fn validate(&self, request: &RequestedNode, _inventory: &Inventory) -> Result<(), AllocationError> {
        structural(&self.validator, request)
    }

    fn allocate_with_computer_system(
        &self,
        request: &RequestedNode,
        selection: SystemSelection,
        tx: &mut PoolTransaction,
    ) -> Result<ComposedNode, AllocationError> {
        bind_local(request, selection, tx)
    }
}

/// Local components plus one remote volume
#[derive(Debug, Default)]
pub struct RemoteDriveAllocationStrategy {
    validator: RequestedNodeValidator,
}

/// Where the remote drive comes from, resolved against the inventory
enum RemotePlan {
    Attach {
        volume: ComponentId,
        protocol: FabricProtocol,
    },
    Create {
        storage_pool: ComponentId,
        capacity_gib: u64,
        protocol: FabricProtocol,
        source: Option<ComponentId>,
    },
}

impl RemoteDriveAllocationStrategy {
    fn spec<'r>(&self, request: &'r RequestedNode) -> Result<&'r RemoteDriveSpec, AllocationError> {
        request
            .remote_drives
            .first()
            .ok_or_else(|| AllocationError::ResourceNotFound("request has no remote drive".into()))
    }

    fn plan(&self, spec: &RemoteDriveSpec, inventory: &Inventory) -> Result<RemotePlan, Violation> {
        let property = ComponentKind::RemoteDrive.property();

        if let Some(id) = &spec.resource {
            let volume = inventory
                .volume(id)
                .ok_or_else(|| Violation::new(property, format!("volume {} does not exist", id)))?;
            if volume.allocated {
                return Err(Violation::new(property, format!("volume {} is already in use", id)));
            }
            if spec.protocol.is_some_and(|p| p != volume.protocol) {
                return Err(Violation::new(property, format!("volume {} uses another protocol", id)));
            }
            return Ok(RemotePlan::Attach {
                volume: id.clone(),
                protocol: volume.protocol,
            });
        }

        let master: Option<&RemoteVolume> = match spec.master.as_ref().and_then(|m| m.resource.as_ref()) {
            Some(id) => Some(inventory.volume(id).ok_or_else(|| {
                Violation::new(property, format!("master volume {} does not exist", id))
            })?),
            None => None,
        };
        let capacity_gib = spec
            .capacity_gib
            .or(master.map(|m| m.capacity_gib))
            .ok_or_else(|| Violation::new(property, "capacity is required for a new volume"))?;
        let wanted = spec.protocol.or(master.map(|m| m.protocol));

        let mut pools: Vec<_> = inventory.storage_pools.iter().collect();
        pools.sort_by(|a, b| a.id.cmp(&b.id));
        pools
            .into_iter()
            .filter(|pool| pool.free_capacity_gib >= capacity_gib)
            .find_map(|pool| {
                let protocol = match wanted {
                    Some(p) => pool.protocols.contains(&p).then_some(p)?,
                    None => *pool.protocols.iter().next()?,
                };
                Some(RemotePlan::Create {
                    storage_pool: pool.id.clone(),
                    capacity_gib,
                    protocol,
                    source: master.map(|m| m.id.clone()),
                })
            })
            .ok_or_else(|| {
                Violation::new(
                    property,
                    format!("no storage pool offers {} GiB over the requested protocol", capacity_gib),
                )
            })
    }
}

impl AllocationStrategy for RemoteDriveAllocationStrategy {
    fn name(&self) -> &'static str {
        "remote-drive"
    }

    fn validate(&self, request: &RequestedNode, inventory: &Inventory) -> Result<(), AllocationError> {
        structural(&self.validator, request)?;
        let spec = self.spec(request)?;
        self.plan(spec, inventory)
            .map(|_| ())
            .map_err(|violation| AllocationError::Validation(Violations(vec![violation])))
    }

    fn allocate_with_computer_system(
        &self,
        request: &RequestedNode,
        selection: SystemSelection,
        tx: &mut PoolTransaction,
    ) -> Result<ComposedNode, AllocationError> {
        let spec = self.spec(request)?;
        let plan = self
            .plan(spec, &tx.inventory)
            .map_err(|v| AllocationError::ResourceNotFound(v.message))?;
        let mut node = bind_local(request, selection, tx)?;

        let binding = match plan {
            RemotePlan::Attach { volume, protocol } => {
                if let Some(existing) = tx.inventory.volume_mut(&volume) {
                    existing.allocated = true;
                }
                tx.mark(ChangedEntity::RemoteVolume(volume.clone()));
                RemoteDriveBinding {
                    volume,
                    protocol,
                    origin: RemoteDriveOrigin::Existing,
                }
            }
            RemotePlan::Create {
                storage_pool,
                capacity_gib,
                protocol,
                source,
            } => {
                let volume = ComponentId::new(format!("{}/Volumes/{}", storage_pool, node.id.simple()));
                if let Some(pool) = tx.inventory.storage_pool_mut(&storage_pool) {
                    pool.free_capacity_gib -= capacity_gib;
                }
                tx.inventory.volumes.push(RemoteVolume {
                    id: volume.clone(),
                    capacity_gib,
                    protocol,
                    allocated: true,
                });
                tx.mark(ChangedEntity::StoragePool(storage_pool.clone()));
                tx.mark(ChangedEntity::RemoteVolume(volume.clone()));
                node.assembly_tasks.push(NodeTask::CreateRemoteVolume {
                    volume: volume.clone(),
                    storage_pool: storage_pool.clone(),
                    capacity_gib,
                    source,
                });
                RemoteDriveBinding {
                    volume,
                    protocol,
                    origin: RemoteDriveOrigin::Created {
                        storage_pool,
                        capacity_gib,
                    },
                }
            }
        };

        debug!(node = %node.id, volume = %binding.volume, "Bound remote drive");
        node.assembly_tasks.push(NodeTask::AttachRemoteDrive {
            volume: binding.volume.clone(),
            system: node.computer_system.clone(),
            protocol: binding.protocol,
        });
        node.remote_drives.push(binding);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MasterDrive, ReplicaType, StoragePool};

    fn inventory() -> Inventory {
        Inventory {
            systems: Vec::new(),
            volumes: vec![RemoteVolume {
                id: ComponentId::from("golden"),
                capacity_gib: 40,
                protocol: FabricProtocol::Iscsi,
                allocated: false,
            }],
            storage_pools: vec![
                StoragePool {
                    id: ComponentId::from("pool-b"),
                    free_capacity_gib: 500,
                    protocols: [FabricProtocol::Iscsi, FabricProtocol::NvmeOverFabrics].into(),
                },
                StoragePool {
                    id: ComponentId::from("pool-a"),
                    free_capacity_gib: 10,
                    protocols: [FabricProtocol::Iscsi].into(),
                },
            ],
        }
    }

    #[test]
    fn test_strategy_selection_by_shape() {
        let local = RequestedNode::builder("n").build();
        assert_eq!(select_strategy(&local).unwrap().name(), "local");

        let one = RequestedNode::builder("n")
            .remote_drive(RemoteDriveSpec {
                capacity_gib: Some(1),
                ..Default::default()
            })
            .build();
        assert_eq!(select_strategy(&one).unwrap().name(), "remote-drive");

        let two = RequestedNode::builder("n")
            .remote_drive(RemoteDriveSpec::default())
            .remote_drive(RemoteDriveSpec::default())
            .build();
        assert!(matches!(
            select_strategy(&two),
            Err(AllocationError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_clone_inherits_master_capacity_and_protocol() {
        let strategy = RemoteDriveAllocationStrategy::default();
        let spec = RemoteDriveSpec {
            master: Some(MasterDrive {
                replica_type: Some(ReplicaType::Clone),
                resource: Some(ComponentId::from("golden")),
            }),
            ..Default::default()
        };
        match strategy.plan(&spec, &inventory()) {
            Ok(RemotePlan::Create {
                storage_pool,
                capacity_gib,
                protocol,
                source,
            }) => {
                assert_eq!(storage_pool.as_str(), "pool-b");
                assert_eq!(capacity_gib, 40);
                assert_eq!(protocol, FabricProtocol::Iscsi);
                assert_eq!(source, Some(ComponentId::from("golden")));
            }
            _ => panic!("expected a create plan"),
        }
    }

    #[test]
    fn test_missing_volume_is_a_violation() {
        let strategy = RemoteDriveAllocationStrategy::default();
        let request = RequestedNode::builder("n")
            .remote_drive(RemoteDriveSpec {
                resource: Some(ComponentId::from("nope")),
                ..Default::default()
            })
            .build();
        let err = strategy.validate(&request, &inventory()).unwrap_err();
        assert!(matches!(err, AllocationError::Validation(_)));
    }

    #[test]
    fn test_oversized_volume_has_no_pool() {
        let strategy = RemoteDriveAllocationStrategy::default();
        let spec = RemoteDriveSpec {
            capacity_gib: Some(1_000),
            ..Default::default()
        };
        assert!(strategy.plan(&spec, &inventory()).is_err());
    }
}
