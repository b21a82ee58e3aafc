// Copyright (c) 2025 - Cowboy AI, Inc.
//! Requested Node
//!
//! The client's description of the machine it wants composed. Each
//! component is either pinned to a concrete inventory component or
//! described by constraints; component kinds are a closed set modelled
//! as a tagged variant instead of an interface hierarchy.
//!
//! # Processing Order
//!
//! Component kinds are always visited in the order of
//! [`ComponentKind::PROCESSING_ORDER`]: processors, memory, drives
//! (local, then remote), network.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::inventory::{
    DriveProtocol, FabricProtocol, InstructionSet, MediaType, ProcessorBrand, TpmInterfaceType,
};
use super::ComponentId;

/// Closed set of requestable component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Processor,
    Memory,
    LocalDrive,
    RemoteDrive,
    EthernetInterface,
}

impl ComponentKind {
    pub const PROCESSING_ORDER: [ComponentKind; 5] = [
        ComponentKind::Processor,
        ComponentKind::Memory,
        ComponentKind::LocalDrive,
        ComponentKind::RemoteDrive,
        ComponentKind::EthernetInterface,
    ];

    /// Property name used in violation reports
    pub fn property(&self) -> &'static str {
        match self {
            ComponentKind::Processor => "Processors",
            ComponentKind::Memory => "Memory",
            ComponentKind::LocalDrive => "LocalDrives",
            ComponentKind::RemoteDrive => "RemoteDrives",
            ComponentKind::EthernetInterface => "EthernetInterfaces",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property())
    }
}

/// Common view over every requested component
pub trait RequestedComponent {
    const KIND: ComponentKind;

    /// Concrete component this request is pinned to, if any
    fn pinned(&self) -> Option<&ComponentId>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorSpec {
    pub resource: Option<ComponentId>,
    pub model: Option<String>,
    pub brand: Option<ProcessorBrand>,
    /// Minimum number of cores
    pub total_cores: Option<u32>,
    /// Minimum speed in MHz
    pub achievable_speed_mhz: Option<u32>,
    pub instruction_set: Option<InstructionSet>,
    /// Every listed capability must be present on the processor
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySpec {
    pub resource: Option<ComponentId>,
    /// Minimum module capacity
    pub capacity_mib: Option<u32>,
    pub memory_device_type: Option<String>,
    /// Minimum speed in MHz
    pub speed_mhz: Option<u32>,
    pub manufacturer: Option<String>,
    pub data_width_bits: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDriveSpec {
    pub resource: Option<ComponentId>,
    /// Minimum capacity
    pub capacity_gib: Option<u64>,
    pub media_type: Option<MediaType>,
    pub protocol: Option<DriveProtocol>,
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicaType {
    Snapshot,
    Clone,
}

/// Source volume a new remote drive is replicated from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterDrive {
    pub replica_type: Option<ReplicaType>,
    pub resource: Option<ComponentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDriveSpec {
    /// Existing volume to attach
    pub resource: Option<ComponentId>,
    pub capacity_gib: Option<u64>,
    pub protocol: Option<FabricProtocol>,
    pub master: Option<MasterDrive>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetInterfaceSpec {
    pub resource: Option<ComponentId>,
    /// Minimum link speed
    pub speed_mbps: Option<u32>,
    pub primary_vlan: Option<u32>,
    /// VLANs the interface must already carry
    #[serde(default)]
    pub vlans: BTreeSet<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySpec {
    pub tpm_present: Option<bool>,
    pub tpm_interface_type: Option<TpmInterfaceType>,
}

macro_rules! requested_component {
    ($spec:ty, $kind:expr) => {
        impl RequestedComponent for $spec {
            const KIND: ComponentKind = $kind;

            fn pinned(&self) -> Option<&ComponentId> {
                self.resource.as_ref()
            }
        }
    };
}

requested_component!(ProcessorSpec, ComponentKind::Processor);
requested_component!(MemorySpec, ComponentKind::Memory);
requested_component!(LocalDriveSpec, ComponentKind::LocalDrive);
requested_component!(RemoteDriveSpec, ComponentKind::RemoteDrive);
requested_component!(EthernetInterfaceSpec, ComponentKind::EthernetInterface);

/// Borrowed, kind-tagged view of one requested component
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentSpec<'a> {
    Processor(&'a ProcessorSpec),
    Memory(&'a MemorySpec),
    LocalDrive(&'a LocalDriveSpec),
    RemoteDrive(&'a RemoteDriveSpec),
    EthernetInterface(&'a EthernetInterfaceSpec),
}

impl<'a> ComponentSpec<'a> {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentSpec::Processor(_) => ComponentKind::Processor,
            ComponentSpec::Memory(_) => ComponentKind::Memory,
            ComponentSpec::LocalDrive(_) => ComponentKind::LocalDrive,
            ComponentSpec::RemoteDrive(_) => ComponentKind::RemoteDrive,
            ComponentSpec::EthernetInterface(_) => ComponentKind::EthernetInterface,
        }
    }

    pub fn pinned(&self) -> Option<&'a ComponentId> {
        match self {
            ComponentSpec::Processor(spec) => spec.pinned(),
            ComponentSpec::Memory(spec) => spec.pinned(),
            ComponentSpec::LocalDrive(spec) => spec.pinned(),
            ComponentSpec::RemoteDrive(spec) => spec.pinned(),
            ComponentSpec::EthernetInterface(spec) => spec.pinned(),
        }
    }
}

/// Immutable composition request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedNode {
    pub name: String,
    pub description: Option<String>,
    /// Aggregate constraint over the whole compute system
    pub total_system_core_count: Option<u32>,
    /// Aggregate constraint over the whole compute system
    pub total_system_memory_mib: Option<u64>,
    #[serde(default)]
    pub processors: Vec<ProcessorSpec>,
    #[serde(default)]
    pub memory: Vec<MemorySpec>,
    #[serde(default)]
    pub local_drives: Vec<LocalDriveSpec>,
    #[serde(default)]
    pub remote_drives: Vec<RemoteDriveSpec>,
    #[serde(default)]
    pub ethernet_interfaces: Vec<EthernetInterfaceSpec>,
    pub security: Option<SecuritySpec>,
}

impl RequestedNode {
    pub fn builder(name: impl Into<String>) -> RequestedNodeBuilder {
        RequestedNodeBuilder {
            node: RequestedNode {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    /// All requested components in processing order
    pub fn components(&self) -> Vec<ComponentSpec<'_>> {
        let mut components = Vec::new();
        components.extend(self.processors.iter().map(ComponentSpec::Processor));
        components.extend(self.memory.iter().map(ComponentSpec::Memory));
        components.extend(self.local_drives.iter().map(ComponentSpec::LocalDrive));
        components.extend(self.remote_drives.iter().map(ComponentSpec::RemoteDrive));
        components.extend(
            self.ethernet_interfaces
                .iter()
                .map(ComponentSpec::EthernetInterface),
        );
        components
    }

    pub fn has_remote_drives(&self) -> bool {
        !self.remote_drives.is_empty()
    }
}

/// Fluent construction, mostly for tests and clients
pub struct RequestedNodeBuilder {
    node: RequestedNode,
}

impl RequestedNodeBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.node.description = Some(description.into());
        self
    }

    pub fn total_system_core_count(mut self, cores: u32) -> Self {
        self.node.total_system_core_count = Some(cores);
        self
    }

    pub fn total_system_memory_mib(mut self, mib: u64) -> Self {
        self.node.total_system_memory_mib = Some(mib);
        self
    }

    pub fn processor(mut self, spec: ProcessorSpec) -> Self {
        self.node.processors.push(spec);
        self
    }

    pub fn memory(mut self, spec: MemorySpec) -> Self {
        self.node.memory.push(spec);
        self
    }

    pub fn local_drive(mut self, spec: LocalDriveSpec) -> Self {
        self.node.local_drives.push(spec);
        self
    }

    pub fn remote_drive(mut self, spec: RemoteDriveSpec) -> Self {
        self.node.remote_drives.push(spec);
        self
    }

    pub fn ethernet_interface(mut self, spec: EthernetInterfaceSpec) -> Self {
        self.node.ethernet_interfaces.push(spec);
        self
    }

    pub fn security(mut self, spec: SecuritySpec) -> Self {
        self.node.security = Some(spec);
        self
    }

    pub fn build(self) -> RequestedNode {
        self.node
    }
}
