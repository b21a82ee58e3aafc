// Copyright (c) 2025 - Cowboy AI, Inc.
//! Physical Inventory
//!
//! The discovered, disaggregated hardware that composition draws from.
//! Compute systems own their local components; remote volumes and
//! storage pools are shared across the pod.
//!
//! # Availability
//!
//! A component is available when neither it nor its owning system is
//! allocated and the system is enabled. Allocation flips the flags
//! inside a single pool transaction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ComponentId;

/// Processor brand as reported by Redfish `ProcessorId`/`Model`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessorBrand {
    E3,
    E5,
    E7,
    X3,
    X5,
    X7,
    I3,
    I5,
    I7,
    Silver,
    Gold,
    Platinum,
    Unknown,
}

/// Processor instruction set architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InstructionSet {
    #[serde(rename = "x86")]
    X86,
    #[serde(rename = "x86-64")]
    X86_64,
    #[serde(rename = "IA-64")]
    Ia64,
    #[serde(rename = "ARM-A32")]
    ArmA32,
    #[serde(rename = "ARM-A64")]
    ArmA64,
    #[serde(rename = "MIPS32")]
    Mips32,
    #[serde(rename = "MIPS64")]
    Mips64,
    #[serde(rename = "OEM")]
    Oem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "HDD")]
    Hdd,
    #[serde(rename = "SSD")]
    Ssd,
}

/// Local drive attachment protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DriveProtocol {
    #[serde(rename = "SATA")]
    Sata,
    #[serde(rename = "SAS")]
    Sas,
    #[serde(rename = "NVMe")]
    Nvme,
    #[serde(rename = "PCIe")]
    Pcie,
}

/// Protocol a remote volume is exposed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FabricProtocol {
    #[serde(rename = "iSCSI")]
    Iscsi,
    #[serde(rename = "NVMeOverFabrics")]
    NvmeOverFabrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TpmInterfaceType {
    #[serde(rename = "TPM1_2")]
    Tpm1_2,
    #[serde(rename = "TPM2_0")]
    Tpm2_0,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedModule {
    pub interface_type: TpmInterfaceType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    pub id: ComponentId,
    pub model: Option<String>,
    pub brand: Option<ProcessorBrand>,
    pub total_cores: Option<u32>,
    pub max_speed_mhz: Option<u32>,
    pub instruction_set: Option<InstructionSet>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub allocated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryModule {
    pub id: ComponentId,
    pub capacity_mib: Option<u32>,
    pub memory_device_type: Option<String>,
    pub speed_mhz: Option<u32>,
    pub manufacturer: Option<String>,
    pub data_width_bits: Option<u32>,
    #[serde(default)]
    pub allocated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDrive {
    pub id: ComponentId,
    pub capacity_gib: Option<u64>,
    pub media_type: Option<MediaType>,
    pub protocol: Option<DriveProtocol>,
    pub serial_number: Option<String>,
    #[serde(default)]
    pub allocated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthernetInterface {
    pub id: ComponentId,
    pub speed_mbps: Option<u32>,
    #[serde(default)]
    pub vlans: BTreeSet<u32>,
    pub mac_address: Option<String>,
    #[serde(default)]
    pub allocated: bool,
}

/// A physical compute node and everything it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerSystem {
    pub id: ComponentId,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub allocated: bool,
    #[serde(default)]
    pub processors: Vec<Processor>,
    #[serde(default)]
    pub memory: Vec<MemoryModule>,
    #[serde(default)]
    pub drives: Vec<LocalDrive>,
    #[serde(default)]
    pub ethernet_interfaces: Vec<EthernetInterface>,
    #[serde(default)]
    pub trusted_modules: Vec<TrustedModule>,
}

fn enabled_by_default() -> bool {
    true
}

impl ComputerSystem {
    /// Whether the system can be handed to a new composed node
    pub fn is_available(&self) -> bool {
        self.enabled && !self.allocated
    }

    pub fn total_cores(&self) -> u32 {
        self.processors.iter().filter_map(|p| p.total_cores).sum()
    }

    pub fn total_memory_mib(&self) -> u64 {
        self.memory
            .iter()
            .filter_map(|m| m.capacity_mib)
            .map(u64::from)
            .sum()
    }

    pub fn available_processors(&self) -> Vec<Processor> {
        self.processors.iter().filter(|p| !p.allocated).cloned().collect()
    }

    pub fn available_memory(&self) -> Vec<MemoryModule> {
        self.memory.iter().filter(|m| !m.allocated).cloned().collect()
    }

    pub fn available_drives(&self) -> Vec<LocalDrive> {
        self.drives.iter().filter(|d| !d.allocated).cloned().collect()
    }

    pub fn available_ethernet_interfaces(&self) -> Vec<EthernetInterface> {
        self.ethernet_interfaces
            .iter()
            .filter(|e| !e.allocated)
            .cloned()
            .collect()
    }
}

/// An existing remote volume exposed by a storage service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVolume {
    pub id: ComponentId,
    pub capacity_gib: u64,
    pub protocol: FabricProtocol,
    #[serde(default)]
    pub allocated: bool,
}

/// Capacity pool new volumes are carved from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePool {
    pub id: ComponentId,
    pub free_capacity_gib: u64,
    pub protocols: BTreeSet<FabricProtocol>,
}

/// Everything the allocator can choose from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub systems: Vec<ComputerSystem>,
    #[serde(default)]
    pub volumes: Vec<RemoteVolume>,
    #[serde(default)]
    pub storage_pools: Vec<StoragePool>,
}

impl Inventory {
    pub fn system(&self, id: &ComponentId) -> Option<&ComputerSystem> {
        self.systems.iter().find(|s| &s.id == id)
    }

    pub fn system_mut(&mut self, id: &ComponentId) -> Option<&mut ComputerSystem> {
        self.systems.iter_mut().find(|s| &s.id == id)
    }

    pub fn volume(&self, id: &ComponentId) -> Option<&RemoteVolume> {
        self.volumes.iter().find(|v| &v.id == id)
    }

    pub fn volume_mut(&mut self, id: &ComponentId) -> Option<&mut RemoteVolume> {
        self.volumes.iter_mut().find(|v| &v.id == id)
    }

    pub fn storage_pool_mut(&mut self, id: &ComponentId) -> Option<&mut StoragePool> {
        self.storage_pools.iter_mut().find(|p| &p.id == id)
    }

    /// Systems that are enabled and unallocated, ordered by id
    pub fn available_systems(&self) -> Vec<&ComputerSystem> {
        let mut systems: Vec<&ComputerSystem> =
            self.systems.iter().filter(|s| s.is_available()).collect();
        systems.sort_by(|a, b| a.id.cmp(&b.id));
        systems
    }
}
