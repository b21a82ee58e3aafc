// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for podm-composition
//!
//! Deterministic agents, patterns and inventory shared by the integration
//! suites. Service ids are fixed so ordering-sensitive assertions
//! (collision resolution, crawl order) are reproducible.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use podm_composition::domain::{
    ComponentId, ComputerSystem, DriveProtocol, EthernetInterface, FabricProtocol, InstructionSet,
    Inventory, LocalDrive, MediaType, MemoryModule, Processor, RemoteVolume, ServiceId,
    StoragePool, TpmInterfaceType, TrustedModule,
};
use podm_composition::layers::InMemoryBackend;
use podm_composition::unification::{PatternSet, ResourceUnifier};

// Fixed agent ids; SERVICE_A sorts before SERVICE_B
pub const SERVICE_A: &str = "01934f4a-5000-7000-8000-00000000000a";
pub const SERVICE_B: &str = "01934f4a-5000-7000-8000-00000000000b";

pub const CANONICAL_ROOT: &str = "/redfish/v1";

pub const PATTERNS: &str = "\
# compute agents
/redfish/v1/[Systems/{}] -> {#/UUID}
/redfish/v1/[Systems/{}]/Processors/{} -> {..}/{}
/redfish/v1/[Chassis/{}] -> {$durableName(#/Identifiers)}
";

pub fn service_a() -> ServiceId {
    ServiceId::from_uuid(Uuid::parse_str(SERVICE_A).expect("Invalid UUID in test fixture"))
}

pub fn service_b() -> ServiceId {
    ServiceId::from_uuid(Uuid::parse_str(SERVICE_B).expect("Invalid UUID in test fixture"))
}

pub fn unifier() -> Arc<ResourceUnifier> {
    let patterns = PatternSet::parse(PATTERNS).expect("Invalid patterns in test fixture");
    Arc::new(ResourceUnifier::new(patterns, CANONICAL_ROOT))
}

// ============================================================================
// Agent resource trees
// ============================================================================

/// One compute agent: root, one system with one processor, one chassis,
/// one manager holding a secret
pub async fn populate_agent(backend: &InMemoryBackend, service: ServiceId, system_uuid: &str) {
    backend
        .insert(
            service,
            "/redfish/v1",
            json!({
                "@odata.id": "/redfish/v1",
                "Systems": {"@odata.id": "/redfish/v1/Systems"},
                "Chassis": {"@odata.id": "/redfish/v1/Chassis"},
                "Managers": {"@odata.id": "/redfish/v1/Managers"}
            }),
        )
        .await;
    backend
        .insert(service, "/redfish/v1/Systems", collection("/redfish/v1/Systems", &["/redfish/v1/Systems/1"]))
        .await;
    backend
        .insert(service, "/redfish/v1/Systems/1", system_body(system_uuid))
        .await;
    backend
        .insert(
            service,
            "/redfish/v1/Systems/1/Processors",
            collection("/redfish/v1/Systems/1/Processors", &["/redfish/v1/Systems/1/Processors/CPU0"]),
        )
        .await;
    backend
        .insert(
            service,
            "/redfish/v1/Systems/1/Processors/CPU0",
            json!({
                "@odata.id": "/redfish/v1/Systems/1/Processors/CPU0",
                "Id": "CPU0",
                "TotalCores": 8
            }),
        )
        .await;
    backend
        .insert(service, "/redfish/v1/Chassis", collection("/redfish/v1/Chassis", &["/redfish/v1/Chassis/1"]))
        .await;
    backend
        .insert(
            service,
            "/redfish/v1/Chassis/1",
            json!({
                "@odata.id": "/redfish/v1/Chassis/1",
                "Id": "1",
                "Identifiers": [{"DurableName": format!("rack-{}", system_uuid)}],
                "Links": {"ComputerSystems": [{"@odata.id": "/redfish/v1/Systems/1"}]}
            }),
        )
        .await;
    backend
        .insert(service, "/redfish/v1/Managers", collection("/redfish/v1/Managers", &["/redfish/v1/Managers/1"]))
        .await;
    backend
        .insert(
            service,
            "/redfish/v1/Managers/1",
            json!({
                "@odata.id": "/redfish/v1/Managers/1",
                "Id": "1",
                "Password": "hunter2",
                "Description": "BMC"
            }),
        )
        .await;
}

pub fn system_body(uuid: &str) -> Value {
    json!({
        "@odata.id": "/redfish/v1/Systems/1",
        "Id": "1",
        "UUID": uuid,
        "Name": "Compute",
        "Processors": {"@odata.id": "/redfish/v1/Systems/1/Processors"}
    })
}

fn collection(path: &str, members: &[&str]) -> Value {
    let members: Vec<Value> = members.iter().map(|m| json!({"@odata.id": m})).collect();
    json!({
        "@odata.id": path,
        "Members@odata.count": members.len(),
        "Members": members
    })
}

// ============================================================================
// Inventory
// ============================================================================

pub const SYSTEM_A: &str = "/redfish/v1/Systems/a";
pub const SYSTEM_B: &str = "/redfish/v1/Systems/b";
pub const GOLDEN_VOLUME: &str = "/redfish/v1/StorageServices/s1/Volumes/golden";
pub const STORAGE_POOL: &str = "/redfish/v1/StorageServices/s1/StoragePools/p1";

pub fn processor(id: &str, cores: u32) -> Processor {
    Processor {
        id: ComponentId::from(id),
        model: Some("Xeon".to_string()),
        brand: None,
        total_cores: Some(cores),
        max_speed_mhz: Some(3000),
        instruction_set: Some(InstructionSet::X86_64),
        capabilities: BTreeSet::new(),
        allocated: false,
    }
}

pub fn memory(id: &str, capacity_mib: u32) -> MemoryModule {
    MemoryModule {
        id: ComponentId::from(id),
        capacity_mib: Some(capacity_mib),
        memory_device_type: Some("DDR4".to_string()),
        speed_mhz: Some(2666),
        manufacturer: None,
        data_width_bits: Some(64),
        allocated: false,
    }
}

pub fn drive(id: &str, capacity_gib: u64) -> LocalDrive {
    LocalDrive {
        id: ComponentId::from(id),
        capacity_gib: Some(capacity_gib),
        media_type: Some(MediaType::Ssd),
        protocol: Some(DriveProtocol::Nvme),
        serial_number: None,
        allocated: false,
    }
}

pub fn nic(id: &str, speed_mbps: u32, vlans: &[u32]) -> EthernetInterface {
    EthernetInterface {
        id: ComponentId::from(id),
        speed_mbps: Some(speed_mbps),
        vlans: vlans.iter().copied().collect(),
        mac_address: None,
        allocated: false,
    }
}

/// Small system with a local drive and a TPM
pub fn system_a() -> ComputerSystem {
    ComputerSystem {
        id: ComponentId::from(SYSTEM_A),
        model: None,
        manufacturer: None,
        enabled: true,
        allocated: false,
        processors: vec![
            processor("/redfish/v1/Systems/a/Processors/1", 8),
            processor("/redfish/v1/Systems/a/Processors/2", 8),
        ],
        memory: vec![
            memory("/redfish/v1/Systems/a/Memory/1", 16_384),
            memory("/redfish/v1/Systems/a/Memory/2", 16_384),
        ],
        drives: vec![drive("/redfish/v1/Systems/a/Drives/1", 480)],
        ethernet_interfaces: vec![nic("/redfish/v1/Systems/a/EthernetInterfaces/1", 10_000, &[100])],
        trusted_modules: vec![TrustedModule {
            interface_type: TpmInterfaceType::Tpm2_0,
        }],
    }
}

/// Large diskless system without a TPM
pub fn system_b() -> ComputerSystem {
    ComputerSystem {
        id: ComponentId::from(SYSTEM_B),
        model: None,
        manufacturer: None,
        enabled: true,
        allocated: false,
        processors: vec![
            processor("/redfish/v1/Systems/b/Processors/1", 16),
            processor("/redfish/v1/Systems/b/Processors/2", 16),
        ],
        memory: vec![
            memory("/redfish/v1/Systems/b/Memory/1", 32_768),
            memory("/redfish/v1/Systems/b/Memory/2", 32_768),
        ],
        drives: Vec::new(),
        ethernet_interfaces: vec![nic("/redfish/v1/Systems/b/EthernetInterfaces/1", 25_000, &[100, 200])],
        trusted_modules: Vec::new(),
    }
}

pub fn inventory() -> Inventory {
    Inventory {
        systems: vec![system_b(), system_a()],
        volumes: vec![RemoteVolume {
            id: ComponentId::from(GOLDEN_VOLUME),
            capacity_gib: 40,
            protocol: FabricProtocol::Iscsi,
            allocated: false,
        }],
        storage_pools: vec![StoragePool {
            id: ComponentId::from(STORAGE_POOL),
            free_capacity_gib: 1_000,
            protocols: [FabricProtocol::Iscsi].into(),
        }],
    }
}
