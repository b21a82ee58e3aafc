// Copyright (c) 2025 - Cowboy AI, Inc.
//! Structural validation of composition requests

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{
    ComponentKind, FabricProtocol, MasterDrive, RemoteDriveSpec, ReplicaType, RequestedNode,
};

/// One problem with a request, reported back to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub property: String,
    pub message: String,
}

impl Violation {
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.message)
    }
}

/// Non-empty list of violations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violations(pub Vec<Violation>);

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestedNodeValidator;

impl RequestedNodeValidator {
    pub fn validate(&self, request: &RequestedNode) -> Vec<Violation> {
        let mut violations = Vec::new();

        if request.name.trim().is_empty() {
            violations.push(Violation::new("Name", "must not be empty"));
        }
        positive(&mut violations, "TotalSystemCoreCount", request.total_system_core_count.map(u64::from));
        positive(&mut violations, "TotalSystemMemoryMiB", request.total_system_memory_mib);

        for (i, spec) in request.processors.iter().enumerate() {
            let at = |field: &str| format!("{}[{}].{}", ComponentKind::Processor, i, field);
            positive(&mut violations, &at("TotalCores"), spec.total_cores.map(u64::from));
            positive(&mut violations, &at("AchievableSpeedMHz"), spec.achievable_speed_mhz.map(u64::from));
        }
        for (i, spec) in request.memory.iter().enumerate() {
            let at = |field: &str| format!("{}[{}].{}", ComponentKind::Memory, i, field);
            positive(&mut violations, &at("CapacityMiB"), spec.capacity_mib.map(u64::from));
            positive(&mut violations, &at("SpeedMHz"), spec.speed_mhz.map(u64::from));
        }
        for (i, spec) in request.local_drives.iter().enumerate() {
            let at = format!("{}[{}].CapacityGiB", ComponentKind::LocalDrive, i);
            positive(&mut violations, &at, spec.capacity_gib);
        }
        for (i, spec) in request.ethernet_interfaces.iter().enumerate() {
            let at = |field: &str| format!("{}[{}].{}", ComponentKind::EthernetInterface, i, field);
            positive(&mut violations, &at("SpeedMbps"), spec.speed_mbps.map(u64::from));
            if let Some(vlan) = spec.primary_vlan {
                if !(1..=4094).contains(&vlan) {
                    violations.push(Violation::new(at("PrimaryVLAN"), "must be between 1 and 4094"));
                }
            }
        }
        for (i, spec) in request.remote_drives.iter().enumerate() {
            validate_remote_drive(&mut violations, i, spec);
        }

        let mut pinned = BTreeSet::new();
        for component in request.components() {
            if let Some(id) = component.pinned() {
                if !pinned.insert(id) {
                    violations.push(Violation::new(
                        component.kind().property(),
                        format!("resource {} is requested more than once", id),
                    ));
                }
            }
        }

        violations
    }
}

fn positive(violations: &mut Vec<Violation>, property: &str, value: Option<u64>) {
    if value == Some(0) {
        violations.push(Violation::new(property, "must be greater than zero"));
    }
}

fn validate_remote_drive(violations: &mut Vec<Violation>, index: usize, spec: &RemoteDriveSpec) {
    let at = |field: &str| format!("{}[{}].{}", ComponentKind::RemoteDrive, index, field);

    positive(violations, &at("CapacityGiB"), spec.capacity_gib);

    match (&spec.resource, &spec.master) {
        (Some(_), Some(_)) => violations.push(Violation::new(
            at("Master"),
            "cannot be combined with an existing Resource",
        )),
        (None, Some(MasterDrive { resource: None, .. })) => violations.push(Violation::new(
            at("Master.Resource"),
            "is required when a master drive is given",
        )),
        (None, None) if spec.capacity_gib.is_none() => violations.push(Violation::new(
            at("CapacityGiB"),
            "is required when creating a new volume",
        )),
        _ => {}
    }

    if let Some(master) = &spec.master {
        if spec.protocol == Some(FabricProtocol::NvmeOverFabrics)
            && master.replica_type == Some(ReplicaType::Snapshot)
        {
            violations.push(Violation::new(
                at("Master.Type"),
                "Snapshot replicas are not supported over NVMeOverFabrics",
            ));
        }
    }
}
