// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pod Manager Domain Models
//!
//! Identities, discovered inventory, composition requests and their
//! results.
//!
//! # Identities
//!
//! - [`ServiceId`] - one management agent behind the pod manager
//! - [`ResourceReference`] - (service, path) pair, the key for tags and unification
//! - [`ComponentId`] - canonical identity of an inventory component
//!
//! # Composition
//!
//! - [`RequestedNode`] - what a client asks for
//! - [`Inventory`] - what the pod has
//! - [`ComposedNode`] - what the allocator bound together

pub mod composed_node;
pub mod inventory;
pub mod reference;
pub mod requested_node;

pub use composed_node::{
    BootSourceTarget, ComposedNode, ComposedNodeState, NodeTask, RemoteDriveBinding,
    RemoteDriveOrigin,
};
pub use inventory::{
    ComputerSystem, DriveProtocol, EthernetInterface, FabricProtocol, InstructionSet, Inventory,
    LocalDrive, MediaType, MemoryModule, Processor, ProcessorBrand, RemoteVolume, StoragePool,
    TpmInterfaceType, TrustedModule,
};
pub use reference::{normalize_path, ComponentId, ResourceReference, ServiceId};
pub use requested_node::{
    ComponentKind, ComponentSpec, EthernetInterfaceSpec, LocalDriveSpec, MasterDrive, MemorySpec,
    ProcessorSpec, RemoteDriveSpec, ReplicaType, RequestedComponent, RequestedNode,
    RequestedNodeBuilder, SecuritySpec,
};
