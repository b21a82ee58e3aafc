// Copyright (c) 2025 - Cowboy AI, Inc.
//! Constraint Matching
//!
//! Greedy one-pass assignment of requested component specs to available
//! components of one kind.
//!
//! ```text
//! requested: sort by pinned id (unpinned last, stable)
//! available: sort by id
//! for spec in requested:
//!     survivors = remaining.filter(all predicates)
//!     best      = min(survivors, comparator)     // nulls first
//!     remaining -= best
//! ```
//!
//! There is no backtracking. A spec without survivors is left out of the
//! mapping; whether that is fatal is the caller's decision.

use std::cmp::Ordering;

use crate::domain::{
    ComponentId, EthernetInterface, EthernetInterfaceSpec, LocalDrive, LocalDriveSpec,
    MemoryModule, MemorySpec, Processor, ProcessorSpec, RequestedComponent,
};

/// Component with a stable identity
pub trait Identified {
    fn id(&self) -> &ComponentId;
}

macro_rules! identified {
    ($($component:ty),*) => {
        $(impl Identified for $component {
            fn id(&self) -> &ComponentId {
                &self.id
            }
        })*
    };
}

identified!(Processor, MemoryModule, LocalDrive, EthernetInterface);

pub type Predicate<S, C> = fn(&S, &C) -> bool;

/// Constraint rules for one component kind
pub trait ComponentMatcher {
    type Spec: RequestedComponent + 'static;
    type Component: Identified + Clone + 'static;

    /// Every predicate must accept a candidate
    const PREDICATES: &'static [Predicate<Self::Spec, Self::Component>];

    /// Preference among survivors; the smallest wins
    fn compare(a: &Self::Component, b: &Self::Component) -> Ordering;

    fn accepts(spec: &Self::Spec, component: &Self::Component) -> bool {
        Self::PREDICATES.iter().all(|p| p(spec, component))
    }
}

/// Assign specs to components, returning `(spec index, component)` pairs
/// in processing order
pub fn map_components<M: ComponentMatcher>(
    requested: &[M::Spec],
    available: &[M::Component],
) -> Vec<(usize, M::Component)> {
    let mut order: Vec<usize> = (0..requested.len()).collect();
    order.sort_by(|&a, &b| pinned_order(requested[a].pinned(), requested[b].pinned()));

    let mut remaining: Vec<&M::Component> = available.iter().collect();
    remaining.sort_by(|a, b| a.id().cmp(b.id()));

    let mut mapping = Vec::with_capacity(requested.len());
    for index in order {
        let spec = &requested[index];
        let best = remaining
            .iter()
            .enumerate()
            .filter(|(_, c)| M::accepts(spec, c))
            .min_by(|(_, a), (_, b)| M::compare(a, b))
            .map(|(position, _)| position);
        if let Some(position) = best {
            mapping.push((index, remaining.remove(position).clone()));
        }
    }
    mapping
}

/// Ascending by pinned id, unpinned last
fn pinned_order(a: Option<&ComponentId>, b: Option<&ComponentId>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn pinned<S: RequestedComponent, C: Identified>(spec: &S, component: &C) -> bool {
    spec.pinned().map_or(true, |id| id == component.id())
}

fn equal<T: PartialEq>(wanted: &Option<T>, actual: &Option<T>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual.as_ref() == Some(w),
    }
}

fn at_least<T: PartialOrd>(wanted: &Option<T>, actual: &Option<T>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(w), Some(a)) => a >= w,
        (Some(_), None) => false,
    }
}

pub struct ProcessorMatcher;

impl ComponentMatcher for ProcessorMatcher {
    type Spec = ProcessorSpec;
    type Component = Processor;

    const PREDICATES: &'static [Predicate<ProcessorSpec, Processor>] = &[
        pinned,
        |s, c| equal(&s.model, &c.model),
        |s, c| equal(&s.brand, &c.brand),
        |s, c| at_least(&s.total_cores, &c.total_cores),
        |s, c| at_least(&s.achievable_speed_mhz, &c.max_speed_mhz),
        |s, c| equal(&s.instruction_set, &c.instruction_set),
        |s, c| s.capabilities.is_subset(&c.capabilities),
    ];

    fn compare(a: &Processor, b: &Processor) -> Ordering {
        a.model
            .cmp(&b.model)
            .then(a.total_cores.cmp(&b.total_cores))
            .then(a.max_speed_mhz.cmp(&b.max_speed_mhz))
            .then(a.instruction_set.cmp(&b.instruction_set))
    }
}

pub struct MemoryMatcher;

impl ComponentMatcher for MemoryMatcher {
    type Spec = MemorySpec;
    type Component = MemoryModule;

    const PREDICATES: &'static [Predicate<MemorySpec, MemoryModule>] = &[
        pinned,
        |s, c| at_least(&s.capacity_mib, &c.capacity_mib),
        |s, c| equal(&s.memory_device_type, &c.memory_device_type),
        |s, c| at_least(&s.speed_mhz, &c.speed_mhz),
        |s, c| equal(&s.manufacturer, &c.manufacturer),
        |s, c| equal(&s.data_width_bits, &c.data_width_bits),
    ];

    fn compare(a: &MemoryModule, b: &MemoryModule) -> Ordering {
        a.capacity_mib
            .cmp(&b.capacity_mib)
            .then(a.speed_mhz.cmp(&b.speed_mhz))
            .then(a.memory_device_type.cmp(&b.memory_device_type))
    }
}

pub struct LocalDriveMatcher;

impl ComponentMatcher for LocalDriveMatcher {
    type Spec = LocalDriveSpec;
    type Component = LocalDrive;

    const PREDICATES: &'static [Predicate<LocalDriveSpec, LocalDrive>] = &[
        pinned,
        |s, c| at_least(&s.capacity_gib, &c.capacity_gib),
        |s, c| equal(&s.media_type, &c.media_type),
        |s, c| equal(&s.protocol, &c.protocol),
        |s, c| equal(&s.serial_number, &c.serial_number),
    ];

    fn compare(a: &LocalDrive, b: &LocalDrive) -> Ordering {
        a.capacity_gib
            .cmp(&b.capacity_gib)
            .then(a.media_type.cmp(&b.media_type))
            .then(a.protocol.cmp(&b.protocol))
    }
}

pub struct EthernetInterfaceMatcher;

impl ComponentMatcher for EthernetInterfaceMatcher {
    type Spec = EthernetInterfaceSpec;
    type Component = EthernetInterface;

    const PREDICATES: &'static [Predicate<EthernetInterfaceSpec, EthernetInterface>] = &[
        pinned,
        |s, c| at_least(&s.speed_mbps, &c.speed_mbps),
        |s, c| s.primary_vlan.map_or(true, |vlan| c.vlans.contains(&vlan)),
        |s, c| s.vlans.is_subset(&c.vlans),
    ];

    fn compare(a: &EthernetInterface, b: &EthernetInterface) -> Ordering {
        a.speed_mbps.cmp(&b.speed_mbps)
    }
}
