// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Greedy Component Matching
//!
//! Random processor inventories and requests, checked against the
//! assignment laws the allocator relies on.

use podm_composition::allocation::{map_components, ComponentMatcher, ProcessorMatcher};
use podm_composition::domain::{ComponentId, Processor, ProcessorSpec};
use proptest::prelude::*;
use std::collections::BTreeSet;

// ============================================================================
// Strategies
// ============================================================================

fn processor(index: usize, cores: u32) -> Processor {
    Processor {
        id: ComponentId::from(format!("/redfish/v1/Systems/1/Processors/{:02}", index).as_str()),
        model: None,
        brand: None,
        total_cores: Some(cores),
        max_speed_mhz: None,
        instruction_set: None,
        capabilities: BTreeSet::new(),
        allocated: false,
    }
}

fn inventory() -> impl Strategy<Value = Vec<Processor>> {
    prop::collection::vec(1u32..=32, 0..8).prop_map(|cores| {
        cores
            .into_iter()
            .enumerate()
            .map(|(index, cores)| processor(index, cores))
            .collect()
    })
}

/// Specs may pin one of the first eight processor ids, present or not
fn spec() -> impl Strategy<Value = ProcessorSpec> {
    (proptest::option::of(1u32..=32), proptest::option::of(0usize..8)).prop_map(|(cores, pinned)| {
        ProcessorSpec {
            resource: pinned.map(|index| processor(index, 1).id),
            total_cores: cores,
            ..Default::default()
        }
    })
}

fn request() -> impl Strategy<Value = Vec<ProcessorSpec>> {
    prop::collection::vec(spec(), 0..6)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: the same inputs always give the same assignment
    #[test]
    fn prop_mapping_is_deterministic(available in inventory(), requested in request()) {
        let first = map_components::<ProcessorMatcher>(&requested, &available);
        let second = map_components::<ProcessorMatcher>(&requested, &available);

        prop_assert_eq!(first, second);
    }

    /// Property: every pair satisfies its spec and nothing is used twice
    #[test]
    fn prop_assignment_is_sound(available in inventory(), requested in request()) {
        let mapping = map_components::<ProcessorMatcher>(&requested, &available);

        let specs: BTreeSet<usize> = mapping.iter().map(|(index, _)| *index).collect();
        let components: BTreeSet<&ComponentId> = mapping.iter().map(|(_, c)| &c.id).collect();
        prop_assert_eq!(specs.len(), mapping.len());
        prop_assert_eq!(components.len(), mapping.len());
        prop_assert!(mapping.len() <= requested.len().min(available.len()));

        for (index, component) in &mapping {
            prop_assert!(ProcessorMatcher::accepts(&requested[*index], component));
            if let Some(pinned) = &requested[*index].resource {
                prop_assert_eq!(pinned, &component.id);
            }
        }
    }

    /// Property: mapping only what was mapped reproduces the same assignment
    #[test]
    fn prop_remapping_is_idempotent(available in inventory(), requested in request()) {
        let mapping = map_components::<ProcessorMatcher>(&requested, &available);

        let mut mapped: Vec<usize> = mapping.iter().map(|(index, _)| *index).collect();
        mapped.sort_unstable();
        let specs: Vec<ProcessorSpec> = mapped.iter().map(|&index| requested[index].clone()).collect();
        let components: Vec<Processor> = mapping.iter().map(|(_, c)| c.clone()).collect();

        let remapped: BTreeSet<(usize, ComponentId)> = map_components::<ProcessorMatcher>(&specs, &components)
            .into_iter()
            .map(|(index, c)| (mapped[index], c.id))
            .collect();
        let original: BTreeSet<(usize, ComponentId)> =
            mapping.into_iter().map(|(index, c)| (index, c.id)).collect();

        prop_assert_eq!(remapped, original);
    }
}
