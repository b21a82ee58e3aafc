// Copyright (c) 2025 - Cowboy AI, Inc.
//! Allocation Lifecycle State Machine
//!
//! Tracks one composition request from receipt to an assembled node.
//!
//! # States
//!
//! ```text
//! Received ─► Validated ─► ResourcesFound ─► Allocated ─► AssemblyTasksQueued ─► Assembled
//!     │            │              │              │                 │
//!     └────────────┴──────────────┴──────────────┴─────────────────┴──► Failed
//! ```
//!
//! `Assembled` and `Failed` are terminal.
//!
//! # Outputs
//!
//! Entering `Failed` reports whether resources had already been reserved
//! and therefore must be released.

use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationStage {
    Received,
    Validated,
    ResourcesFound,
    Allocated,
    AssemblyTasksQueued,
    Assembled,
    Failed,
}

impl AllocationStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AllocationStage::Assembled | AllocationStage::Failed)
    }

    /// Whether components were reserved in this stage
    pub fn holds_reservations(&self) -> bool {
        matches!(
            self,
            AllocationStage::Allocated | AllocationStage::AssemblyTasksQueued
        )
    }
}

impl fmt::Display for AllocationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lifecycle step (FSM input)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationStep {
    Validate,
    FindResources,
    Allocate,
    QueueAssemblyTasks,
    Assemble,
    Fail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutput {
    /// Reserved components must be released
    pub release_required: bool,
}

impl StateMachine for AllocationStage {
    type Input = AllocationStep;
    type Output = StepOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use AllocationStage::*;
        use AllocationStep::*;

        match (self, input) {
            (stage, Fail(_)) if !stage.is_terminal() => Ok((
                Failed,
                StepOutput {
                    release_required: stage.holds_reservations(),
                },
            )),
            (Received, Validate) => Ok((Validated, StepOutput::default())),
            (Validated, FindResources) => Ok((ResourcesFound, StepOutput::default())),
            (ResourcesFound, Allocate) => Ok((Allocated, StepOutput::default())),
            (Allocated, QueueAssemblyTasks) => Ok((AssemblyTasksQueued, StepOutput::default())),
            (AssemblyTasksQueued, Assemble) => Ok((Assembled, StepOutput::default())),
            (stage, step) => Err(TransitionError::InvalidTransition {
                from: stage.to_string(),
                to: format!("{:?}", step),
            }),
        }
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        use AllocationStage::*;
        use AllocationStep::*;

        let next = match self {
            Received => Validate,
            Validated => FindResources,
            ResourcesFound => Allocate,
            Allocated => QueueAssemblyTasks,
            AssemblyTasksQueued => Assemble,
            Assembled | Failed => return Vec::new(),
        };
        vec![next, Fail(String::new())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::TrackedMachine;
    use chrono::Utc;

    #[test]
    fn test_happy_path_reaches_assembled() {
        let mut fsm = TrackedMachine::new(AllocationStage::Received);
        for step in [
            AllocationStep::Validate,
            AllocationStep::FindResources,
            AllocationStep::Allocate,
            AllocationStep::QueueAssemblyTasks,
            AllocationStep::Assemble,
        ] {
            fsm.step(step, Utc::now()).unwrap();
        }
        assert_eq!(*fsm.state(), AllocationStage::Assembled);
        assert_eq!(fsm.history().len(), 5);
    }

    #[test]
    fn test_failure_after_allocation_requires_release() {
        let (_, output) = AllocationStage::Allocated
            .transition(&AllocationStep::Fail("task failed".into()))
            .unwrap();
        assert!(output.release_required);

        let (_, output) = AllocationStage::Validated
            .transition(&AllocationStep::Fail("no system".into()))
            .unwrap();
        assert!(!output.release_required);
    }

    #[test]
    fn test_steps_cannot_be_skipped() {
        assert!(!AllocationStage::Received.can_transition(&AllocationStep::Allocate));
        assert!(!AllocationStage::Validated.can_transition(&AllocationStep::Assemble));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for stage in [AllocationStage::Assembled, AllocationStage::Failed] {
            assert!(stage.valid_inputs().is_empty());
            assert!(!stage.can_transition(&AllocationStep::Fail("again".into())));
        }
    }
}
