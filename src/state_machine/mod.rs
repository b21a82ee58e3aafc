// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machines
//!
//! Lifecycles are pure Mealy machines: a transition maps the current
//! state and an input to the next state plus an output, and performs no
//! side effects. The caller acts on the output.
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! [`TrackedMachine`] wraps a machine and keeps an audit trail of every
//! accepted step. Rejected steps leave both state and trail untouched.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use podm_composition::state_machine::*;
//!
//! let mut lifecycle = TrackedMachine::new(AllocationStage::Received);
//! lifecycle.step(AllocationStep::Validate, Utc::now()).unwrap();
//!
//! let output = lifecycle
//!     .step(AllocationStep::Fail("no system".into()), Utc::now())
//!     .unwrap();
//! assert_eq!(*lifecycle.state(), AllocationStage::Failed);
//! assert!(!output.release_required);
//! assert_eq!(lifecycle.history().len(), 2);
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod allocation_lifecycle;

pub use allocation_lifecycle::{AllocationStage, AllocationStep, StepOutput};

pub type TransitionResult<S> = Result<S, TransitionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} on {to}")]
    InvalidTransition { from: String, to: String },
}

/// Typed states driven by typed inputs
pub trait StateMachine: Sized + Clone {
    type Input;

    /// Use `()` when the machine has nothing to report
    type Output;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Inputs accepted from this state; empty unless the machine enumerates them
    fn valid_inputs(&self) -> Vec<Self::Input> {
        Vec::new()
    }
}

/// One accepted step
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub at: DateTime<Utc>,
}

/// A state machine plus the trail of steps it accepted
#[derive(Debug, Clone)]
pub struct TrackedMachine<M: StateMachine> {
    state: M,
    history: Vec<StepRecord<M, M::Input>>,
}

impl<M: StateMachine> TrackedMachine<M> {
    pub fn new(initial: M) -> Self {
        Self {
            state: initial,
            history: Vec::new(),
        }
    }

    /// Apply `input`; on success the step is appended to the history
    pub fn step(&mut self, input: M::Input, at: DateTime<Utc>) -> TransitionResult<M::Output> {
        let (next, output) = self.state.transition(&input)?;
        let from = std::mem::replace(&mut self.state, next.clone());
        self.history.push(StepRecord {
            from,
            to: next,
            input,
            at,
        });
        Ok(output)
    }

    pub fn state(&self) -> &M {
        &self.state
    }

    pub fn history(&self) -> &[StepRecord<M, M::Input>] {
        &self.history
    }
}
