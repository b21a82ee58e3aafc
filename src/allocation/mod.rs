// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Allocation
//!
//! Turns a [`RequestedNode`](crate::domain::RequestedNode) into a
//! [`ComposedNode`](crate::domain::ComposedNode) bound to real inventory.
//!
//! # Flow
//!
//! ```text
//! request ─► select_strategy ─► validate ─► find_computer_system
//!                                                 │
//!                                                 ▼
//!           commit ◄─ default tasks ◄─ allocate_with_computer_system
//!             │
//!             └─ conflict ─► retry the whole unit from a fresh snapshot
//! ```
//!
//! The resulting node is `Allocated` with a task list; [`NodeAssembler`]
//! runs the tasks.
//!
//! # Modules
//!
//! - [`matching`] - greedy per-kind constraint matchers
//! - [`validation`] - structural request checks
//! - [`strategy`] - local and remote-drive strategies
//! - [`pool`] - versioned resource pool with optimistic commits
//! - [`allocator`] - retried allocation and decomposition
//! - [`assembler`] - ordered task execution with rollback

pub mod allocator;
pub mod assembler;
pub mod matching;
pub mod pool;
pub mod strategy;
pub mod validation;

pub use allocator::NodeAllocator;
pub use assembler::{NodeAssembler, TaskError, TaskExecutor};
pub use matching::{
    map_components, ComponentMatcher, EthernetInterfaceMatcher, Identified, LocalDriveMatcher,
    MemoryMatcher, ProcessorMatcher,
};
pub use pool::{
    ChangedEntity, CommitEvent, CommitHook, InMemoryResourcePool, PersistenceError, PoolSnapshot,
    PoolTransaction, ResourcePool,
};
pub use strategy::{
    find_computer_system, select_strategy, AllocationStrategy, LocalAllocationStrategy,
    RemoteDriveAllocationStrategy, SystemSelection,
};
pub use validation::{RequestedNodeValidator, Violation, Violations};

use thiserror::Error;
use uuid::Uuid;

use crate::domain::ComposedNodeState;
use crate::retry::RetryError;
use crate::state_machine::TransitionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("invalid request: {0}")]
    Validation(Violations),

    #[error("resources not found: {0}")]
    ResourceNotFound(String),

    #[error("composed node {0} not found")]
    NodeNotFound(Uuid),

    #[error("composed node {node} is {state}, expected {expected}")]
    InvalidState {
        node: Uuid,
        state: ComposedNodeState,
        expected: ComposedNodeState,
    },

    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("gave up after {attempts} attempts: {last}")]
    NoRetriesLeft { attempts: u32, last: PersistenceError },

    #[error("assembly task {task} failed: {message}")]
    Assembly { task: &'static str, message: String },

    #[error("lifecycle error: {0}")]
    Transition(#[from] TransitionError),
}

impl AllocationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AllocationError::Persistence(e) if e.is_retryable())
    }

    /// Status code the REST surface answers with
    pub fn http_status(&self) -> u16 {
        match self {
            AllocationError::Validation(_) => 400,
            AllocationError::NodeNotFound(_) => 404,
            AllocationError::ResourceNotFound(_) | AllocationError::InvalidState { .. } => 409,
            AllocationError::NoRetriesLeft { .. } => 503,
            AllocationError::Persistence(_)
            | AllocationError::Assembly { .. }
            | AllocationError::Transition(_) => 500,
        }
    }

    /// Message safe to return to a client; server faults stay generic
    pub fn client_message(&self) -> String {
        match self.http_status() {
            500 => "Internal error while composing the node".to_string(),
            503 => "Resource pool is busy, try again later".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<RetryError<AllocationError>> for AllocationError {
    fn from(err: RetryError<AllocationError>) -> Self {
        match err {
            RetryError::Fatal(e) => e,
            RetryError::NoRetriesLeft {
                attempts,
                last: AllocationError::Persistence(last),
            } => AllocationError::NoRetriesLeft { attempts, last },
            RetryError::NoRetriesLeft { last, .. } => last,
        }
    }
}
