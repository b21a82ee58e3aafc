// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pod manager composition core
//!
//! Sits between clients and the management agents of a rack-scale pod:
//! requests flow through a layer chain that unifies backend resources into
//! one canonical namespace, and composition requests are turned into
//! composed nodes bound to discovered hardware.
//!
//! # Modules
//!
//! - [`unification`] - pattern language and the canonical path registry
//! - [`layers`] - the interceptor chain in front of every agent
//! - [`tagging`] - locally owned properties merged into agent resources
//! - [`crawler`] - discovery across all agents
//! - [`allocation`] - matching, strategies, allocation and assembly
//! - [`events`] - subscriptions and event delivery

pub mod allocation;
pub mod config;
pub mod crawler;
pub mod domain;
pub mod errors;
pub mod events;
pub mod layers;
pub mod retry;
pub mod state_machine;
pub mod tagging;
pub mod unification;

// Re-export commonly used types
pub use allocation::{AllocationError, InMemoryResourcePool, NodeAllocator, NodeAssembler, ResourcePool};
pub use config::{ConfigError, PodmConfig};
pub use crawler::{CrawlReport, Crawler};
pub use domain::{ComposedNode, RequestedNode, ResourceReference, ServiceId};
pub use errors::{PodmError, PodmResult};
pub use events::{EventPublisher, PodEvent};
pub use layers::{Layer, LayerChain, LayerRequest, Response};
pub use retry::RetryPolicy;
pub use tagging::{TagBundle, TagStore};
pub use unification::{PatternSet, ResourceUnifier, UnificationPattern};
