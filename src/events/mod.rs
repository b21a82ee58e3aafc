// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pod Events
//!
//! Notifications about pod resources, pushed to subscribed destinations.
//!
//! # Event Flow
//!
//! ```text
//! pool commit ─► CommitEvent ─► events_for_commit ─► EventPublisher::publish
//!                                                        │
//!                                       per subscription ▼
//!                                 EventSink::deliver (retry with backoff)
//!                                       │
//!                                       └─ exhausted ─► subscription dropped
//! ```
//!
//! # Module Organization
//!
//! - [`pod_event`] - the event envelope and its types
//! - [`publisher`] - subscriptions and delivery

pub mod pod_event;
pub mod publisher;

pub use pod_event::{events_for_commit, PodEvent, PodEventType, EVENT_VERSION};
pub use publisher::{DeliveryError, DeliveryReport, EventPublisher, EventSink, Subscription};
