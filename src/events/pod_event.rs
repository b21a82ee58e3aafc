// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pod Event Envelope
//!
//! Events are immutable facts named in the past tense of the Redfish
//! event registry (`ResourceAdded`, `ResourceUpdated`, ...). Every event
//! carries `event_version` so sinks can evolve their decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allocation::{ChangedEntity, CommitEvent};

/// Current envelope schema version
pub const EVENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PodEventType {
    ResourceAdded,
    ResourceRemoved,
    ResourceUpdated,
    StatusChange,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodEvent {
    pub event_id: Uuid,
    pub event_version: u32,
    pub event_type: PodEventType,
    /// Canonical path of the resource the event is about
    pub origin: String,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PodEvent {
    pub fn new(event_type: PodEventType, origin: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_version: EVENT_VERSION,
            event_type,
            origin: origin.into(),
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Translate a pool commit into `ResourceUpdated` events, one per changed entity
pub fn events_for_commit(canonical_root: &str, commit: &CommitEvent) -> Vec<PodEvent> {
    commit
        .changed
        .iter()
        .map(|entity| {
            let origin = match entity {
                ChangedEntity::ComposedNode(id) => format!("{}/Nodes/{}", canonical_root, id),
                ChangedEntity::ComputerSystem(id)
                | ChangedEntity::Component(_, id)
                | ChangedEntity::RemoteVolume(id)
                | ChangedEntity::StoragePool(id) => canonical_origin(canonical_root, id.as_str()),
            };
            PodEvent::new(PodEventType::ResourceUpdated, origin)
                .with_message(format!("pool version {}", commit.version))
        })
        .collect()
}

/// Ids already under `root` are kept; anything else is rebased beneath it
fn canonical_origin(root: &str, id: &str) -> String {
    let root = root.trim_end_matches('/');
    match id.strip_prefix(root) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => id.to_string(),
        _ => format!("{}/{}", root, id.trim_start_matches('/')),
    }
}
