// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Tags
//!
//! Opaque key/value metadata attached to a [`ResourceReference`]. Tags let
//! the pod manager own properties (descriptions, asset tags) that the
//! backend agent cannot store, and carry bookkeeping across layers.
//!
//! # Storage
//!
//! A bundle is stored as one JSON object per reference. Missing, null,
//! empty and `{}` storage all read back as an empty bundle; callers never
//! see an absent bundle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::ResourceReference;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("stored tags for {reference} are not a JSON object of strings: {message}")]
    Corrupt {
        reference: ResourceReference,
        message: String,
    },
}

/// Mapping from tag key to tag value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagBundle(BTreeMap<String, String>);

impl TagBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode stored JSON, treating absent or empty storage as no tags
    pub fn from_json(stored: Option<&str>) -> Result<Self, serde_json::Error> {
        match stored.map(str::trim) {
            None | Some("") | Some("null") => Ok(Self::default()),
            Some(text) => {
                let bundle: Option<TagBundle> = serde_json::from_str(text)?;
                Ok(bundle.unwrap_or_default())
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Overwrite keys present in `other`
    pub fn merge(&mut self, other: TagBundle) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay tags whose keys are JSON pointers onto a copy of `body`
    ///
    /// Missing intermediate objects are created. Keys that are not
    /// pointers, or that cross a non-object value, are skipped.
    pub fn overlay(&self, body: &Value) -> Value {
        let mut out = body.clone();
        for (pointer, value) in self.iter() {
            set_pointer(&mut out, pointer, Value::String(value.to_string()));
        }
        out
    }
}

impl FromIterator<(String, String)> for TagBundle {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn set_pointer(target: &mut Value, pointer: &str, value: Value) -> bool {
    let Some(rest) = pointer.strip_prefix('/') else {
        return false;
    };
    let tokens: Vec<String> = rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();
    let Some((last, parents)) = tokens.split_last() else {
        return false;
    };
    let mut current = target;
    for token in parents {
        current = match current {
            Value::Object(map) => map
                .entry(token.clone())
                .or_insert_with(|| Value::Object(Default::default())),
            _ => return false,
        };
    }
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        _ => false,
    }
}

/// Persistent tag storage keyed by resource reference
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Tags for a resource; empty when nothing is stored
    async fn tagged_values(&self, reference: &ResourceReference) -> Result<TagBundle, TagError>;

    /// Merge `tags` into the stored bundle
    async fn tag_values(
        &self,
        reference: &ResourceReference,
        tags: TagBundle,
    ) -> Result<(), TagError>;

    /// Drop every tag of a resource
    async fn remove_all(&self, reference: &ResourceReference) -> Result<(), TagError>;
}

/// Process-local [`TagStore`] keeping the serialized form
#[derive(Debug, Default)]
pub struct InMemoryTagStore {
    stored: RwLock<HashMap<ResourceReference, String>>,
}

impl InMemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw stored text, as a persistence layer would hold it
    pub async fn insert_raw(&self, reference: ResourceReference, stored: impl Into<String>) {
        self.stored.write().await.insert(reference, stored.into());
    }
}

#[async_trait]
impl TagStore for InMemoryTagStore {
    async fn tagged_values(&self, reference: &ResourceReference) -> Result<TagBundle, TagError> {
        let stored = self.stored.read().await;
        TagBundle::from_json(stored.get(reference).map(String::as_str)).map_err(|e| {
            TagError::Corrupt {
                reference: reference.clone(),
                message: e.to_string(),
            }
        })
    }

    async fn tag_values(
        &self,
        reference: &ResourceReference,
        tags: TagBundle,
    ) -> Result<(), TagError> {
        let mut stored = self.stored.write().await;
        let mut bundle = TagBundle::from_json(stored.get(reference).map(String::as_str)).map_err(|e| {
            TagError::Corrupt {
                reference: reference.clone(),
                message: e.to_string(),
            }
        })?;
        debug!(reference = %reference, count = tags.len(), "Tagging resource");
        bundle.merge(tags);
        stored.insert(reference.clone(), bundle.to_json());
        Ok(())
    }

    async fn remove_all(&self, reference: &ResourceReference) -> Result<(), TagError> {
        self.stored.write().await.remove(reference);
        Ok(())
    }
}
