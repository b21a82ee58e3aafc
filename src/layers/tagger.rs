// Copyright (c) 2025 - Cowboy AI, Inc.
//! Tagger layer
//!
//! Properties such as `Description` or `AssetTag` belong to the pod
//! manager, not to the agent. On PATCH they are split off into the
//! [`TagStore`]; the agent only sees what it owns.
//!
//! ```text
//! PATCH {"AssetTag": "A-1", "Boot": {...}}
//!   ├─► TagStore   {"/AssetTag": "A-1"}
//!   └─► next       {"Boot": {...}}
//!
//! PATCH {"AssetTag": "A-1"}
//!   └─► TagStore, answered 204 here
//! ```

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::{Body, HttpMethod, Layer, LayerError, LayerRequest, Response};
use crate::tagging::{TagBundle, TagStore};

pub struct TaggerLayer {
    store: Arc<dyn TagStore>,
    taggable: Vec<String>,
    next: Arc<dyn Layer>,
}

impl TaggerLayer {
    pub fn new(store: Arc<dyn TagStore>, taggable: Vec<String>, next: Arc<dyn Layer>) -> Self {
        Self {
            store,
            taggable,
            next,
        }
    }

    /// Split taggable properties out of a copy of `body`
    fn split(&self, body: &Value) -> (TagBundle, Value) {
        let mut remainder = body.clone();
        let mut tags = TagBundle::new();
        for pointer in &self.taggable {
            if let Some(taken) = take_pointer(&mut remainder, pointer) {
                let text = match taken {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                tags.insert(pointer.clone(), text);
            }
        }
        (tags, remainder)
    }
}

#[async_trait]
impl Layer for TaggerLayer {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        let Body::Json(body) = &request.body else {
            return self.next.invoke(request).await;
        };
        if request.method != HttpMethod::Patch {
            return self.next.invoke(request).await;
        }

        let (tags, remainder) = self.split(body);
        if tags.is_empty() {
            return self.next.invoke(request).await;
        }

        let reference = request.reference();
        if is_empty_object(&remainder) {
            debug!(reference = %reference, count = tags.len(), "Patch fully handled by tags");
            self.store.tag_values(&reference, tags).await?;
            return Ok(Response::no_content());
        }

        let forwarded = LayerRequest {
            body: Body::Json(remainder),
            ..request.clone()
        };
        let response = self.next.invoke(&forwarded).await?;
        if response.is_success() {
            debug!(reference = %reference, count = tags.len(), "Storing tagged properties");
            self.store.tag_values(&reference, tags).await?;
        }
        Ok(response)
    }
}

/// Remove the value at a JSON pointer, pruning objects left empty
fn take_pointer(value: &mut Value, pointer: &str) -> Option<Value> {
    let rest = pointer.strip_prefix('/')?;
    let tokens: Vec<String> = rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();
    take_tokens(value.as_object_mut()?, &tokens)
}

fn take_tokens(map: &mut Map<String, Value>, tokens: &[String]) -> Option<Value> {
    let (head, rest) = tokens.split_first()?;
    if rest.is_empty() {
        return map.remove(head);
    }
    let child = map.get_mut(head)?.as_object_mut()?;
    let taken = take_tokens(child, rest)?;
    if child.is_empty() {
        map.remove(head);
    }
    Some(taken)
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}
