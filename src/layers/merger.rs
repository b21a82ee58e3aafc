// Copyright (c) 2025 - Cowboy AI, Inc.
//! Merger layer: overlays stored tags onto successful GET responses

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{Body, HttpMethod, Layer, LayerError, LayerRequest, Response};
use crate::tagging::TagStore;

pub struct MergerLayer {
    store: Arc<dyn TagStore>,
    next: Arc<dyn Layer>,
}

impl MergerLayer {
    pub fn new(store: Arc<dyn TagStore>, next: Arc<dyn Layer>) -> Self {
        Self { store, next }
    }
}

#[async_trait]
impl Layer for MergerLayer {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        let response = self.next.invoke(request).await?;
        if request.method != HttpMethod::Get
            || !response.is_success()
            || response.body.as_json().is_none()
        {
            return Ok(response);
        }

        let tags = self.store.tagged_values(&request.reference()).await?;
        if tags.is_empty() {
            return Ok(response);
        }
        debug!(path = %request.path, count = tags.len(), "Merging tags into response");
        match response.body.as_json().map(|body| tags.overlay(body)) {
            Some(merged) => Ok(response.with_body(Body::Json(merged))),
            None => Ok(response),
        }
    }
}
