// Copyright (c) 2025 - Cowboy AI, Inc.
//! Request enhancement: stale-tolerant caching for slowly changing resources

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{HttpMethod, Layer, LayerError, LayerRequest, Response, CACHE_CONTROL};
use crate::unification::MatchingPattern;

pub const DEFAULT_MAX_STALE_SECONDS: u64 = 666;

/// Adds `Cache-Control: max-stale=<n>` to GETs of global resources
///
/// A client supplied Cache-Control always wins.
pub struct RequestEnhancer {
    global_resources: Vec<MatchingPattern>,
    max_stale_seconds: u64,
    next: Arc<dyn Layer>,
}

impl RequestEnhancer {
    pub fn new(global_resources: Vec<MatchingPattern>, max_stale_seconds: u64, next: Arc<dyn Layer>) -> Self {
        Self {
            global_resources,
            max_stale_seconds,
            next,
        }
    }

    fn is_global(&self, path: &str) -> bool {
        self.global_resources.iter().any(|p| p.matches(path))
    }
}

#[async_trait]
impl Layer for RequestEnhancer {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        if request.method != HttpMethod::Get
            || request.headers.contains(CACHE_CONTROL)
            || !self.is_global(&request.path)
        {
            return self.next.invoke(request).await;
        }

        let directive = format!("max-stale={}", self.max_stale_seconds);
        debug!(path = %request.path, %directive, "Enhancing request for global resource");
        let enhanced = LayerRequest {
            headers: request.headers.with(CACHE_CONTROL, directive),
            ..request.clone()
        };
        self.next.invoke(&enhanced).await
    }
}
