// Copyright (c) 2025 - Cowboy AI, Inc.
//! Unifier layer
//!
//! Down: canonical path → backing (service, path).
//! Up: backend body → canonical body.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{Body, Layer, LayerError, LayerRequest, Response};
use crate::unification::ResourceUnifier;

pub struct UnifierLayer {
    unifier: Arc<ResourceUnifier>,
    next: Arc<dyn Layer>,
}

impl UnifierLayer {
    pub fn new(unifier: Arc<ResourceUnifier>, next: Arc<dyn Layer>) -> Self {
        Self { unifier, next }
    }
}

#[async_trait]
impl Layer for UnifierLayer {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        let backing = self.unifier.deunify(request.service, &request.path);
        debug!(canonical = %request.path, backing = %backing, "De-unified request path");

        let forwarded = LayerRequest {
            service: backing.service,
            path: backing.path.clone(),
            ..request.clone()
        };
        let response = self.next.invoke(&forwarded).await?;
        if !response.is_success() {
            return Ok(response);
        }

        let unified = match response.body.as_json() {
            Some(body) => self.unifier.unify(backing.service, &backing.path, body)?,
            None => return Ok(response),
        };
        Ok(response.with_body(Body::Json(unified.body)))
    }
}
