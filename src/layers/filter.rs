// Copyright (c) 2025 - Cowboy AI, Inc.
//! Response filtering layer

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Body, JsonBodyFilter, Layer, LayerError, LayerRequest, Response};

/// Applies a [`JsonBodyFilter`] to every JSON response
///
/// A body that could not be parsed is replaced by an empty object rather
/// than leaking raw backend text. Transport failures are not touched.
pub struct FilterLayer {
    filter: JsonBodyFilter,
    next: Arc<dyn Layer>,
}

impl FilterLayer {
    pub fn new(filter: JsonBodyFilter, next: Arc<dyn Layer>) -> Self {
        Self { filter, next }
    }
}

#[async_trait]
impl Layer for FilterLayer {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        let response = self.next.invoke(request).await?;
        let replacement = match &response.body {
            Body::Json(value) if !self.filter.is_empty() => {
                debug!(path = %request.path, "Filtering response body");
                Some(Body::Json(self.filter.filter_body(&request.path, value)))
            }
            Body::Raw(raw) => {
                warn!(
                    service = %request.service,
                    path = %request.path,
                    bytes = raw.len(),
                    "Replacing unparseable response body with empty object"
                );
                Some(Body::Json(json!({})))
            }
            _ => None,
        };
        Ok(match replacement {
            Some(body) => response.with_body(body),
            None => response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServiceId;

    struct Fixed(Result<Response, fn() -> LayerError>);

    #[async_trait]
    impl Layer for Fixed {
        async fn invoke(&self, _request: &LayerRequest) -> Result<Response, LayerError> {
            match &self.0 {
                Ok(response) => Ok(response.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn layer(next: Fixed) -> FilterLayer {
        FilterLayer::new(JsonBodyFilter::from_rules(&["CHAPSecret"]), Arc::new(next))
    }

    #[tokio::test]
    async fn test_redacts_json_response() {
        let layer = layer(Fixed(Ok(Response::ok(json!({"CHAPSecret": "v", "x": 1})))));
        let response = layer
            .invoke(&LayerRequest::get(ServiceId::new(), "/redfish/v1/Targets/1"))
            .await
            .unwrap();
        assert_eq!(response.body, Body::Json(json!({"CHAPSecret": "", "x": 1})));
    }

    #[tokio::test]
    async fn test_raw_body_becomes_empty_object() {
        let layer = layer(Fixed(Ok(Response::new(200, Body::Raw("<html>".into())))));
        let response = layer
            .invoke(&LayerRequest::get(ServiceId::new(), "/redfish/v1/Targets/1"))
            .await
            .unwrap();
        assert_eq!(response.body, Body::Json(json!({})));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let layer = layer(Fixed(Err(|| LayerError::Transport {
            service: ServiceId::from_uuid(uuid::Uuid::nil()),
            message: "connection refused".into(),
        })));
        let err = layer
            .invoke(&LayerRequest::get(ServiceId::new(), "/redfish/v1/Targets/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LayerError::Transport { .. }));
    }
}
