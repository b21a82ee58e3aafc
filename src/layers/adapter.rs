// Copyright (c) 2025 - Cowboy AI, Inc.
//! Backend Adapter
//!
//! The terminal layer. Everything below it is a [`BackendClient`]: the
//! in-memory agent used by tests and discovery dry runs, or the HTTP
//! client talking to real Redfish agents (feature `http`).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Body, HttpMethod, Layer, LayerError, LayerRequest, Response};
use crate::domain::{ResourceReference, ServiceId};

/// Transport to the management agents
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn execute(&self, request: &LayerRequest) -> Result<Response, LayerError>;
}

pub struct AdapterLayer {
    client: Arc<dyn BackendClient>,
}

impl AdapterLayer {
    pub fn new(client: Arc<dyn BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Layer for AdapterLayer {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        debug!(
            service = %request.service,
            method = %request.method,
            path = %request.path,
            "Forwarding request to backend"
        );
        self.client.execute(request).await
    }
}

#[derive(Debug, Default)]
struct AgentState {
    resources: HashMap<ResourceReference, Body>,
    unreachable: HashSet<ServiceId>,
    requests: Vec<LayerRequest>,
}

/// Agents simulated in memory
///
/// GET returns the stored body or 404, PATCH merges top-level keys into a
/// stored JSON object, DELETE removes. Requests are recorded.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<AgentState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, service: ServiceId, path: &str, body: Value) {
        self.insert_body(service, path, Body::Json(body)).await;
    }

    /// Store a payload that is not valid JSON
    pub async fn insert_raw(&self, service: ServiceId, path: &str, raw: impl Into<String>) {
        self.insert_body(service, path, Body::Raw(raw.into())).await;
    }

    async fn insert_body(&self, service: ServiceId, path: &str, body: Body) {
        self.state
            .write()
            .await
            .resources
            .insert(ResourceReference::new(service, path), body);
    }

    /// Every later request to `service` fails with a transport error
    pub async fn set_unreachable(&self, service: ServiceId) {
        self.state.write().await.unreachable.insert(service);
    }

    pub async fn requests(&self) -> Vec<LayerRequest> {
        self.state.read().await.requests.clone()
    }

    pub async fn request_count(&self, service: ServiceId, path: &str) -> usize {
        let reference = ResourceReference::new(service, path);
        self.state
            .read()
            .await
            .requests
            .iter()
            .filter(|r| r.reference() == reference)
            .count()
    }
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    async fn execute(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        let mut state = self.state.write().await;
        state.requests.push(request.clone());
        if state.unreachable.contains(&request.service) {
            return Err(LayerError::Transport {
                service: request.service,
                message: "connection refused".to_string(),
            });
        }

        let reference = request.reference();
        match request.method {
            HttpMethod::Get => Ok(match state.resources.get(&reference) {
                Some(body) => Response::new(200, body.clone()),
                None => Response::not_found(),
            }),
            HttpMethod::Patch => {
                let Some(Body::Json(Value::Object(stored))) = state.resources.get_mut(&reference) else {
                    return Ok(Response::not_found());
                };
                if let Body::Json(Value::Object(patch)) = &request.body {
                    for (key, value) in patch {
                        stored.insert(key.clone(), value.clone());
                    }
                }
                Ok(Response::ok(Value::Object(stored.clone())))
            }
            HttpMethod::Delete => Ok(match state.resources.remove(&reference) {
                Some(_) => Response::no_content(),
                None => Response::not_found(),
            }),
            HttpMethod::Post | HttpMethod::Put => Ok(Response::new(405, Body::Empty)),
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpBackendClient;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use reqwest::{Client, Method};
    use std::time::Duration;
    use tracing::info;

    /// Redfish agents reached over HTTP
    pub struct HttpBackendClient {
        client: Client,
        endpoints: HashMap<ServiceId, String>,
    }

    impl HttpBackendClient {
        pub fn new(timeout: Duration) -> Result<Self, LayerError> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| LayerError::Backend(format!("Failed to create HTTP client: {}", e)))?;
            Ok(Self {
                client,
                endpoints: HashMap::new(),
            })
        }

        /// Register the base URL (scheme and authority) of an agent
        pub fn register(&mut self, service: ServiceId, base_url: impl Into<String>) {
            let base_url = base_url.into();
            info!(service = %service, %base_url, "Registered Redfish agent");
            self.endpoints.insert(service, base_url.trim_end_matches('/').to_string());
        }

        fn method(method: HttpMethod) -> Method {
            match method {
                HttpMethod::Get => Method::GET,
                HttpMethod::Post => Method::POST,
                HttpMethod::Put => Method::PUT,
                HttpMethod::Patch => Method::PATCH,
                HttpMethod::Delete => Method::DELETE,
            }
        }
    }

    #[async_trait]
    impl BackendClient for HttpBackendClient {
        async fn execute(&self, request: &LayerRequest) -> Result<Response, LayerError> {
            let base = self
                .endpoints
                .get(&request.service)
                .ok_or(LayerError::UnknownService(request.service))?;
            let url = format!("{}{}", base, request.path);

            let mut builder = self
                .client
                .request(Self::method(request.method), &url)
                .query(&request.params);
            for (name, value) in request.headers.iter() {
                builder = builder.header(name, value);
            }
            builder = match &request.body {
                Body::Json(value) => builder.json(value),
                Body::Raw(raw) => builder.body(raw.clone()),
                Body::Empty => builder,
            };

            let transport = |e: reqwest::Error| LayerError::Transport {
                service: request.service,
                message: e.to_string(),
            };
            let reply = builder.send().await.map_err(transport)?;
            let status = reply.status().as_u16();
            let mut headers = crate::layers::Headers::new();
            for (name, value) in reply.headers() {
                if let Ok(value) = value.to_str() {
                    headers.insert(name.as_str(), value);
                }
            }
            let text = reply.text().await.map_err(transport)?;
            let body = if text.trim().is_empty() {
                Body::Empty
            } else {
                serde_json::from_str(&text).map(Body::Json).unwrap_or(Body::Raw(text))
            };

            Ok(Response {
                status,
                headers,
                body,
            })
        }
    }
}
