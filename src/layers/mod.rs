// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Manager Layers
//!
//! Every client request reaching a backend agent passes through a fixed
//! interceptor chain. A layer may rewrite the request on the way down and
//! the response on the way up.
//!
//! ```text
//! client
//!   │
//!   ▼
//! RequestEnhancer   adds Cache-Control max-stale for global resources
//! FilterLayer       redacts response fields (JsonBodyFilter)
//! TaggerLayer       keeps locally owned properties out of the backend
//! MergerLayer       overlays stored tags onto responses
//! UnifierLayer      canonical path ⇄ backend path, body rewriting
//! AdapterLayer      terminal, talks to the BackendClient
//! ```
//!
//! # Contract
//!
//! Layers receive the request by shared reference and never mutate it;
//! a changed request is always a fresh copy handed to the next layer.
//! Errors travel up the chain unchanged unless a layer documents a
//! fallback.

pub mod adapter;
pub mod enhancer;
pub mod filter;
pub mod json_filter;
pub mod merger;
pub mod tagger;
pub mod unifier;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{ResourceReference, ServiceId};
use crate::tagging::{TagError, TagStore};
use crate::unification::{MatchingPattern, ResourceUnifier, UnificationError};

pub use adapter::{AdapterLayer, BackendClient, InMemoryBackend};
#[cfg(feature = "http")]
pub use adapter::HttpBackendClient;
pub use enhancer::{RequestEnhancer, DEFAULT_MAX_STALE_SECONDS};
pub use filter::FilterLayer;
pub use json_filter::{FilterRule, JsonBodyFilter};
pub use merger::MergerLayer;
pub use tagger::TaggerLayer;
pub use unifier::UnifierLayer;

pub const CACHE_CONTROL: &str = "cache-control";

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("service {service} unreachable: {message}")]
    Transport { service: ServiceId, message: String },

    #[error("unknown service {0}")]
    UnknownService(ServiceId),

    /// The backend client itself could not be set up
    #[error("backend client unavailable: {0}")]
    Backend(String),

    #[error("unification failed: {0}")]
    Unification(#[from] UnificationError),

    #[error("tag storage failed: {0}")]
    Tags(#[from] TagError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LayerError {
    fn from(err: serde_json::Error) -> Self {
        LayerError::Serialization(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive header map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Copy with one header added
    pub fn with(&self, name: &str, value: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.insert(name, value);
        copy
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Headers {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.insert(name, value);
        }
        headers
    }
}

/// Request or response payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    /// Payload that could not be parsed as JSON
    Raw(String),
}

impl Body {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// One request travelling down the chain
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRequest {
    pub service: ServiceId,
    pub path: String,
    pub method: HttpMethod,
    pub headers: Headers,
    pub body: Body,
    pub params: BTreeMap<String, String>,
}

impl LayerRequest {
    pub fn new(service: ServiceId, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            service,
            path: path.into(),
            method,
            headers: Headers::new(),
            body: Body::Empty,
            params: BTreeMap::new(),
        }
    }

    pub fn get(service: ServiceId, path: impl Into<String>) -> Self {
        Self::new(service, HttpMethod::Get, path)
    }

    pub fn patch(service: ServiceId, path: impl Into<String>, body: Value) -> Self {
        Self::new(service, HttpMethod::Patch, path).with_body(Body::Json(body))
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn reference(&self) -> ResourceReference {
        ResourceReference::new(self.service, &self.path)
    }
}

/// Response travelling up the chain
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

impl Response {
    pub fn new(status: u16, body: Body) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, Body::Json(body))
    }

    pub fn no_content() -> Self {
        Self::new(204, Body::Empty)
    }

    pub fn not_found() -> Self {
        Self::new(404, Body::Empty)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }
}

/// One interceptor in the chain
#[async_trait]
pub trait Layer: Send + Sync {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError>;
}

#[async_trait]
impl<L: Layer + ?Sized> Layer for Arc<L> {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        (**self).invoke(request).await
    }
}

/// The assembled chain, entered at the request enhancer
#[derive(Clone)]
pub struct LayerChain {
    head: Arc<dyn Layer>,
}

impl LayerChain {
    pub fn builder(backend: Arc<dyn BackendClient>) -> LayerChainBuilder {
        LayerChainBuilder::new(backend)
    }
}

#[async_trait]
impl Layer for LayerChain {
    async fn invoke(&self, request: &LayerRequest) -> Result<Response, LayerError> {
        self.head.invoke(request).await
    }
}

/// Builds the chain in its fixed order; optional pieces default to no-ops
pub struct LayerChainBuilder {
    backend: Arc<dyn BackendClient>,
    global_resources: Vec<MatchingPattern>,
    max_stale_seconds: u64,
    body_filter: JsonBodyFilter,
    tags: Option<(Arc<dyn TagStore>, Vec<String>)>,
    unifier: Option<Arc<ResourceUnifier>>,
}

impl LayerChainBuilder {
    fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self {
            backend,
            global_resources: Vec::new(),
            max_stale_seconds: DEFAULT_MAX_STALE_SECONDS,
            body_filter: JsonBodyFilter::default(),
            tags: None,
            unifier: None,
        }
    }

    pub fn global_resources(mut self, patterns: Vec<MatchingPattern>, max_stale_seconds: u64) -> Self {
        self.global_resources = patterns;
        self.max_stale_seconds = max_stale_seconds;
        self
    }

    pub fn body_filter(mut self, filter: JsonBodyFilter) -> Self {
        self.body_filter = filter;
        self
    }

    pub fn tags(mut self, store: Arc<dyn TagStore>, taggable_properties: Vec<String>) -> Self {
        self.tags = Some((store, taggable_properties));
        self
    }

    pub fn unifier(mut self, unifier: Arc<ResourceUnifier>) -> Self {
        self.unifier = Some(unifier);
        self
    }

    pub fn build(self) -> LayerChain {
        let mut next: Arc<dyn Layer> = Arc::new(AdapterLayer::new(self.backend));
        if let Some(unifier) = self.unifier {
            next = Arc::new(UnifierLayer::new(unifier, next));
        }
        if let Some((store, taggable)) = self.tags {
            next = Arc::new(MergerLayer::new(store.clone(), next));
            next = Arc::new(TaggerLayer::new(store, taggable, next));
        }
        next = Arc::new(FilterLayer::new(self.body_filter, next));
        next = Arc::new(RequestEnhancer::new(
            self.global_resources,
            self.max_stale_seconds,
            next,
        ));
        LayerChain { head: next }
    }
}
