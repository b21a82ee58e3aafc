// Copyright (c) 2025 - Cowboy AI, Inc.
//! Layer Chain Integration Tests
//!
//! Drives the full Enhancer → Filter → Tagger → Merger → Unifier → Adapter
//! chain, wired from the default configuration, against in-memory agents.

mod fixtures;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

use fixtures::*;
use podm_composition::layers::{
    Headers, HttpMethod, InMemoryBackend, Layer, LayerChain, LayerError, LayerRequest, CACHE_CONTROL,
};
use podm_composition::tagging::InMemoryTagStore;
use podm_composition::PodmConfig;

async fn chain() -> (LayerChain, Arc<InMemoryBackend>) {
    let backend = Arc::new(InMemoryBackend::new());
    populate_agent(&backend, service_a(), "uuid-a").await;
    let chain = PodmConfig::default()
        .layer_chain(backend.clone(), Arc::new(InMemoryTagStore::new()), unifier())
        .expect("default configuration wires a chain");
    (chain, backend)
}

async fn last_forwarded(backend: &InMemoryBackend) -> LayerRequest {
    backend
        .requests()
        .await
        .pop()
        .expect("at least one request reached the backend")
}

// ============================================================================
// Cache-Control enhancement
// ============================================================================

#[tokio::test]
async fn test_global_resource_gains_max_stale() {
    let (chain, backend) = chain().await;

    let response = chain
        .invoke(&LayerRequest::get(service_a(), "/redfish/v1/Chassis/1"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(last_forwarded(&backend).await.headers.get(CACHE_CONTROL), Some("max-stale=666"));
    assert_eq!(response.body.as_json().unwrap()["Id"], json!("rack-uuid-a"));
}

#[tokio::test]
async fn test_client_cache_control_is_not_overridden() {
    let (chain, backend) = chain().await;
    let request = LayerRequest::get(service_a(), "/redfish/v1/Chassis/1")
        .with_headers(Headers::from([("Cache-Control", "no-cache")]));

    chain.invoke(&request).await.unwrap();

    assert_eq!(last_forwarded(&backend).await.headers.get(CACHE_CONTROL), Some("no-cache"));
    assert_eq!(request.headers.get(CACHE_CONTROL), Some("no-cache"));
}

#[tokio::test]
async fn test_non_global_resource_never_gains_header() {
    let (chain, backend) = chain().await;

    chain
        .invoke(&LayerRequest::get(service_a(), "/redfish/v1/Systems/1"))
        .await
        .unwrap();

    assert!(!last_forwarded(&backend).await.headers.contains(CACHE_CONTROL));
}

// ============================================================================
// Redaction
// ============================================================================

#[tokio::test]
async fn test_password_is_cleared_not_removed() {
    let (chain, _) = chain().await;

    let response = chain
        .invoke(&LayerRequest::get(service_a(), "/redfish/v1/Managers/1"))
        .await
        .unwrap();

    let body = response.body.as_json().unwrap();
    assert_eq!(body["Password"], json!(""));
    assert_eq!(body["Description"], json!("BMC"));
}

// ============================================================================
// Tagging and merging
// ============================================================================

#[tokio::test]
async fn test_tag_only_patch_is_answered_locally() {
    let (chain, backend) = chain().await;
    let path = "/redfish/v1/Managers/1";

    let response = chain
        .invoke(&LayerRequest::patch(service_a(), path, json!({"Description": "rack 7 BMC"})))
        .await
        .unwrap();

    assert_eq!(response.status, 204);
    assert_eq!(backend.request_count(service_a(), path).await, 0);

    let response = chain.invoke(&LayerRequest::get(service_a(), path)).await.unwrap();
    assert_eq!(response.body.as_json().unwrap()["Description"], json!("rack 7 BMC"));
}

#[tokio::test]
async fn test_mixed_patch_forwards_only_backend_properties() {
    let (chain, backend) = chain().await;
    let path = "/redfish/v1/Systems/1";

    let response = chain
        .invoke(&LayerRequest::patch(
            service_a(),
            path,
            json!({"AssetTag": "A-17", "Name": "renamed"}),
        ))
        .await
        .unwrap();
    assert!(response.is_success());

    let forwarded = last_forwarded(&backend).await;
    assert_eq!(forwarded.method, HttpMethod::Patch);
    assert_eq!(forwarded.body.as_json(), Some(&json!({"Name": "renamed"})));

    let body = chain
        .invoke(&LayerRequest::get(service_a(), path))
        .await
        .unwrap()
        .body
        .as_json()
        .cloned()
        .unwrap();
    assert_eq!(body["AssetTag"], json!("A-17"));
    assert_eq!(body["Name"], json!("renamed"));
}

// ============================================================================
// Unification through the chain
// ============================================================================

#[tokio::test]
async fn test_canonical_path_reaches_backend_path() {
    let (chain, backend) = chain().await;
    chain
        .invoke(&LayerRequest::get(service_a(), "/redfish/v1/Systems/1"))
        .await
        .unwrap();

    let response = chain
        .invoke(&LayerRequest::get(service_a(), "/redfish/v1/Systems/uuid-a"))
        .await
        .unwrap();

    assert_eq!(last_forwarded(&backend).await.path, "/redfish/v1/Systems/1");
    let body = response.body.as_json().unwrap();
    assert_eq!(body["@odata.id"], json!("/redfish/v1/Systems/uuid-a"));
    assert_eq!(body["Id"], json!("uuid-a"));
    assert_eq!(
        body["Processors"]["@odata.id"],
        json!("/redfish/v1/Systems/uuid-a/Processors")
    );
}

#[tokio::test]
async fn test_transport_error_surfaces() {
    let (chain, backend) = chain().await;
    backend.set_unreachable(service_b()).await;

    let err = chain
        .invoke(&LayerRequest::get(service_b(), "/redfish/v1/Systems/1"))
        .await
        .unwrap_err();

    assert!(matches!(err, LayerError::Transport { .. }));
}
