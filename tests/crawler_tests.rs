// Copyright (c) 2025 - Cowboy AI, Inc.
//! Crawler Integration Tests
//!
//! Breadth-first discovery across two in-memory agents.

mod fixtures;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

use fixtures::*;
use podm_composition::crawler::{
    CancellationFlag, ConsumerError, Crawler, DiscoveredResource, ResourceConsumer,
};
use podm_composition::layers::{AdapterLayer, InMemoryBackend};

/// Resources one fixture agent exposes
const RESOURCES_PER_AGENT: usize = 9;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Recorder {
    fn paths(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceConsumer for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn consume(&self, resource: &DiscoveredResource) -> Result<(), ConsumerError> {
        self.seen.lock().unwrap().push(resource.canonical_path.clone());
        Ok(())
    }
}

struct Broken;

#[async_trait]
impl ResourceConsumer for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn consume(&self, _resource: &DiscoveredResource) -> Result<(), ConsumerError> {
        Err(ConsumerError("database unavailable".into()))
    }
}

/// Cancels the crawl as soon as it sees anything
struct Canceller(CancellationFlag);

#[async_trait]
impl ResourceConsumer for Canceller {
    fn name(&self) -> &str {
        "canceller"
    }

    async fn consume(&self, _resource: &DiscoveredResource) -> Result<(), ConsumerError> {
        self.0.cancel();
        Ok(())
    }
}

async fn two_agents() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    populate_agent(&backend, service_a(), "uuid-a").await;
    populate_agent(&backend, service_b(), "uuid-b").await;
    backend
}

fn crawler(backend: Arc<InMemoryBackend>) -> Crawler {
    Crawler::new(Arc::new(AdapterLayer::new(backend)), unifier(), 4)
}

fn consumers(recorder: &Arc<Recorder>) -> Vec<Arc<dyn ResourceConsumer>> {
    let recorder: Arc<dyn ResourceConsumer> = recorder.clone();
    vec![recorder]
}

fn roots() -> Vec<(podm_composition::ServiceId, String)> {
    vec![
        (service_a(), CANONICAL_ROOT.to_string()),
        (service_b(), CANONICAL_ROOT.to_string()),
    ]
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_crawl_delivers_canonical_paths() {
    let crawler = crawler(two_agents().await);
    let recorder = Arc::new(Recorder::default());

    let report = crawler
        .crawl(&roots(), &consumers(&recorder), &CancellationFlag::new())
        .await;

    assert_eq!(report.fetched, 2 * RESOURCES_PER_AGENT);
    assert_eq!(report.failed_fetches, 0);
    assert_eq!(report.unification_failures, 0);
    assert!(!report.cancelled);

    let paths = recorder.paths();
    assert_eq!(paths.len(), 2 * RESOURCES_PER_AGENT);
    for expected in [
        "/redfish/v1/Systems/uuid-a",
        "/redfish/v1/Systems/uuid-b",
        "/redfish/v1/Systems/uuid-a/Processors",
        "/redfish/v1/Systems/uuid-a/Processors/CPU0",
        "/redfish/v1/Systems/uuid-b/Processors/CPU0",
        "/redfish/v1/Chassis/rack-uuid-b",
    ] {
        assert!(paths.iter().any(|p| p == expected), "missing {}", expected);
    }
    assert!(!paths.iter().any(|p| p == "/redfish/v1/Systems/1"));
}

#[tokio::test]
async fn test_parents_are_delivered_before_children() {
    let crawler = crawler(two_agents().await);
    let recorder = Arc::new(Recorder::default());

    crawler
        .crawl(&roots(), &consumers(&recorder), &CancellationFlag::new())
        .await;

    let paths = recorder.paths();
    let position = |path: &str| paths.iter().position(|p| p == path).unwrap();
    assert!(position("/redfish/v1/Systems/uuid-a") < position("/redfish/v1/Systems/uuid-a/Processors/CPU0"));
}

#[tokio::test]
async fn test_failing_consumer_does_not_starve_others() {
    let crawler = crawler(two_agents().await);
    let recorder = Arc::new(Recorder::default());
    let broken: Arc<dyn ResourceConsumer> = Arc::new(Broken);
    let mut consumers = consumers(&recorder);
    consumers.insert(0, broken);

    let report = crawler.crawl(&roots(), &consumers, &CancellationFlag::new()).await;

    assert_eq!(report.consumer_failures, 2 * RESOURCES_PER_AGENT);
    assert_eq!(recorder.paths().len(), 2 * RESOURCES_PER_AGENT);
}

#[tokio::test]
async fn test_unreachable_agent_is_counted_not_fatal() {
    let backend = two_agents().await;
    backend.set_unreachable(service_b()).await;
    let recorder = Arc::new(Recorder::default());

    let report = crawler(backend)
        .crawl(&roots(), &consumers(&recorder), &CancellationFlag::new())
        .await;

    assert_eq!(report.failed_fetches, 1);
    assert_eq!(report.fetched, RESOURCES_PER_AGENT);
    assert!(recorder.paths().iter().all(|p| !p.contains("uuid-b")));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start_fetches_nothing() {
    let crawler = crawler(two_agents().await);
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let report = crawler.crawl(&roots(), &[], &cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.fetched, 0);
}

#[tokio::test]
async fn test_cancellation_stops_at_next_level() {
    let crawler = crawler(two_agents().await);
    let cancel = CancellationFlag::new();
    let canceller: Arc<dyn ResourceConsumer> = Arc::new(Canceller(cancel.clone()));
    let consumers = vec![canceller];

    let report = crawler.crawl(&roots(), &consumers, &cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.fetched, 2);
}
