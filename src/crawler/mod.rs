// Copyright (c) 2025 - Cowboy AI, Inc.
//! Discovery Crawler
//!
//! Walks every agent's resource graph breadth first, unifies what it
//! finds and hands each resource to the registered consumers.
//!
//! ```text
//! roots ─► level 0 ─► level 1 ─► ...
//!            │ fetch (≤ pool_size in flight)
//!            │ sort by (service, path)
//!            │ unify  (parents before children)
//!            ▼
//!          consumers (a failing consumer never stops the others)
//! ```
//!
//! Cancellation is cooperative: the flag is checked before every fetch
//! and between levels.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{ResourceReference, ServiceId};
use crate::layers::{Body, Layer, LayerRequest};
use crate::unification::{ResourceUnifier, UnificationError, ODATA_ID};

pub const DEFAULT_POOL_SIZE: usize = 10;

/// Shared cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
#[error("consumer failed: {0}")]
pub struct ConsumerError(pub String);

/// A unified resource found during discovery
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredResource {
    pub reference: ResourceReference,
    pub canonical_path: String,
    pub body: Value,
}

/// Receives discovered resources
#[async_trait]
pub trait ResourceConsumer: Send + Sync {
    fn name(&self) -> &str;

    async fn consume(&self, resource: &DiscoveredResource) -> Result<(), ConsumerError>;
}

/// Outcome counters of one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub fetched: usize,
    pub failed_fetches: usize,
    pub unification_failures: usize,
    pub consumer_failures: usize,
    pub cancelled: bool,
}

struct Fetched {
    reference: ResourceReference,
    body: Value,
}

pub struct Crawler {
    fetcher: Arc<dyn Layer>,
    unifier: Arc<ResourceUnifier>,
    pool_size: usize,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Layer>, unifier: Arc<ResourceUnifier>, pool_size: usize) -> Self {
        Self {
            fetcher,
            unifier,
            pool_size: pool_size.max(1),
        }
    }

    /// Crawl from the given service roots until the graph is exhausted or cancelled
    pub async fn crawl(
        &self,
        roots: &[(ServiceId, String)],
        consumers: &[Arc<dyn ResourceConsumer>],
        cancel: &CancellationFlag,
    ) -> CrawlReport {
        let mut report = CrawlReport::default();
        let mut visited: HashSet<ResourceReference> = HashSet::new();
        let mut frontier: BTreeSet<ResourceReference> = roots
            .iter()
            .map(|(service, path)| ResourceReference::new(*service, path.as_str()))
            .collect();
        let mut deferred: Vec<Fetched> = Vec::new();
        let mut level = 0usize;

        while !frontier.is_empty() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            visited.extend(frontier.iter().cloned());
            debug!(level, size = frontier.len(), "Crawling level");

            let mut fetched = self.fetch_level(frontier, cancel, &mut report).await;
            fetched.sort_by(|a, b| a.reference.cmp(&b.reference));

            let mut next = BTreeSet::new();
            for resource in &fetched {
                for link in links(&resource.body) {
                    let reference = ResourceReference::new(resource.reference.service, link);
                    if !visited.contains(&reference) {
                        next.insert(reference);
                    }
                }
            }

            for resource in fetched {
                if let Some(pending) = self.unify_and_deliver(resource, consumers, &mut report).await {
                    deferred.push(pending);
                }
            }
            deferred = self.retry_deferred(deferred, consumers, &mut report).await;

            frontier = next;
            level += 1;
        }

        if cancel.is_cancelled() {
            report.cancelled = true;
        }
        report.unification_failures += deferred.len();
        for pending in &deferred {
            warn!(reference = %pending.reference, "Resource never became unifiable");
        }
        info!(
            fetched = report.fetched,
            failed = report.failed_fetches,
            consumer_failures = report.consumer_failures,
            cancelled = report.cancelled,
            "Crawl finished"
        );
        report
    }

    async fn fetch_level(
        &self,
        frontier: BTreeSet<ResourceReference>,
        cancel: &CancellationFlag,
        report: &mut CrawlReport,
    ) -> Vec<Fetched> {
        let results: Vec<_> = stream::iter(frontier)
            .map(|reference| async move {
                if cancel.is_cancelled() {
                    return (reference, None);
                }
                let request = LayerRequest::get(reference.service, reference.path.as_str());
                let result = self.fetcher.invoke(&request).await;
                (reference, Some(result))
            })
            .buffer_unordered(self.pool_size)
            .collect()
            .await;

        let mut fetched = Vec::with_capacity(results.len());
        for (reference, result) in results {
            match result {
                None => report.cancelled = true,
                Some(Ok(response)) if response.is_success() => match response.body {
                    Body::Json(body) => {
                        report.fetched += 1;
                        fetched.push(Fetched { reference, body });
                    }
                    _ => {
                        warn!(reference = %reference, "Discovered resource has no JSON body");
                        report.failed_fetches += 1;
                    }
                },
                Some(Ok(response)) => {
                    warn!(reference = %reference, status = response.status, "Fetch rejected by agent");
                    report.failed_fetches += 1;
                }
                Some(Err(e)) => {
                    warn!(reference = %reference, error = %e, "Fetch failed");
                    report.failed_fetches += 1;
                }
            }
        }
        fetched
    }

    /// Returns the resource back when its parent is not unified yet
    async fn unify_and_deliver(
        &self,
        resource: Fetched,
        consumers: &[Arc<dyn ResourceConsumer>],
        report: &mut CrawlReport,
    ) -> Option<Fetched> {
        let unified = match self
            .unifier
            .unify(resource.reference.service, &resource.reference.path, &resource.body)
        {
            Ok(unified) => unified,
            Err(UnificationError::Unresolvable { .. }) => return Some(resource),
            Err(e) => {
                warn!(reference = %resource.reference, error = %e, "Skipping resource");
                report.unification_failures += 1;
                return None;
            }
        };

        let discovered = DiscoveredResource {
            reference: resource.reference,
            canonical_path: unified.canonical_path,
            body: unified.body,
        };
        for consumer in consumers {
            if let Err(e) = consumer.consume(&discovered).await {
                warn!(
                    consumer = consumer.name(),
                    reference = %discovered.reference,
                    error = %e,
                    "Consumer failed, continuing"
                );
                report.consumer_failures += 1;
            }
        }
        None
    }

    async fn retry_deferred(
        &self,
        mut deferred: Vec<Fetched>,
        consumers: &[Arc<dyn ResourceConsumer>],
        report: &mut CrawlReport,
    ) -> Vec<Fetched> {
        loop {
            let before = deferred.len();
            let mut still = Vec::new();
            for resource in deferred {
                if let Some(pending) = self.unify_and_deliver(resource, consumers, report).await {
                    still.push(pending);
                }
            }
            if still.len() == before {
                return still;
            }
            deferred = still;
        }
    }
}

/// Every `@odata.id` below the top level, without fragments
fn links(body: &Value) -> BTreeSet<String> {
    fn walk(value: &Value, top: bool, out: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                for (key, inner) in map {
                    match (key.as_str(), inner) {
                        (ODATA_ID, Value::String(link)) if !top => {
                            let path = link.split('#').next().unwrap_or_default();
                            if path.starts_with('/') {
                                out.insert(path.trim_end_matches('/').to_string());
                            }
                        }
                        _ => walk(inner, false, out),
                    }
                }
            }
            Value::Array(items) => items.iter().for_each(|item| walk(item, false, out)),
            _ => {}
        }
    }
    let mut out = BTreeSet::new();
    walk(body, true, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_links_skip_self_and_fragments() {
        let body = json!({
            "@odata.id": "/redfish/v1/Systems/1",
            "Processors": {"@odata.id": "/redfish/v1/Systems/1/Processors"},
            "Links": {"Chassis": [{"@odata.id": "/redfish/v1/Chassis/1#/Links"}]}
        });
        let found: Vec<String> = links(&body).into_iter().collect();
        assert_eq!(
            found,
            vec!["/redfish/v1/Chassis/1".to_string(), "/redfish/v1/Systems/1/Processors".to_string()]
        );
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
