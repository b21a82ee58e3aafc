// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event subscriptions and delivery

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::pod_event::{PodEvent, PodEventType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery to {destination} failed: {message}")]
pub struct DeliveryError {
    pub destination: String,
    pub message: String,
}

/// Transport that pushes one event to one destination
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, destination: &str, event: &PodEvent) -> Result<(), DeliveryError>;
}

#[derive(Clone)]
pub struct Subscription {
    pub id: Uuid,
    pub destination: String,
    /// Empty means every type
    pub event_types: BTreeSet<PodEventType>,
    sink: Arc<dyn EventSink>,
}

impl Subscription {
    pub fn wants(&self, event_type: PodEventType) -> bool {
        self.event_types.is_empty() || self.event_types.contains(&event_type)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Subscriptions removed after exhausting their retries
    pub dropped: Vec<Uuid>,
}

pub struct EventPublisher {
    subscriptions: RwLock<BTreeMap<Uuid, Subscription>>,
    retry_attempts: u32,
    backoff: Duration,
}

impl EventPublisher {
    pub fn new(retry_attempts: u32, backoff: Duration) -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            retry_attempts,
            backoff,
        }
    }

    pub async fn subscribe(
        &self,
        destination: impl Into<String>,
        event_types: BTreeSet<PodEventType>,
        sink: Arc<dyn EventSink>,
    ) -> Uuid {
        let subscription = Subscription {
            id: Uuid::now_v7(),
            destination: destination.into(),
            event_types,
            sink,
        };
        let id = subscription.id;
        debug!(subscription = %id, destination = %subscription.destination, "Subscribed");
        self.subscriptions.write().await.insert(id, subscription);
        id
    }

    pub async fn unsubscribe(&self, id: Uuid) -> bool {
        self.subscriptions.write().await.remove(&id).is_some()
    }

    pub async fn destinations(&self) -> Vec<(Uuid, String)> {
        self.subscriptions
            .read()
            .await
            .values()
            .map(|s| (s.id, s.destination.clone()))
            .collect()
    }

    /// Deliver to every interested subscription concurrently
    pub async fn publish(&self, event: &PodEvent) -> DeliveryReport {
        let targets: Vec<Subscription> = self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| s.wants(event.event_type))
            .cloned()
            .collect();

        let outcomes = join_all(targets.iter().map(|s| self.deliver_with_retry(s, event))).await;

        let mut report = DeliveryReport::default();
        for (subscription, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(subscription = %subscription.id, error = %err, "Dropping subscription");
                    report.dropped.push(subscription.id);
                }
            }
        }
        if !report.dropped.is_empty() {
            let mut subscriptions = self.subscriptions.write().await;
            for id in &report.dropped {
                subscriptions.remove(id);
            }
        }
        report
    }

    async fn deliver_with_retry(&self, subscription: &Subscription, event: &PodEvent) -> Result<(), DeliveryError> {
        let mut attempt = 0;
        loop {
            match subscription.sink.deliver(&subscription.destination, event).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt >= self.retry_attempts => return Err(err),
                Err(err) => {
                    attempt += 1;
                    debug!(destination = %subscription.destination, attempt, error = %err, "Redelivering event");
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }
}
