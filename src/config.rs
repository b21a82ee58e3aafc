// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pod Manager Configuration
//!
//! Loaded from JSON or from `PODM_*` environment variables. Every field
//! has a default, so an empty document or environment is valid.
//!
//! | Variable | Field |
//! |---|---|
//! | `PODM_CANONICAL_ROOT` | `canonical_root` |
//! | `PODM_UNIFICATION_PATTERNS` | `unification_patterns_path` |
//! | `PODM_GLOBAL_RESOURCE_PATTERNS` | `global_resource_patterns` (comma separated) |
//! | `PODM_MAX_STALE_SECONDS` | `max_stale_seconds` |
//! | `PODM_CRAWLER_POOL_SIZE` | `crawler_pool_size` |
//! | `PODM_ALLOCATION_RETRY_ATTEMPTS` | `allocation_retry_attempts` |
//! | `PODM_EVENT_DELIVERY_RETRY_ATTEMPTS` | `event_delivery_retry_attempts` |
//! | `PODM_EVENT_DELIVERY_BACKOFF_MS` | `event_delivery_backoff_ms` |
//! | `PODM_FILTER_RULES` | `filter_rules` (comma separated) |
//! | `PODM_TAGGABLE_PROPERTIES` | `taggable_properties` (comma separated) |

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::crawler::DEFAULT_POOL_SIZE;
use crate::layers::{BackendClient, JsonBodyFilter, LayerChain, DEFAULT_MAX_STALE_SECONDS};
use crate::retry::RetryPolicy;
use crate::tagging::TagStore;
use crate::unification::{
    MatchingPattern, PatternSet, PatternSetError, PatternSyntaxError, ResourceUnifier,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("invalid global resource pattern: {0}")]
    GlobalResourcePattern(#[from] PatternSyntaxError),

    #[error("unification patterns: {0}")]
    Patterns(#[from] PatternSetError),

    #[error("malformed configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodmConfig {
    #[serde(default = "default_canonical_root")]
    pub canonical_root: String,

    #[serde(default)]
    pub unification_patterns_path: Option<String>,

    #[serde(default = "default_global_resource_patterns")]
    pub global_resource_patterns: Vec<String>,

    #[serde(default = "default_max_stale_seconds")]
    pub max_stale_seconds: u64,

    #[serde(default = "default_crawler_pool_size")]
    pub crawler_pool_size: usize,

    #[serde(default = "default_allocation_retry_attempts")]
    pub allocation_retry_attempts: u32,

    #[serde(default = "default_event_delivery_retry_attempts")]
    pub event_delivery_retry_attempts: u32,

    #[serde(default = "default_event_delivery_backoff_ms")]
    pub event_delivery_backoff_ms: u64,

    #[serde(default = "default_filter_rules")]
    pub filter_rules: Vec<String>,

    #[serde(default = "default_taggable_properties")]
    pub taggable_properties: Vec<String>,
}

fn default_canonical_root() -> String {
    "/redfish/v1".to_string()
}

fn default_global_resource_patterns() -> Vec<String> {
    ["Chassis", "Managers", "Fabrics"]
        .iter()
        .map(|collection| format!("/redfish/v1/{}/{{}}", collection))
        .collect()
}

fn default_max_stale_seconds() -> u64 {
    DEFAULT_MAX_STALE_SECONDS
}

fn default_crawler_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_allocation_retry_attempts() -> u32 {
    3
}

fn default_event_delivery_retry_attempts() -> u32 {
    2
}

fn default_event_delivery_backoff_ms() -> u64 {
    500
}

fn default_filter_rules() -> Vec<String> {
    vec!["CHAPSecret".into(), "CHAPMutualSecret".into(), "Password".into()]
}

fn default_taggable_properties() -> Vec<String> {
    vec!["/Description".into(), "/AssetTag".into()]
}

impl Default for PodmConfig {
    fn default() -> Self {
        Self {
            canonical_root: default_canonical_root(),
            unification_patterns_path: None,
            global_resource_patterns: default_global_resource_patterns(),
            max_stale_seconds: default_max_stale_seconds(),
            crawler_pool_size: default_crawler_pool_size(),
            allocation_retry_attempts: default_allocation_retry_attempts(),
            event_delivery_retry_attempts: default_event_delivery_retry_attempts(),
            event_delivery_backoff_ms: default_event_delivery_backoff_ms(),
            filter_rules: default_filter_rules(),
            taggable_properties: default_taggable_properties(),
        }
    }
}

impl PodmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup, using the `PODM_*` names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(root) = lookup("PODM_CANONICAL_ROOT") {
            config.canonical_root = root;
        }
        config.unification_patterns_path = lookup("PODM_UNIFICATION_PATTERNS").or(config.unification_patterns_path);
        if let Some(list) = lookup("PODM_GLOBAL_RESOURCE_PATTERNS") {
            config.global_resource_patterns = split_list(&list);
        }
        parse_into(&lookup, "PODM_MAX_STALE_SECONDS", &mut config.max_stale_seconds)?;
        parse_into(&lookup, "PODM_CRAWLER_POOL_SIZE", &mut config.crawler_pool_size)?;
        parse_into(&lookup, "PODM_ALLOCATION_RETRY_ATTEMPTS", &mut config.allocation_retry_attempts)?;
        parse_into(&lookup, "PODM_EVENT_DELIVERY_RETRY_ATTEMPTS", &mut config.event_delivery_retry_attempts)?;
        parse_into(&lookup, "PODM_EVENT_DELIVERY_BACKOFF_MS", &mut config.event_delivery_backoff_ms)?;
        if let Some(list) = lookup("PODM_FILTER_RULES") {
            config.filter_rules = split_list(&list);
        }
        if let Some(list) = lookup("PODM_TAGGABLE_PROPERTIES") {
            config.taggable_properties = split_list(&list);
        }

        config.validate()?;
        debug!(root = %config.canonical_root, "Configuration loaded from environment");
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canonical_root.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid {
                key: "canonical_root".into(),
                message: "must not be empty".into(),
            });
        }
        if self.crawler_pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "crawler_pool_size".into(),
                message: "must be at least 1".into(),
            });
        }
        self.global_resource_matchers()?;
        Ok(())
    }

    pub fn global_resource_matchers(&self) -> Result<Vec<MatchingPattern>, ConfigError> {
        self.global_resource_patterns
            .iter()
            .map(|p| MatchingPattern::parse(p).map_err(ConfigError::from))
            .collect()
    }

    /// Load the configured pattern file; no file means no patterns
    pub fn unification_patterns(&self) -> Result<PatternSet, ConfigError> {
        let set = match &self.unification_patterns_path {
            Some(path) => PatternSet::load(path)?,
            None => PatternSet::new(Vec::new())?,
        };
        Ok(set)
    }

    pub fn body_filter(&self) -> JsonBodyFilter {
        JsonBodyFilter::from_rules(&self.filter_rules)
    }

    /// The full layer chain wired from this configuration
    pub fn layer_chain(
        &self,
        backend: Arc<dyn BackendClient>,
        tags: Arc<dyn TagStore>,
        unifier: Arc<ResourceUnifier>,
    ) -> Result<LayerChain, ConfigError> {
        Ok(LayerChain::builder(backend)
            .global_resources(self.global_resource_matchers()?, self.max_stale_seconds)
            .body_filter(self.body_filter())
            .tags(tags, self.taggable_properties.clone())
            .unifier(unifier)
            .build())
    }

    pub fn allocation_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.allocation_retry_attempts)
    }

    pub fn event_delivery_backoff(&self) -> Duration {
        Duration::from_millis(self.event_delivery_backoff_ms)
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn parse_into<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}
