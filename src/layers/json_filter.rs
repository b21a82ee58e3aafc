// Copyright (c) 2025 - Cowboy AI, Inc.
//! JSON Body Filter
//!
//! Redacts sensitive fields from response bodies before they travel
//! further up the chain.
//!
//! # Rules
//!
//! ```text
//! CHAPSecret                     top-level field
//! /Authentication/CHAPSecret     nested field
//! /Targets/*/CHAPSecret          any element of an array (or any key of an object)
//! ```
//!
//! Rules are anchored at the body root. A matched string becomes `""`,
//! any other matched value becomes `null`; the key itself always stays.
//! The input tree is never modified.

use serde_json::Value;
use tracing::debug;

use crate::unification::{MatchingPattern, PatternSyntaxError};

const WILDCARD: &str = "*";

/// One redaction rule, optionally limited to URIs matching a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    scope: Option<MatchingPattern>,
    segments: Vec<String>,
}

impl FilterRule {
    /// Rule applied to every URI
    pub fn parse(rule: &str) -> Self {
        let trimmed = rule.trim().trim_start_matches('/');
        Self {
            scope: None,
            segments: trimmed
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Rule applied only to URIs accepted by `scope`
    pub fn scoped(scope: &str, rule: &str) -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            scope: Some(MatchingPattern::parse(scope)?),
            ..Self::parse(rule)
        })
    }

    fn applies_to(&self, uri: &str) -> bool {
        self.scope.as_ref().map_or(true, |p| p.matches(uri))
    }
}

/// Ordered set of redaction rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonBodyFilter {
    rules: Vec<FilterRule>,
}

impl JsonBodyFilter {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        Self { rules }
    }

    /// Global rules from their textual form
    pub fn from_rules<S: AsRef<str>>(rules: &[S]) -> Self {
        Self::new(rules.iter().map(|r| FilterRule::parse(r.as_ref())).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Redacted copy of `body` for the resource at `uri`
    pub fn filter_body(&self, uri: &str, body: &Value) -> Value {
        let mut filtered = body.clone();
        for rule in self.rules.iter().filter(|r| r.applies_to(uri)) {
            let redacted = redact(&mut filtered, &rule.segments);
            if redacted > 0 {
                debug!(uri = %uri, rule = %rule.segments.join("/"), redacted, "Redacted body fields");
            }
        }
        filtered
    }
}

fn redact(value: &mut Value, segments: &[String]) -> usize {
    let Some((head, rest)) = segments.split_first() else {
        return 0;
    };
    match value {
        Value::Object(map) => {
            if head == WILDCARD {
                map.values_mut().map(|v| step(v, rest)).sum()
            } else {
                map.get_mut(head.as_str()).map_or(0, |v| step(v, rest))
            }
        }
        Value::Array(items) => {
            if head == WILDCARD {
                items.iter_mut().map(|v| step(v, rest)).sum()
            } else {
                head.parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .map_or(0, |v| step(v, rest))
            }
        }
        _ => 0,
    }
}

fn step(value: &mut Value, rest: &[String]) -> usize {
    if rest.is_empty() {
        clear(value);
        1
    } else {
        redact(value, rest)
    }
}

fn clear(value: &mut Value) {
    *value = match value {
        Value::String(_) => Value::String(String::new()),
        _ => Value::Null,
    };
}
