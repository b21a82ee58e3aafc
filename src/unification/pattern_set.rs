// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pattern Sets
//!
//! The unification rules loaded at startup. Loading is all-or-nothing:
//! a syntax error or two rules accepting the same concrete path abort
//! the load, so at request time every path has at most one rule.
//!
//! # File Format
//!
//! ```text
//! # comment
//! /redfish/v1/[Systems/{}] -> {#/UUID}
//! /redfish/v1/[Systems/{}]/Processors/{} -> {..}/{}
//! ```

use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info};

use super::matching::MatchingPattern;
use super::pattern::{PatternSyntaxError, UnificationPattern};

/// Fatal configuration problems in a pattern set
#[derive(Debug, Error)]
pub enum PatternSetError {
    #[error("line {line}: {source}")]
    Syntax {
        line: usize,
        #[source]
        source: PatternSyntaxError,
    },

    #[error("patterns '{first}' and '{second}' accept the same paths")]
    Conflict { first: String, second: String },

    #[error("cannot read pattern file {path}: {message}")]
    Io { path: String, message: String },
}

#[derive(Debug, Clone)]
struct Entry {
    pattern: UnificationPattern,
    matcher: MatchingPattern,
}

/// Non-overlapping collection of unification patterns
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    entries: Vec<Entry>,
}

impl PatternSet {
    /// Build a set, rejecting any pair of overlapping patterns
    pub fn new(patterns: Vec<UnificationPattern>) -> Result<Self, PatternSetError> {
        let mut entries: Vec<Entry> = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let matcher = pattern.matching_pattern();
            if let Some(existing) = entries.iter().find(|e| e.matcher.overlaps(&matcher)) {
                error!(first = %existing.pattern, second = %pattern, "Conflicting unification patterns");
                return Err(PatternSetError::Conflict {
                    first: existing.pattern.to_string(),
                    second: pattern.to_string(),
                });
            }
            entries.push(Entry { pattern, matcher });
        }
        Ok(Self { entries })
    }

    /// Parse the line-oriented pattern format
    pub fn parse(text: &str) -> Result<Self, PatternSetError> {
        let mut patterns = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let pattern = UnificationPattern::parse(line).map_err(|source| PatternSetError::Syntax {
                line: index + 1,
                source,
            })?;
            debug!(line = index + 1, pattern = %pattern, "Parsed unification pattern");
            patterns.push(pattern);
        }
        Self::new(patterns)
    }

    /// Load and validate a pattern file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PatternSetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PatternSetError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let set = Self::parse(&text)?;
        info!("Loaded {} unification patterns from {}", set.len(), path.display());
        Ok(set)
    }

    /// The unique pattern accepting `path`, with its wildcard captures
    pub fn find<'p>(&self, path: &'p str) -> Option<(&UnificationPattern, Vec<&'p str>)> {
        self.entries
            .iter()
            .find_map(|e| e.matcher.captures(path).map(|c| (&e.pattern, c)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &UnificationPattern> {
        self.entries.iter().map(|e| &e.pattern)
    }
}
