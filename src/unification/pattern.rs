// Copyright (c) 2025 - Cowboy AI, Inc.
//! Unification Patterns
//!
//! A declarative rule mapping a backend-specific resource path onto a
//! canonical, service-independent one.
//!
//! ```text
//! /redfish/v1/[Systems/{}]/Processors/{} -> {#/UUID}/{#/Id}
//! └─ prefix ─┘└──── canonical region ────┘   └ one entry per wildcard ┘
//! ```
//!
//! # Target Entries
//!
//! | Entry | Meaning |
//! |---|---|
//! | `-` | drop the capture (only for namespace-prefix wildcards) |
//! | `{}` | keep the backend capture verbatim |
//! | `{..}` | reuse the canonical segment of the already unified parent |
//! | template | literal runs plus `{#/Pointer}` / `{$fn(#/Pointer)}` body lookups |
//!
//! # Round Trip
//!
//! Only the canonical spelling is accepted, so for every valid pattern
//! string `s`, `s.parse::<UnificationPattern>()?.to_string() == s`.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::matching::{flatten, parse_source, write_segments, MatchingPattern, Segment};

pub const ARROW: &str = " -> ";

/// Pattern text violates the grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternSyntaxError {
    #[error("missing ' -> ' separator in pattern '{0}'")]
    MissingArrow(String),

    #[error("unbalanced or repeated brackets in pattern '{0}'")]
    UnbalancedBrackets(String),

    #[error("invalid source in pattern '{pattern}': {reason}")]
    InvalidSource { pattern: String, reason: String },

    #[error("invalid target entry '{entry}' in pattern '{pattern}': {reason}")]
    InvalidTarget {
        pattern: String,
        entry: String,
        reason: String,
    },

    #[error("pattern '{pattern}' has {wildcards} wildcard(s) but {entries} target entr(y/ies)")]
    WildcardCountMismatch {
        pattern: String,
        wildcards: usize,
        entries: usize,
    },

    #[error("pattern '{pattern}': wildcard #{index} in the namespace prefix must be dropped with '-'")]
    PrefixWildcardNotDropped { pattern: String, index: usize },

    #[error("pattern '{pattern}': wildcard #{index} is part of the canonical path and cannot be dropped")]
    CanonicalWildcardDropped { pattern: String, index: usize },
}

/// Named lookup over an array of identifier candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupFunction {
    /// First non-empty scalar element
    First,
    /// First non-empty `DurableName` among identifier objects
    DurableName,
}

impl LookupFunction {
    pub fn name(&self) -> &'static str {
        match self {
            LookupFunction::First => "first",
            LookupFunction::DurableName => "durableName",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "first" => Some(LookupFunction::First),
            "durableName" => Some(LookupFunction::DurableName),
            _ => None,
        }
    }

    /// Apply the lookup to the value found at the pointer
    pub fn apply(&self, value: &Value) -> Option<String> {
        let items = value.as_array()?;
        match self {
            LookupFunction::First => items.iter().find_map(scalar_text),
            LookupFunction::DurableName => items
                .iter()
                .find_map(|item| item.get("DurableName").and_then(scalar_text)),
        }
    }
}

/// One piece of a template entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplatePart {
    Literal(String),
    /// JSON pointer into the resource body
    Pointer(String),
    Lookup {
        function: LookupFunction,
        pointer: String,
    },
}

/// How one source wildcard becomes a canonical segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetEntry {
    Drop,
    Capture,
    Parent,
    Template(Vec<TemplatePart>),
}

impl TargetEntry {
    /// Render a template entry against a resource body
    ///
    /// Returns `None` when any lookup yields nothing, or when the result
    /// would not be a single non-empty path segment.
    pub fn render_template(parts: &[TemplatePart], body: &Value) -> Option<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Pointer(pointer) => out.push_str(&body.pointer(pointer).and_then(scalar_text)?),
                TemplatePart::Lookup { function, pointer } => {
                    out.push_str(&function.apply(body.pointer(pointer)?)?)
                }
            }
        }
        if out.is_empty() || out.contains('/') {
            None
        } else {
            Some(out)
        }
    }
}

impl fmt::Display for TargetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetEntry::Drop => f.write_str("-"),
            TargetEntry::Capture => f.write_str("{}"),
            TargetEntry::Parent => f.write_str("{..}"),
            TargetEntry::Template(parts) => {
                for part in parts {
                    match part {
                        TemplatePart::Literal(text) => f.write_str(text)?,
                        TemplatePart::Pointer(pointer) => write!(f, "{{#{}}}", pointer)?,
                        TemplatePart::Lookup { function, pointer } => {
                            write!(f, "{{${}(#{})}}", function.name(), pointer)?
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// A flattened source segment with its position relative to the root marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSlot<'a> {
    pub segment: &'a Segment,
    /// Part of the canonical path (at or after the opening bracket)
    pub canonical: bool,
    /// Index into the target entries when this slot is a wildcard
    pub wildcard_index: Option<usize>,
}

/// Parsed `source -> target` rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnificationPattern {
    source: Vec<Segment>,
    flat: Vec<Segment>,
    /// Flattened index of the first canonical segment
    root: Option<usize>,
    entries: Vec<TargetEntry>,
}

impl UnificationPattern {
    /// Parse a pattern in canonical form
    pub fn parse(text: &str) -> Result<Self, PatternSyntaxError> {
        let (source_text, target_text) = text
            .split_once(ARROW)
            .ok_or_else(|| PatternSyntaxError::MissingArrow(text.to_string()))?;
        if target_text.contains("->") {
            return Err(PatternSyntaxError::MissingArrow(text.to_string()));
        }

        let source = parse_source(source_text, text)?;
        let flat = flatten(&source);
        let root = root_index(&source);
        let entries = parse_target(target_text, text)?;

        let wildcards: Vec<usize> = flat
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Segment::Wildcard))
            .map(|(i, _)| i)
            .collect();

        if wildcards.len() != entries.len() {
            return Err(PatternSyntaxError::WildcardCountMismatch {
                pattern: text.to_string(),
                wildcards: wildcards.len(),
                entries: entries.len(),
            });
        }

        for (index, (&position, entry)) in wildcards.iter().zip(entries.iter()).enumerate() {
            let in_prefix = root.is_some_and(|r| position < r);
            let dropped = matches!(entry, TargetEntry::Drop);
            if in_prefix && !dropped {
                return Err(PatternSyntaxError::PrefixWildcardNotDropped {
                    pattern: text.to_string(),
                    index,
                });
            }
            if !in_prefix && dropped {
                return Err(PatternSyntaxError::CanonicalWildcardDropped {
                    pattern: text.to_string(),
                    index,
                });
            }
        }

        Ok(Self {
            source,
            flat,
            root,
            entries,
        })
    }

    pub fn entries(&self) -> &[TargetEntry] {
        &self.entries
    }

    /// Whether the pattern carries a canonical root marker
    pub fn is_rooted(&self) -> bool {
        self.root.is_some()
    }

    /// Derived membership view; brackets do not affect matching
    pub fn matching_pattern(&self) -> MatchingPattern {
        MatchingPattern::from_segments(self.source.clone())
    }

    /// Flattened source segments annotated for canonical rendering
    pub fn slots(&self) -> Vec<SourceSlot<'_>> {
        let root = self.root.unwrap_or(0);
        let mut wildcard = 0;
        self.flat
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let wildcard_index = if matches!(segment, Segment::Wildcard) {
                    wildcard += 1;
                    Some(wildcard - 1)
                } else {
                    None
                };
                SourceSlot {
                    segment,
                    canonical: i >= root,
                    wildcard_index,
                }
            })
            .collect()
    }
}

impl FromStr for UnificationPattern {
    type Err = PatternSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UnificationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_segments(f, &self.source)?;
        f.write_str(ARROW)?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

fn root_index(source: &[Segment]) -> Option<usize> {
    let mut offset = 0;
    for segment in source {
        if matches!(segment, Segment::Group(_)) {
            return Some(offset);
        }
        offset += segment.arity();
    }
    None
}

/// Split target text on '/' outside of braces
fn split_entries(target: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in target.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                entries.push(&target[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&target[start..]);
    entries
}

fn parse_target(target: &str, original: &str) -> Result<Vec<TargetEntry>, PatternSyntaxError> {
    split_entries(target)
        .into_iter()
        .map(|entry| parse_entry(entry, original))
        .collect()
}

fn parse_entry(entry: &str, original: &str) -> Result<TargetEntry, PatternSyntaxError> {
    let err = |reason: &str| PatternSyntaxError::InvalidTarget {
        pattern: original.to_string(),
        entry: entry.to_string(),
        reason: reason.to_string(),
    };

    match entry {
        "" => return Err(err("empty entry")),
        "-" => return Ok(TargetEntry::Drop),
        "{}" => return Ok(TargetEntry::Capture),
        "{..}" => return Ok(TargetEntry::Parent),
        _ => {}
    }
    if entry.contains(char::is_whitespace) {
        return Err(err("whitespace is not allowed"));
    }

    let mut parts: Vec<TemplatePart> = Vec::new();
    let mut rest = entry;
    while !rest.is_empty() {
        if let Some(body) = rest.strip_prefix('{') {
            let close = body.find('}').ok_or_else(|| err("unterminated placeholder"))?;
            parts.push(parse_placeholder(&body[..close]).ok_or_else(|| err("unknown placeholder"))?);
            rest = &body[close + 1..];
        } else {
            let end = rest.find('{').unwrap_or(rest.len());
            let literal = &rest[..end];
            if literal.contains('}') {
                return Err(err("unbalanced '}'"));
            }
            parts.push(TemplatePart::Literal(literal.to_string()));
            rest = &rest[end..];
        }
    }
    Ok(TargetEntry::Template(parts))
}

fn parse_placeholder(inner: &str) -> Option<TemplatePart> {
    if let Some(pointer) = inner.strip_prefix('#') {
        return valid_pointer(pointer).then(|| TemplatePart::Pointer(pointer.to_string()));
    }
    let call = inner.strip_prefix('$')?;
    let (name, args) = call.split_once('(')?;
    let pointer = args.strip_suffix(')')?.strip_prefix('#')?;
    let function = LookupFunction::from_name(name)?;
    valid_pointer(pointer).then(|| TemplatePart::Lookup {
        function,
        pointer: pointer.to_string(),
    })
}

fn valid_pointer(pointer: &str) -> bool {
    pointer.starts_with('/') && !pointer.contains(&['{', '}', '(', ')'][..])
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
