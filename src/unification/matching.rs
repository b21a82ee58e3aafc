// Copyright (c) 2025 - Cowboy AI, Inc.
//! Matching Patterns
//!
//! Membership test of a concrete backend path against a segment template.
//!
//! ```text
//! /redfish/v1/[Systems/{}]/Processors/{}
//!   literal literal [group: literal wildcard] literal wildcard
//! ```
//!
//! # Rules
//!
//! - A wildcard accepts exactly one non-empty segment
//! - Segment counts must agree; there are no prefix matches
//! - A bracket group is matched recursively against the span of the same
//!   arity, so brackets never change which paths match
//! - Trailing slashes on either side are ignored

use std::fmt;

use super::PatternSyntaxError;

/// One element of a source template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Wildcard,
    /// Bracketed run marking where the canonical path begins
    Group(Vec<Segment>),
}

impl Segment {
    /// Number of concrete path segments this element spans
    pub fn arity(&self) -> usize {
        match self {
            Segment::Group(inner) => inner.iter().map(Segment::arity).sum(),
            _ => 1,
        }
    }
}

/// Positional path template used purely for membership testing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchingPattern {
    segments: Vec<Segment>,
}

impl MatchingPattern {
    /// Parse a source template such as `/redfish/v1/Systems/{}`
    pub fn parse(source: &str) -> Result<Self, PatternSyntaxError> {
        let trimmed = source.trim_end_matches('/');
        Ok(Self {
            segments: parse_source(trimmed, source)?,
        })
    }

    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total number of concrete segments a matching path has
    pub fn arity(&self) -> usize {
        self.segments.iter().map(Segment::arity).sum()
    }

    /// Whether `path` is accepted by this template
    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Wildcard captures in source order, or `None` when the path does not match
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let parts = split_path(path)?;
        if parts.len() != self.arity() {
            return None;
        }
        let mut captures = Vec::new();
        if match_span(&self.segments, &parts, &mut captures) {
            Some(captures)
        } else {
            None
        }
    }

    /// Whether some concrete path would be accepted by both templates
    pub fn overlaps(&self, other: &MatchingPattern) -> bool {
        let left = flatten(&self.segments);
        let right = flatten(&other.segments);
        left.len() == right.len()
            && left.iter().zip(right.iter()).all(|(a, b)| match (a, b) {
                (Segment::Literal(x), Segment::Literal(y)) => x == y,
                _ => true,
            })
    }
}

impl fmt::Display for MatchingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_segments(f, &self.segments)
    }
}

pub(crate) fn write_segments(f: &mut fmt::Formatter<'_>, segments: &[Segment]) -> fmt::Result {
    for segment in segments {
        f.write_str("/")?;
        match segment {
            Segment::Literal(text) => f.write_str(text)?,
            Segment::Wildcard => f.write_str("{}")?,
            Segment::Group(inner) => {
                f.write_str("[")?;
                for (i, s) in inner.iter().enumerate() {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    match s {
                        Segment::Literal(text) => f.write_str(text)?,
                        Segment::Wildcard => f.write_str("{}")?,
                        Segment::Group(_) => unreachable!("groups never nest"),
                    }
                }
                f.write_str("]")?;
            }
        }
    }
    Ok(())
}

/// Flatten groups into a plain literal/wildcard sequence
pub(crate) fn flatten(segments: &[Segment]) -> Vec<Segment> {
    let mut out = Vec::new();
    for segment in segments {
        match segment {
            Segment::Group(inner) => out.extend(flatten(inner)),
            other => out.push(other.clone()),
        }
    }
    out
}

/// Split an absolute path into segments; `None` for relative or empty-segment paths
pub(crate) fn split_path(path: &str) -> Option<Vec<&str>> {
    let path = path.trim_end_matches('/');
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

fn match_span<'p>(pattern: &[Segment], parts: &[&'p str], captures: &mut Vec<&'p str>) -> bool {
    let mut offset = 0;
    for segment in pattern {
        let width = segment.arity();
        let Some(span) = parts.get(offset..offset + width) else {
            return false;
        };
        let ok = match segment {
            Segment::Literal(text) => span[0] == text,
            Segment::Wildcard => {
                captures.push(span[0]);
                true
            }
            Segment::Group(inner) => match_span(inner, span, captures),
        };
        if !ok {
            return false;
        }
        offset += width;
    }
    offset == parts.len()
}

/// Parse the source side of a pattern; `original` is used for error messages
pub(crate) fn parse_source(source: &str, original: &str) -> Result<Vec<Segment>, PatternSyntaxError> {
    let err = |reason: &str| PatternSyntaxError::InvalidSource {
        pattern: original.to_string(),
        reason: reason.to_string(),
    };

    let rest = source
        .strip_prefix('/')
        .ok_or_else(|| err("source must start with '/'"))?;
    if rest.is_empty() {
        return Err(err("source has no segments"));
    }

    let mut segments = Vec::new();
    let mut group: Option<Vec<Segment>> = None;
    let mut seen_group = false;

    for raw in rest.split('/') {
        let mut text = raw;
        let opens = text.starts_with('[');
        if opens {
            if seen_group {
                return Err(PatternSyntaxError::UnbalancedBrackets(original.to_string()));
            }
            seen_group = true;
            group = Some(Vec::new());
            text = &text[1..];
        }
        let closes = text.ends_with(']');
        if closes {
            text = &text[..text.len() - 1];
        }

        let segment = match text {
            "" => return Err(err("empty segment")),
            "{}" => Segment::Wildcard,
            t if t.contains(&['{', '}', '[', ']', ' '][..]) => {
                return Err(err(&format!("invalid segment '{}'", raw)))
            }
            t => Segment::Literal(t.to_string()),
        };

        match group.as_mut() {
            Some(inner) => inner.push(segment),
            None => segments.push(segment),
        }

        if closes {
            let inner = group
                .take()
                .ok_or_else(|| PatternSyntaxError::UnbalancedBrackets(original.to_string()))?;
            segments.push(Segment::Group(inner));
        }
    }

    if group.is_some() {
        return Err(PatternSyntaxError::UnbalancedBrackets(original.to_string()));
    }
    Ok(segments)
}
