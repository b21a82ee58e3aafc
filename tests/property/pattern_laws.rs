// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Unification Patterns
//!
//! Generated patterns always have a literal prefix, optional dropped
//! prefix wildcards, one bracketed `Collection/{}` group and optional
//! `Collection/{}` pairs after it.

use podm_composition::unification::{PatternSet, UnificationPattern};
use proptest::prelude::*;

// ============================================================================
// Pattern Shapes
// ============================================================================

#[derive(Debug, Clone)]
struct Shape {
    prefix: Vec<String>,
    prefix_wildcards: usize,
    group: String,
    group_from_body: bool,
    suffix: Vec<String>,
}

impl Shape {
    fn wildcards(&self) -> usize {
        self.prefix_wildcards + 1 + self.suffix.len()
    }

    fn text(&self) -> String {
        let mut source: Vec<String> = self.prefix.clone();
        source.extend(std::iter::repeat("{}".to_string()).take(self.prefix_wildcards));
        source.push(format!("[{}/{{}}]", self.group));
        for collection in &self.suffix {
            source.push(collection.clone());
            source.push("{}".to_string());
        }

        let mut target: Vec<&str> = vec!["-"; self.prefix_wildcards];
        target.push(if self.group_from_body { "{#/UUID}" } else { "{}" });
        target.extend(std::iter::repeat("{}").take(self.suffix.len()));

        format!("/{} -> {}", source.join("/"), target.join("/"))
    }

    /// A backend path the pattern accepts, using `ids` for the wildcards
    fn path(&self, ids: &[String]) -> String {
        let mut ids = ids.iter().cloned();
        let mut parts: Vec<String> = self.prefix.clone();
        parts.extend((0..self.prefix_wildcards).filter_map(|_| ids.next()));
        parts.push(self.group.clone());
        parts.extend(ids.next());
        for collection in &self.suffix {
            parts.push(collection.clone());
            parts.extend(ids.next());
        }
        format!("/{}", parts.join("/"))
    }
}

fn collection() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,8}"
}

fn segment_id() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,7}"
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        prop::collection::vec(collection(), 1..3),
        0usize..3,
        collection(),
        any::<bool>(),
        prop::collection::vec(collection(), 0..3),
    )
        .prop_map(|(prefix, prefix_wildcards, group, group_from_body, suffix)| Shape {
            prefix,
            prefix_wildcards,
            group,
            group_from_body,
            suffix,
        })
}

fn shape_with_ids() -> impl Strategy<Value = (Shape, Vec<String>)> {
    shape().prop_flat_map(|shape| {
        let count = shape.wildcards();
        (Just(shape), prop::collection::vec(segment_id(), count))
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: canonical text survives parse and display unchanged
    #[test]
    fn prop_pattern_text_round_trips(shape in shape()) {
        let text = shape.text();
        let pattern = UnificationPattern::parse(&text).unwrap();

        prop_assert_eq!(pattern.to_string(), text);
        prop_assert_eq!(pattern.entries().len(), shape.wildcards());
    }

    /// Property: a path built from the pattern matches it, capturing every id in order
    #[test]
    fn prop_built_path_matches((shape, ids) in shape_with_ids()) {
        let pattern = UnificationPattern::parse(&shape.text()).unwrap();
        let matcher = pattern.matching_pattern();
        let path = shape.path(&ids);

        let captures = matcher.captures(&path);
        prop_assert!(captures.is_some(), "{} should match {}", path, matcher);
        let captures: Vec<String> = captures.unwrap().into_iter().map(String::from).collect();
        prop_assert_eq!(captures, ids);
        let trailing = format!("{}/", path);
        prop_assert!(matcher.matches(&trailing));
    }

    /// Property: segment counts must agree exactly
    #[test]
    fn prop_no_prefix_matches((shape, ids) in shape_with_ids(), extra in segment_id()) {
        let matcher = UnificationPattern::parse(&shape.text()).unwrap().matching_pattern();
        let path = shape.path(&ids);

        let longer = format!("{}/{}", path, extra);
        prop_assert!(!matcher.matches(&longer));
        let parent = path.rsplit_once('/').map(|(head, _)| head.to_string()).unwrap_or_default();
        prop_assert!(!matcher.matches(&parent));
    }

    /// Property: a pattern never conflicts with itself, but twice is a duplicate
    #[test]
    fn prop_duplicate_is_rejected(shape in shape()) {
        let text = shape.text();
        prop_assert!(PatternSet::parse(&text).is_ok());
        let doubled = format!("{}\n{}", text, text);
        prop_assert!(PatternSet::parse(&doubled).is_err());
    }
}
