// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Unifier
//!
//! Rewrites backend resource identities into the canonical namespace and
//! remembers every (service, path) → canonical mapping it has produced.
//!
//! # Flow
//!
//! ```text
//! (service, /redfish/v1/Systems/1, body)
//!        │ PatternSet::find
//!        ▼
//! /redfish/v1/[Systems/{}] -> {#/UUID}
//!        │ render + register
//!        ▼
//! /redfish/v1/Systems/8d2c1ac0-...   (+ body with @odata.id, Id, links rewritten)
//! ```
//!
//! # Collisions
//!
//! Two backend resources rendering the same canonical path are one
//! physical resource seen through two agents. All backing references are
//! kept sorted; de-unification prefers the caller's service and falls
//! back to the smallest reference, so the choice is deterministic.
//!
//! # Unresolvable References
//!
//! A link that cannot be unified is nulled and annotated with an
//! extended-info diagnostic next to it; the surrounding object stays.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{normalize_path, ResourceReference, ServiceId};

use super::matching::{split_path, Segment};
use super::pattern::{TargetEntry, UnificationPattern};
use super::pattern_set::PatternSet;

pub const ODATA_ID: &str = "@odata.id";
pub const EXTENDED_INFO_SUFFIX: &str = "@Message.ExtendedInfo";
pub const UNRESOLVABLE_MESSAGE_ID: &str = "Podm.1.0.UnresolvableReference";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnificationError {
    #[error("resource {0} is outside the canonical namespace and matches no pattern")]
    Foreign(ResourceReference),

    #[error("cannot derive canonical path for {reference}: {reason}")]
    Unresolvable {
        reference: ResourceReference,
        reason: String,
    },
}

/// Result of unifying one resource
#[derive(Debug, Clone, PartialEq)]
pub struct Unified {
    pub canonical_path: String,
    pub body: Value,
}

#[derive(Debug, Default)]
struct Registry {
    forward: HashMap<ResourceReference, String>,
    backing: BTreeMap<String, BTreeSet<ResourceReference>>,
}

/// Applies a [`PatternSet`] and tracks produced identities
#[derive(Debug)]
pub struct ResourceUnifier {
    patterns: PatternSet,
    canonical_root: String,
    registry: RwLock<Registry>,
}

impl ResourceUnifier {
    pub fn new(patterns: PatternSet, canonical_root: impl Into<String>) -> Self {
        Self {
            patterns,
            canonical_root: normalize_path(&canonical_root.into()),
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Unify a resource body fetched from `service` at `path`
    ///
    /// The input body is left untouched; the rewritten copy is returned.
    pub fn unify(
        &self,
        service: ServiceId,
        path: &str,
        body: &Value,
    ) -> Result<Unified, UnificationError> {
        let reference = ResourceReference::new(service, path);
        let canonical_path = self.canonical_path(&reference, Some(body))?;
        self.register(&reference, &canonical_path);

        let mut rewritten = self.rewrite_links(service, body);
        if let Value::Object(map) = &mut rewritten {
            map.insert(ODATA_ID.to_string(), Value::String(canonical_path.clone()));
            if map.contains_key("Id") {
                let id = canonical_path.rsplit('/').next().unwrap_or_default();
                map.insert("Id".to_string(), Value::String(id.to_string()));
            }
        }

        debug!(reference = %reference, canonical = %canonical_path, "Unified resource");
        Ok(Unified {
            canonical_path,
            body: rewritten,
        })
    }

    /// Canonical path for a link found inside a body, if it can be derived
    pub fn resolve_reference(&self, service: ServiceId, link: &str) -> Option<String> {
        let (path, fragment) = match link.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (link, None),
        };
        let reference = ResourceReference::new(service, path);

        let canonical = match self.lookup(&reference) {
            Some(known) => known,
            None => self.canonical_path(&reference, None).ok()?,
        };
        Some(match fragment {
            Some(fragment) => format!("{}#{}", canonical, fragment),
            None => canonical,
        })
    }

    /// Backend reference serving a canonical path, preferring `service`
    pub fn deunify(&self, service: ServiceId, canonical_path: &str) -> ResourceReference {
        let canonical_path = normalize_path(canonical_path);
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);

        let mut ancestor = canonical_path.as_str();
        loop {
            if let Some(backing) = registry.backing.get(ancestor) {
                let chosen = backing
                    .iter()
                    .find(|r| r.service == service)
                    .or_else(|| backing.iter().next());
                if let Some(chosen) = chosen {
                    let suffix = &canonical_path[ancestor.len()..];
                    return ResourceReference::new(chosen.service, format!("{}{}", chosen.path, suffix));
                }
            }
            match ancestor.rfind('/') {
                Some(0) | None => break,
                Some(cut) => ancestor = &ancestor[..cut],
            }
        }
        ResourceReference::new(service, canonical_path)
    }

    /// Previously produced canonical path for a backend reference
    pub fn lookup(&self, reference: &ResourceReference) -> Option<String> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .forward
            .get(reference)
            .cloned()
    }

    /// All backend references known to serve a canonical path, sorted
    pub fn backing_references(&self, canonical_path: &str) -> Vec<ResourceReference> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .backing
            .get(&normalize_path(canonical_path))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn register(&self, reference: &ResourceReference, canonical_path: &str) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = registry
            .forward
            .insert(reference.clone(), canonical_path.to_string())
        {
            if previous != canonical_path {
                if let Some(set) = registry.backing.get_mut(&previous) {
                    set.remove(reference);
                }
            }
        }
        registry
            .backing
            .entry(canonical_path.to_string())
            .or_default()
            .insert(reference.clone());
    }

    fn is_under_root(&self, path: &str) -> bool {
        path == self.canonical_root
            || path
                .strip_prefix(self.canonical_root.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn canonical_path(
        &self,
        reference: &ResourceReference,
        body: Option<&Value>,
    ) -> Result<String, UnificationError> {
        let Some((pattern, captures)) = self.patterns.find(&reference.path) else {
            return if self.is_under_root(&reference.path) {
                Ok(self.rebase_on_ancestor(reference))
            } else {
                Err(UnificationError::Foreign(reference.clone()))
            };
        };
        self.render(pattern, reference, &captures, body)
    }

    /// Rewrite the longest unified ancestor of an unmatched path
    ///
    /// `/redfish/v1/Systems/1/Processors` becomes
    /// `/redfish/v1/Systems/<canonical>/Processors` once `Systems/1` is known.
    fn rebase_on_ancestor(&self, reference: &ResourceReference) -> String {
        let path = reference.path.as_str();
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let mut cut = path.len();
        while let Some(position) = path[..cut].rfind('/') {
            if position == 0 {
                break;
            }
            cut = position;
            let ancestor = ResourceReference::new(reference.service, &path[..cut]);
            if let Some(canonical) = registry.forward.get(&ancestor) {
                return format!("{}{}", canonical, &path[cut..]);
            }
        }
        path.to_string()
    }

    fn render(
        &self,
        pattern: &UnificationPattern,
        reference: &ResourceReference,
        captures: &[&str],
        body: Option<&Value>,
    ) -> Result<String, UnificationError> {
        let unresolvable = |reason: String| UnificationError::Unresolvable {
            reference: reference.clone(),
            reason,
        };
        let parts = split_path(&reference.path).unwrap_or_default();
        let mut segments: Vec<String> = Vec::new();

        for (position, slot) in pattern.slots().into_iter().enumerate() {
            if !slot.canonical {
                continue;
            }
            let value = match (slot.segment, slot.wildcard_index) {
                (Segment::Literal(text), _) => text.clone(),
                (Segment::Wildcard, Some(index)) => match &pattern.entries()[index] {
                    TargetEntry::Capture => captures[index].to_string(),
                    TargetEntry::Parent => {
                        let parent_path = format!("/{}", parts[..=position].join("/"));
                        let parent = ResourceReference::new(reference.service, parent_path);
                        let canonical = self
                            .lookup(&parent)
                            .ok_or_else(|| unresolvable(format!("parent {} not unified yet", parent.path)))?;
                        canonical.rsplit('/').next().unwrap_or_default().to_string()
                    }
                    TargetEntry::Template(template) => {
                        let body = body.ok_or_else(|| unresolvable("body required".to_string()))?;
                        TargetEntry::render_template(template, body)
                            .ok_or_else(|| unresolvable(format!("lookup '{}' yielded no id", pattern.entries()[index])))?
                    }
                    TargetEntry::Drop => continue,
                },
                _ => continue,
            };
            segments.push(value);
        }

        Ok(if pattern.is_rooted() {
            format!("{}/{}", self.canonical_root, segments.join("/"))
        } else {
            format!("/{}", segments.join("/"))
        })
    }

    fn rewrite_links(&self, service: ServiceId, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, inner) in map {
                    if key == ODATA_ID {
                        if let Value::String(link) = inner {
                            match self.resolve_reference(service, link) {
                                Some(canonical) => {
                                    out.insert(key.clone(), Value::String(canonical));
                                }
                                None => {
                                    warn!(service = %service, link = %link, "Nulling unresolvable reference");
                                    out.insert(key.clone(), Value::Null);
                                    out.insert(
                                        format!("{}{}", ODATA_ID, EXTENDED_INFO_SUFFIX),
                                        unresolvable_info(link),
                                    );
                                }
                            }
                            continue;
                        }
                    }
                    out.insert(key.clone(), self.rewrite_links(service, inner));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.rewrite_links(service, item))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn unresolvable_info(link: &str) -> Value {
    json!([{
        "MessageId": UNRESOLVABLE_MESSAGE_ID,
        "Message": format!("The reference {} could not be mapped to a pod manager resource.", link),
        "MessageArgs": [link],
        "Severity": "Warning",
        "Resolution": "Wait for discovery of the referenced resource and retry."
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PATTERNS: &str = "\
/redfish/v1/[Systems/{}] -> {#/UUID}
/redfish/v1/[Systems/{}]/Processors/{} -> {..}/{}
/redfish/v1/[Chassis/{}] -> {$durableName(#/Identifiers)}
";

    fn unifier() -> ResourceUnifier {
        ResourceUnifier::new(PatternSet::parse(PATTERNS).unwrap(), "/redfish/v1")
    }

    #[test]
    fn test_unify_system_uses_uuid() {
        let unifier = unifier();
        let service = ServiceId::new();
        let body = json!({"@odata.id": "/redfish/v1/Systems/1", "Id": "1", "UUID": "abc"});

        let unified = unifier.unify(service, "/redfish/v1/Systems/1", &body).unwrap();

        assert_eq!(unified.canonical_path, "/redfish/v1/Systems/abc");
        assert_eq!(unified.body["Id"], json!("abc"));
        assert_eq!(unified.body["@odata.id"], json!("/redfish/v1/Systems/abc"));
        assert_eq!(body["Id"], json!("1"), "input must not be mutated");
    }

    #[test]
    fn test_child_inherits_parent_segment() {
        let unifier = unifier();
        let service = ServiceId::new();
        unifier
            .unify(service, "/redfish/v1/Systems/1", &json!({"UUID": "abc"}))
            .unwrap();

        let unified = unifier
            .unify(service, "/redfish/v1/Systems/1/Processors/CPU0", &json!({"Id": "CPU0"}))
            .unwrap();
        assert_eq!(unified.canonical_path, "/redfish/v1/Systems/abc/Processors/CPU0");
    }

    #[test]
    fn test_child_before_parent_is_unresolvable() {
        let unifier = unifier();
        let err = unifier
            .unify(ServiceId::new(), "/redfish/v1/Systems/1/Processors/CPU0", &json!({}))
            .unwrap_err();
        assert!(matches!(err, UnificationError::Unresolvable { .. }));
    }

    #[test]
    fn test_links_rewritten_or_nulled() {
        let unifier = unifier();
        let service = ServiceId::new();
        unifier
            .unify(service, "/redfish/v1/Systems/1", &json!({"UUID": "abc"}))
            .unwrap();

        let chassis = json!({
            "Identifiers": [{"DurableName": "rack-1"}],
            "Links": {
                "ComputerSystems": [{"@odata.id": "/redfish/v1/Systems/1"}],
                "ManagedBy": [{"@odata.id": "/redfish/v1/Managers/1"}],
                "Oem": [{"@odata.id": "/oem/v1/Things/1"}],
                "Unknown": [{"@odata.id": "/redfish/v1/Systems/2"}]
            }
        });
        let unified = unifier.unify(service, "/redfish/v1/Chassis/7", &chassis).unwrap();
        let links = &unified.body["Links"];

        assert_eq!(unified.canonical_path, "/redfish/v1/Chassis/rack-1");
        assert_eq!(links["ComputerSystems"][0]["@odata.id"], json!("/redfish/v1/Systems/abc"));
        assert_eq!(links["ManagedBy"][0]["@odata.id"], json!("/redfish/v1/Managers/1"));
        assert_eq!(links["Oem"][0]["@odata.id"], Value::Null);
        assert_eq!(
            links["Oem"][0]["@odata.id@Message.ExtendedInfo"][0]["MessageId"],
            json!(UNRESOLVABLE_MESSAGE_ID)
        );
        assert_eq!(links["Unknown"][0]["@odata.id"], Value::Null);
    }

    #[test]
    fn test_collision_resolution_is_deterministic() {
        let unifier = unifier();
        let a = ServiceId::new();
        let b = ServiceId::new();
        let body = json!({"UUID": "same"});
        unifier.unify(b, "/redfish/v1/Systems/9", &body).unwrap();
        unifier.unify(a, "/redfish/v1/Systems/1", &body).unwrap();

        let backing = unifier.backing_references("/redfish/v1/Systems/same");
        assert_eq!(backing.len(), 2);
        assert_eq!(backing[0].service, a.min(b));

        assert_eq!(unifier.deunify(b, "/redfish/v1/Systems/same").path, "/redfish/v1/Systems/9");
        let other = ServiceId::new();
        assert_eq!(unifier.deunify(other, "/redfish/v1/Systems/same"), backing[0]);
    }

    #[test]
    fn test_deunify_child_collection_and_passthrough() {
        let unifier = unifier();
        let service = ServiceId::new();
        unifier
            .unify(service, "/redfish/v1/Systems/1", &json!({"UUID": "abc"}))
            .unwrap();

        let reference = unifier.deunify(service, "/redfish/v1/Systems/abc/Processors");
        assert_eq!(reference.path, "/redfish/v1/Systems/1/Processors");
        let reference = unifier.deunify(service, "/redfish/v1/Systems");
        assert_eq!(reference.path, "/redfish/v1/Systems");
    }

    #[test]
    fn test_fragment_links_keep_fragment() {
        let unifier = unifier();
        let service = ServiceId::new();
        unifier
            .unify(service, "/redfish/v1/Systems/1", &json!({"UUID": "abc"}))
            .unwrap();
        assert_eq!(
            unifier.resolve_reference(service, "/redfish/v1/Systems/1#/Links/Chassis/0"),
            Some("/redfish/v1/Systems/abc#/Links/Chassis/0".to_string())
        );
    }
}
