// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Identity Unification
//!
//! Many agents expose the same physical hardware under their own paths.
//! This module maps those backend paths onto one canonical namespace.
//!
//! ```text
//! pattern file ──► PatternSet ──► ResourceUnifier
//!                    │                 │
//!                    │ MatchingPattern │ registry (service, path) ⇄ canonical
//!                    ▼                 ▼
//!            one rule per path   rewritten bodies and links
//! ```

pub mod matching;
pub mod pattern;
pub mod pattern_set;
pub mod unifier;

pub use matching::{MatchingPattern, Segment};
pub use pattern::{
    LookupFunction, PatternSyntaxError, SourceSlot, TargetEntry, TemplatePart, UnificationPattern,
    ARROW,
};
pub use pattern_set::{PatternSet, PatternSetError};
pub use unifier::{
    ResourceUnifier, UnificationError, Unified, EXTENDED_INFO_SUFFIX, ODATA_ID,
    UNRESOLVABLE_MESSAGE_ID,
};
