// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! - `pattern_laws` - unification pattern text and path matching
//! - `matching_laws` - greedy component assignment

mod matching_laws;
mod pattern_laws;
