// Copyright (c) 2025 - Cowboy AI, Inc.
//! Unification Pattern Checker
//!
//! Loads a unification pattern file exactly as the pod manager would at
//! startup and reports whether it is usable.
//!
//! Run with: cargo run --bin pattern-check -- [PATTERN_FILE]
//!
//! Without an argument the file named by `PODM_UNIFICATION_PATTERNS` is
//! checked. Any syntax error, duplicate or conflict exits non-zero.

use anyhow::{bail, Context, Result};
use podm_composition::PodmConfig;
use std::process::ExitCode;
use tracing::{error, info};

fn check() -> Result<usize> {
    let mut config = PodmConfig::from_env().context("Invalid PODM_* configuration")?;
    if let Some(path) = std::env::args().nth(1) {
        config.unification_patterns_path = Some(path);
    }

    let path = match &config.unification_patterns_path {
        Some(path) => path.clone(),
        None => bail!("no pattern file given and PODM_UNIFICATION_PATTERNS is not set"),
    };
    info!(path = %path, root = %config.canonical_root, "Checking unification patterns");

    let patterns = config
        .unification_patterns()
        .with_context(|| format!("Failed to load {}", path))?;
    for pattern in patterns.patterns() {
        info!(pattern = %pattern, "Accepted");
    }
    Ok(patterns.len())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match check() {
        Ok(count) => {
            info!(count, "Pattern file is valid");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Pattern file rejected");
            ExitCode::FAILURE
        }
    }
}
