// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! atlas-cli: binaries and the built-in handler registrations.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod handlers;

use tracing_subscriber::EnvFilter;

/// `ATLAS_LOG` env filter, defaulting to info.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ATLAS_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Parse the `--consumers <routing-key> <count> …` pair list.
pub fn parse_consumer_pairs(args: &[String]) -> anyhow::Result<Vec<(String, usize)>> {
    if args.is_empty() || args.len() % 2 == 1 {
        anyhow::bail!("--consumers takes routing-key/count pairs");
    }
    let mut pairs: Vec<(String, usize)> = Vec::new();
    for chunk in args.chunks(2) {
        let routing_key = chunk[0].clone();
        if pairs.iter().any(|(key, _)| *key == routing_key) {
            anyhow::bail!("duplicate consumer: {routing_key}");
        }
        let count: usize = chunk[1]
            .parse()
            .map_err(|_| anyhow::anyhow!("bad instance count for {routing_key}: {}", chunk[1]))?;
        if count == 0 {
            anyhow::bail!("instance count for {routing_key} must be positive");
        }
        pairs.push((routing_key, count));
    }
    Ok(pairs)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
