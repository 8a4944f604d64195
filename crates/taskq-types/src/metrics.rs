// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! In-process counter registry (§4.J). No scrape endpoint is wired up here —
//! serving these to an external collector is the kind of thin adapter §1
//! scopes out — but every quantity §4.J names is tracked and readable
//! through this module's accessors, independent of whatever transport (or
//! none) ends up exporting them.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Registry {
    tasks_fetched: AtomicU64,
    connector_retries: AtomicU64,
    outcomes: Mutex<HashMap<&'static str, u64>>,
    killer_tiers: Mutex<HashMap<&'static str, u64>>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::default);

/// Records that a batch fetch returned `n` tasks.
pub fn record_tasks_fetched(n: u64) {
    REGISTRY.tasks_fetched.fetch_add(n, Ordering::Relaxed);
}

/// Records one executed task's terminal outcome, keyed by [`Outcome::label`](crate::Outcome::label).
pub fn record_outcome(label: &'static str) {
    *REGISTRY.outcomes.lock().unwrap().entry(label).or_insert(0) += 1;
}

/// Records one Killer escalation tier firing ("soft", "hard", or "critical").
pub fn record_killer_tier_fired(tier: &'static str) {
    *REGISTRY
        .killer_tiers
        .lock()
        .unwrap()
        .entry(tier)
        .or_insert(0) += 1;
}

/// Records one connector call being retried after a transient error, at
/// either the broker driver's own retry layer or the supervisor's.
pub fn record_connector_retry() {
    REGISTRY.connector_retries.fetch_add(1, Ordering::Relaxed);
}

pub fn tasks_fetched() -> u64 {
    REGISTRY.tasks_fetched.load(Ordering::Relaxed)
}

pub fn connector_retries() -> u64 {
    REGISTRY.connector_retries.load(Ordering::Relaxed)
}

pub fn outcome_count(label: &str) -> u64 {
    *REGISTRY.outcomes.lock().unwrap().get(label).unwrap_or(&0)
}

pub fn killer_tier_count(tier: &str) -> u64 {
    *REGISTRY
        .killer_tiers
        .lock()
        .unwrap()
        .get(tier)
        .unwrap_or(&0)
}
