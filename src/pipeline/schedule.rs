//! Batch scheduling: fan out over distinct names, then rebuild input order.
//!
//! The run has two explicit phases:
//!
//! 1. **Fan-out.** Every distinct name is acquired from the [`DedupCache`]
//!    exactly once, at most `concurrency` at a time. Completion order is
//!    whatever the network makes it.
//! 2. **Reconstruction.** With every name settled, the original entries are
//!    walked in input order and each `Ready` entry contributes `count` copies
//!    of its asset. This pass is pure and never looks at completion order,
//!    which is what keeps the output deterministic.

use crate::error::EntryError;
use crate::output::{ImageAsset, RequestEntry, SkippedEntry};
use crate::pipeline::cache::{DedupCache, Outcome};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Largest number of copies a single run will expand and lay out.
pub const MAX_TOTAL_COPIES: u64 = 100_000;

/// The ordered per-copy sequence plus everything that was left out.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// One reference per placed copy, in input order then copy order.
    pub sequence: Vec<Arc<ImageAsset>>,
    /// Entries whose name failed, in input order.
    pub skipped: Vec<SkippedEntry>,
    pub unique_names: usize,
    pub ready_names: usize,
    pub failed_names: usize,
    pub requested_copies: u64,
}

/// Drives a batch of entries through the cache.
pub struct Scheduler {
    cache: DedupCache,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Scheduler {
    pub fn new(cache: DedupCache, concurrency: usize) -> Self {
        Self {
            cache,
            concurrency: concurrency.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    /// Resolve and fetch every distinct name, then rebuild the sequence.
    pub async fn run(&self, entries: &[RequestEntry]) -> Schedule {
        let names = distinct_names(entries);
        info!(
            "Fetching {} distinct names for {} entries (concurrency {})",
            names.len(),
            entries.len(),
            self.concurrency
        );
        if let Some(ref cb) = self.progress {
            cb.on_run_start(names.len());
        }

        let outcomes = self.fan_out(&names).await;
        let schedule = reconstruct(entries, &outcomes);

        if let Some(ref cb) = self.progress {
            cb.on_run_complete(schedule.unique_names, schedule.ready_names);
        }
        schedule
    }

    /// Phase 1: one `acquire` per name, bounded by `concurrency`.
    pub async fn fan_out(&self, names: &[&str]) -> HashMap<String, Outcome> {
        stream::iter(names.iter().map(|&name| async move {
            let outcome = self.cache.acquire(name).await;
            (name.to_string(), outcome)
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await
    }
}

/// Total copies requested across `entries`.
pub fn requested_copies(entries: &[RequestEntry]) -> u64 {
    entries.iter().map(|e| u64::from(e.count)).sum()
}

/// Distinct names in order of first appearance.
pub fn distinct_names(entries: &[RequestEntry]) -> Vec<&str> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .map(|e| e.name.as_str())
        .filter(|name| seen.insert(*name))
        .collect()
}

/// Phase 2: walk entries in input order against settled outcomes.
pub fn reconstruct(entries: &[RequestEntry], outcomes: &HashMap<String, Outcome>) -> Schedule {
    let mut schedule = Schedule {
        unique_names: outcomes.len(),
        ready_names: outcomes.values().filter(|o| o.is_ready()).count(),
        ..Schedule::default()
    };
    schedule.failed_names = schedule.unique_names - schedule.ready_names;

    for entry in entries {
        schedule.requested_copies += u64::from(entry.count);
        match outcomes.get(&entry.name) {
            Some(Outcome::Ready(asset)) => {
                schedule
                    .sequence
                    .extend(std::iter::repeat_n(Arc::clone(asset), entry.count as usize));
            }
            Some(Outcome::Failed(reason)) => {
                warn!("Skipping line {} ({} × {}): {}", entry.line, entry.count, entry.name, reason);
                schedule.skipped.push(SkippedEntry {
                    line: entry.line,
                    name: entry.name.clone(),
                    requested: entry.count,
                    reason: reason.clone(),
                });
            }
            None => {
                schedule.skipped.push(SkippedEntry {
                    line: entry.line,
                    name: entry.name.clone(),
                    requested: entry.count,
                    reason: EntryError::NotFound {
                        name: entry.name.clone(),
                        detail: "name was never fetched".into(),
                    },
                });
            }
        }
    }

    debug!(
        "Reconstructed {} copies, {} skipped entries",
        schedule.sequence.len(),
        schedule.skipped.len()
    );
    schedule
}
