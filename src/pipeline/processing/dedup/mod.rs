//! Cross-source and cross-campaign deduplication.
//!
//! Batches are consumed in caller order and the first copy of a lead wins.
//! Duplicates are dropped, never merged.

pub mod identity;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::domain::Lead;
use crate::observability::metrics;

pub use identity::{identity_keys, IdentityKey, IdentityKeys, KeyKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Leads offered to the deduplicator (seeded history excluded)
    pub total_input: usize,
    /// Removed duplicates, attributed to the strongest matching key kind
    pub duplicates_by_kind: BTreeMap<KeyKind, usize>,
    pub unique: usize,
    /// Historical leads used to seed the seen-set
    pub seeded_leads: usize,
    /// Batches that could not be loaded and were left out
    pub skipped_batches: usize,
}

impl DedupStats {
    pub fn duplicates_removed(&self) -> usize {
        self.duplicates_by_kind.values().sum()
    }
}

/// Owns the seen identity keys for one consolidation run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<(KeyKind, String)>,
    stats: DedupStats,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the keys of previously accepted leads without emitting them.
    pub fn seed<'a>(&mut self, leads: impl IntoIterator<Item = &'a Lead>) {
        for lead in leads {
            self.remember(&identity_keys(lead));
            self.stats.seeded_leads += 1;
        }
    }

    /// The strongest key kind under which `keys` were already seen.
    pub fn first_match(&self, keys: &IdentityKeys) -> Option<KeyKind> {
        KeyKind::PRIORITY.into_iter().find(|kind| {
            keys.get(*kind)
                .is_some_and(|value| self.seen.contains(&(*kind, value.to_string())))
        })
    }

    fn remember(&mut self, keys: &IdentityKeys) {
        for key in keys.iter() {
            debug_assert!(!key.value.is_empty(), "empty identity key reached the seen-set");
            if key.value.is_empty() {
                continue;
            }
            self.seen.insert((key.kind, key.value.clone()));
        }
    }

    /// Accept or drop one lead. Returns the lead when it is the first copy.
    pub fn offer(&mut self, lead: Lead) -> Option<Lead> {
        self.stats.total_input += 1;
        let keys = identity_keys(&lead);

        if let Some(kind) = self.first_match(&keys) {
            debug!(
                "Dropping duplicate from {} matched on {}: {:?}",
                lead.source,
                kind,
                keys.get(kind)
            );
            *self.stats.duplicates_by_kind.entry(kind).or_insert(0) += 1;
            metrics::dedup::duplicate_removed(kind.as_str());
            return None;
        }

        self.remember(&keys);
        self.stats.unique += 1;
        Some(lead)
    }

    pub fn process_batch(&mut self, batch: Vec<Lead>) -> Vec<Lead> {
        let input = batch.len();
        let kept: Vec<Lead> = batch.into_iter().filter_map(|lead| self.offer(lead)).collect();
        metrics::dedup::batch_processed(input, kept.len());
        kept
    }

    /// Count a batch that could not be loaded.
    pub fn record_skipped_batch(&mut self) {
        self.stats.skipped_batches += 1;
    }

    pub fn stats(&self) -> &DedupStats {
        &self.stats
    }

    pub fn into_stats(self) -> DedupStats {
        self.stats
    }
}

/// Deduplicate ordered batches (oldest first). Earlier batches win.
pub fn deduplicate(batches: Vec<Vec<Lead>>) -> (Vec<Lead>, DedupStats) {
    let mut deduplicator = Deduplicator::new();
    let mut kept = Vec::new();
    for batch in batches {
        kept.extend(deduplicator.process_batch(batch));
    }
    let stats = deduplicator.into_stats();
    info!(
        "Intra-run dedup: {} in, {} unique, {} duplicates",
        stats.total_input,
        stats.unique,
        stats.duplicates_removed()
    );
    (kept, stats)
}

/// Deduplicate a new batch against a client's accepted history. `history` must
/// be ordered oldest campaign first; only survivors of `new_batch` are returned.
pub fn deduplicate_against_history(
    history: &[Vec<Lead>],
    new_batch: Vec<Lead>,
) -> (Vec<Lead>, DedupStats) {
    let mut deduplicator = Deduplicator::new();
    for campaign in history {
        deduplicator.seed(campaign);
    }
    let kept = deduplicator.process_batch(new_batch);
    let stats = deduplicator.into_stats();
    info!(
        "Cross-campaign dedup: {} seeded, {} in, {} unique, {} duplicates",
        stats.seeded_leads,
        stats.total_input,
        stats.unique,
        stats.duplicates_removed()
    );
    (kept, stats)
}
