use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::HistoryConfig, entity::Compound, optimizer::OptimizationResult,
    stability::StabilityScore,
};

/// One completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationHistoryEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// When the analysis ran.
    pub timestamp: DateTime<Utc>,
    /// Compound analysed.
    pub compound: Compound,
    /// Optimizer output.
    pub optimization: OptimizationResult,
    /// Stability score the optimizer consumed.
    pub stability: StabilityScore,
}

impl MutationHistoryEntry {
    /// Creates an entry with a fresh id.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        compound: Compound,
        optimization: OptimizationResult,
        stability: StabilityScore,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            compound,
            optimization,
            stability,
        }
    }
}

/// Ring buffer of analyses. When full, the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct MutationHistory {
    entries: VecDeque<MutationHistoryEntry>,
    capacity: usize,
    window: usize,
    recorded: u64,
}

impl MutationHistory {
    /// Creates an empty history; capacity and window are raised to at least 1.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            window: config.window.max(1),
            recorded: 0,
        }
    }

    /// Appends an entry, returning the evicted one when the buffer was full.
    pub fn push(&mut self, entry: MutationHistoryEntry) -> Option<MutationHistoryEntry> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        self.recorded += 1;
        evicted
    }

    /// The last `n` entries, oldest first.
    #[must_use]
    pub fn trailing(&self, n: usize) -> Vec<&MutationHistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    /// The configured trailing window read by the optimizer.
    #[must_use]
    pub fn window(&self) -> Vec<&MutationHistoryEntry> {
        self.trailing(self.window)
    }

    /// Retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MutationHistoryEntry> + '_ {
        self.entries.iter()
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&MutationHistoryEntry> {
        self.entries.back()
    }

    /// Retained entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum retained entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries ever pushed, including evicted ones.
    #[must_use]
    pub const fn total_recorded(&self) -> u64 {
        self.recorded
    }

    /// Drops all retained entries; the lifetime counter is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
