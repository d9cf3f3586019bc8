//! Per-Source State Store
//!
//! One record per source identity, created on first sighting and kept for
//! the whole run.

use std::collections::HashMap;

use super::window::SlidingWindow;
use crate::types::{Seconds, SourceIdentity};

/// Mutable state tracked for one source
#[derive(Debug, Clone, Default)]
pub struct SourceRecord {
    /// Admitted events in the current window
    pub(crate) window: SlidingWindow,

    /// Policy violations attributed to this source
    pub(crate) violations: u32,

    /// Terminal state for the run
    pub(crate) blocked: bool,

    /// Events accepted from this source
    pub(crate) accepted: u64,

    /// Events rejected from this source (including blocked drops)
    pub(crate) rejected: u64,

    /// Timestamp of the most recent event evaluated
    pub(crate) last_seen: Option<Seconds>,
}

impl SourceRecord {
    /// Violations attributed so far
    pub fn violations(&self) -> u32 {
        self.violations
    }

    /// Source is blocked for the rest of the run
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Events accepted
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Events rejected, blocked drops included
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Timestamp of the latest evaluated event
    pub fn last_seen(&self) -> Option<Seconds> {
        self.last_seen
    }

    /// Sliding window of admitted events
    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }
}

/// Map of source identity to its record
#[derive(Debug)]
pub struct SourceStore<S> {
    records: HashMap<S, SourceRecord>,

    /// Sources in the order of their first violation
    violators: Vec<S>,
}

impl<S: SourceIdentity> Default for SourceStore<S> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            violators: Vec::new(),
        }
    }
}

impl<S: SourceIdentity> SourceStore<S> {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for `source`, creating it on first sighting
    pub fn get_or_insert(&mut self, source: &S) -> &mut SourceRecord {
        self.records.entry(source.clone()).or_default()
    }

    /// Record for `source`, if it has been seen
    pub fn get(&self, source: &S) -> Option<&SourceRecord> {
        self.records.get(source)
    }

    /// Remember that `source` just received its first violation
    pub(crate) fn note_first_violation(&mut self, source: &S) {
        self.violators.push(source.clone());
    }

    /// Sources with at least one violation, in first-violation order
    pub fn violators(&self) -> impl Iterator<Item = (&S, &SourceRecord)> {
        self.violators
            .iter()
            .filter_map(move |source| self.records.get(source).map(|record| (source, record)))
    }

    /// Distinct sources tracked
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// No source tracked yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sources in the blocked state
    pub fn blocked_count(&self) -> usize {
        self.records.values().filter(|r| r.blocked).count()
    }
}
