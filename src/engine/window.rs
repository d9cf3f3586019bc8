//! Sliding Window Tracker
//!
//! Keeps the timestamps of recently admitted events for one source, oldest
//! first. Eviction is paid for by earlier insertions, so admission is
//! amortized O(1).

use std::collections::VecDeque;

use crate::types::Seconds;

/// Result of a rate-limit admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Window had room for this event
    pub within_limit: bool,

    /// Window occupancy before the event was considered
    pub window_size: usize,
}

/// Ordered timestamps of admitted events within the current window
#[derive(Debug, Clone, Default)]
pub struct SlidingWindow {
    timestamps: VecDeque<Seconds>,
}

impl SlidingWindow {
    /// Create an empty window
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp strictly older than `now - window_secs`
    pub fn evict(&mut self, now: Seconds, window_secs: Seconds) {
        while let Some(&oldest) = self.timestamps.front() {
            if now - oldest > window_secs {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Evict, then admit `now` if fewer than `rate_limit` events remain.
    ///
    /// Rejected events are not recorded, so a dropped probe never inflates
    /// the measured rate.
    pub fn admit(&mut self, now: Seconds, window_secs: Seconds, rate_limit: u32) -> Admission {
        self.evict(now, window_secs);

        let window_size = self.timestamps.len();
        let within_limit = window_size < rate_limit as usize;

        if within_limit {
            self.timestamps.push_back(now);
        }

        Admission { within_limit, window_size }
    }

    /// Record `now` unconditionally after evicting stale entries
    pub fn record(&mut self, now: Seconds, window_secs: Seconds) {
        self.evict(now, window_secs);
        self.timestamps.push_back(now);
    }

    /// Time covered by the last `burst_size` entries, if there are that many
    pub fn burst_span(&self, burst_size: usize) -> Option<Seconds> {
        let len = self.timestamps.len();
        if burst_size == 0 || len < burst_size {
            return None;
        }

        let newest = self.timestamps[len - 1];
        let start = self.timestamps[len - burst_size];
        Some(newest - start)
    }

    /// Burst sub-check on the post-append window.
    ///
    /// Returns the observed span when the last `burst_size` events fit
    /// inside less than `max_span` seconds.
    pub fn detect_burst(&self, burst_size: usize, max_span: Seconds) -> Option<Seconds> {
        self.burst_span(burst_size).filter(|span| *span < max_span)
    }

    /// Remove the most recently admitted timestamp
    pub fn retract_last(&mut self) -> Option<Seconds> {
        self.timestamps.pop_back()
    }

    /// Events currently in the window
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// No events in the window
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Earliest retained timestamp
    pub fn oldest(&self) -> Option<Seconds> {
        self.timestamps.front().copied()
    }

    /// Latest retained timestamp
    pub fn newest(&self) -> Option<Seconds> {
        self.timestamps.back().copied()
    }

    /// Retained timestamps, oldest first
    pub fn iter(&self) -> impl Iterator<Item = Seconds> + '_ {
        self.timestamps.iter().copied()
    }
}
