//! Violation Ledger & Escalation Policy
//!
//! Violations only ever go up. With permanent blocking enabled, a source
//! that reaches the threshold stays blocked until the run ends.

use super::store::SourceRecord;
use crate::config::DefenseConfig;
use crate::types::Severity;

/// Outcome of recording one violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escalation {
    /// Violation count after this one
    pub count: u32,

    /// This violation moved the source into the blocked state
    pub newly_blocked: bool,
}

/// Counts violations and applies the escalation policy
#[derive(Debug, Clone, Copy)]
pub struct ViolationLedger {
    block_threshold: u32,
    permanent_block: bool,
}

impl ViolationLedger {
    /// Create a ledger with an explicit threshold and block policy
    pub fn new(block_threshold: u32, permanent_block: bool) -> Self {
        Self {
            block_threshold,
            permanent_block,
        }
    }

    /// Create a ledger from the engine policy
    pub fn from_config(config: &DefenseConfig) -> Self {
        Self::new(config.block_threshold, config.permanent_block)
    }

    /// Add one violation to `record` and escalate if the threshold is reached
    pub fn record(&self, record: &mut SourceRecord) -> Escalation {
        record.violations = record.violations.saturating_add(1);

        let newly_blocked = self.permanent_block
            && !record.blocked
            && record.violations >= self.block_threshold;

        if newly_blocked {
            record.blocked = true;
        }

        Escalation {
            count: record.violations,
            newly_blocked,
        }
    }

    /// Check if `record` is in the blocked state
    pub fn is_blocked(&self, record: &SourceRecord) -> bool {
        record.blocked
    }

    /// Severity label for a violation count
    pub fn severity(&self, violations: u32) -> Severity {
        Severity::classify(violations, self.block_threshold)
    }

    /// Violations needed for a block
    pub fn block_threshold(&self) -> u32 {
        self.block_threshold
    }
}
