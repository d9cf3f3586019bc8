//! Metrics Collection
//!
//! Run-level counters for the defense engine and for the legitimate / attack
//! traffic observed around it. Counters are atomic so they can be read from
//! outside the task that owns the engine.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Decision counters maintained by the engine.
///
/// These feed the report only; the engine never decides on them.
#[derive(Debug, Default)]
pub struct DefenseMetrics {
    /// Events evaluated
    pub evaluated: AtomicU64,

    /// Events accepted
    pub accepted: AtomicU64,

    /// Events rejected for any reason
    pub rejected: AtomicU64,

    /// Rejections of already-blocked sources
    pub blocked_drops: AtomicU64,

    /// Rejections by the rate limit
    pub rate_violations: AtomicU64,

    /// Rejections by the burst check
    pub burst_violations: AtomicU64,

    /// Violations reported from outside the decision path
    pub external_violations: AtomicU64,

    /// Sources escalated to a permanent block
    pub sources_blocked: AtomicU64,
}

/// Point-in-time copy of [`DefenseMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub evaluated: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub blocked_drops: u64,
    pub rate_violations: u64,
    pub burst_violations: u64,
    pub external_violations: u64,
    pub sources_blocked: u64,
}

impl DefenseMetrics {
    /// Create a zeroed collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one evaluated event
    pub fn inc_evaluated(&self) {
        self.evaluated.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one accepted event
    pub fn inc_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a drop from an already-blocked source
    pub fn inc_blocked_drop(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.blocked_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a rate limit rejection
    pub fn inc_rate_violation(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.rate_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a burst check rejection
    pub fn inc_burst_violation(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.burst_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a violation reported by a caller
    pub fn inc_external_violation(&self) {
        self.external_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a source escalated to a block
    pub fn inc_sources_blocked(&self) {
        self.sources_blocked.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            evaluated: self.evaluated.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            blocked_drops: self.blocked_drops.load(Ordering::Relaxed),
            rate_violations: self.rate_violations.load(Ordering::Relaxed),
            burst_violations: self.burst_violations.load(Ordering::Relaxed),
            external_violations: self.external_violations.load(Ordering::Relaxed),
            sources_blocked: self.sources_blocked.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter. Per-source state is not touched.
    pub fn reset(&self) {
        for counter in [
            &self.evaluated,
            &self.accepted,
            &self.rejected,
            &self.blocked_drops,
            &self.rate_violations,
            &self.burst_violations,
            &self.external_violations,
            &self.sources_blocked,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Output format for exported counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MetricsFormat {
    Prometheus,
    Json,
}

impl MetricsSnapshot {
    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("aodv_shield_events_evaluated_total", "Control messages evaluated", self.evaluated),
            ("aodv_shield_events_accepted_total", "Control messages accepted", self.accepted),
            ("aodv_shield_events_rejected_total", "Control messages rejected", self.rejected),
            ("aodv_shield_blocked_drops_total", "Messages dropped from blocked sources", self.blocked_drops),
            ("aodv_shield_rate_violations_total", "Rate limit violations", self.rate_violations),
            ("aodv_shield_burst_violations_total", "Burst pattern violations", self.burst_violations),
            ("aodv_shield_external_violations_total", "Violations reported by callers", self.external_violations),
            ("aodv_shield_sources_blocked_total", "Sources escalated to a permanent block", self.sources_blocked),
        ];

        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP {name} {help}\n\
                 # TYPE {name} counter\n\
                 {name} {value}\n\n"
            ));
        }

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "events": {
                "evaluated": self.evaluated,
                "accepted": self.accepted,
                "rejected": self.rejected,
            },
            "rejections": {
                "blocked": self.blocked_drops,
                "rate_limit": self.rate_violations,
                "burst": self.burst_violations,
            },
            "external_violations": self.external_violations,
            "sources_blocked": self.sources_blocked,
        })
    }

    /// Render in the requested export format
    pub fn export(&self, format: MetricsFormat) -> String {
        match format {
            MetricsFormat::Prometheus => self.to_prometheus(),
            MetricsFormat::Json => self.to_json().to_string(),
        }
    }
}

/// Counters reported by traffic generators, outside the decision path
#[derive(Debug, Default)]
pub struct TrafficTracer {
    /// Legitimate packets sent
    pub legit_sent: AtomicU64,

    /// Legitimate packets delivered
    pub legit_received: AtomicU64,

    /// Attack packets generated
    pub attack_sent: AtomicU64,
}

/// Point-in-time copy of [`TrafficTracer`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    pub legit_sent: u64,
    pub legit_received: u64,
    pub attack_sent: u64,
}

impl TrafficTracer {
    /// Create a zeroed tracer
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a legitimate packet sent
    pub fn inc_legit_sent(&self) {
        self.legit_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a legitimate packet delivered
    pub fn inc_legit_received(&self) {
        self.legit_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an attack packet generated
    pub fn inc_attack_sent(&self) {
        self.attack_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current traffic counts
    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot {
            legit_sent: self.legit_sent.load(Ordering::Relaxed),
            legit_received: self.legit_received.load(Ordering::Relaxed),
            attack_sent: self.attack_sent.load(Ordering::Relaxed),
        }
    }

    /// Zero every traffic counter
    pub fn reset(&self) {
        self.legit_sent.store(0, Ordering::Relaxed);
        self.legit_received.store(0, Ordering::Relaxed);
        self.attack_sent.store(0, Ordering::Relaxed);
    }
}
