//! Core types for the defense engine
//!
//! These types describe what flows into the engine (arrival events) and
//! what comes out of it (decisions and severity labels).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Simulation time in seconds
pub type Seconds = f64;

/// Identity of the claimed origin of a control message.
///
/// Any exact-equality, hashable value works; in practice this is an `IpAddr`
/// or `Ipv4Addr`. No normalization is performed across identities.
pub trait SourceIdentity: Eq + Hash + Clone + fmt::Display {}

impl<T> SourceIdentity for T where T: Eq + Hash + Clone + fmt::Display {}

/// A single observed control message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalEvent<S> {
    /// Claimed source address
    pub source: S,

    /// Arrival time (seconds, non-decreasing per source)
    pub timestamp: Seconds,
}

impl<S> ArrivalEvent<S> {
    /// Create an arrival event
    pub fn new(source: S, timestamp: Seconds) -> Self {
        Self { source, timestamp }
    }
}

/// Why an event was rejected
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Source already escalated to permanent block
    Blocked,

    /// Window already held `limit` events
    RateLimited { window_size: usize, limit: u32 },

    /// Too many admitted events inside the burst span
    Burst { span: Seconds },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Blocked => write!(f, "source blocked"),
            RejectReason::RateLimited { window_size, limit } => {
                write!(f, "rate limit exceeded ({}/{})", window_size, limit)
            }
            RejectReason::Burst { span } => write!(f, "burst detected (span {:.3}s)", span),
        }
    }
}

/// Outcome of evaluating one arrival event.
///
/// A rejection is a normal result; callers drop the message silently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject(RejectReason),
}

impl Decision {
    /// Event was admitted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accept)
    }

    /// Reason for a rejection, if any
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Decision::Accept => None,
            Decision::Reject(reason) => Some(*reason),
        }
    }
}

/// Threat level assigned to a source in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Classify a violation count against the block threshold.
    ///
    /// HIGH at or above the threshold, MEDIUM at or above half of it
    /// (never below one violation), LOW otherwise.
    pub fn classify(violations: u32, block_threshold: u32) -> Self {
        let medium_at = (block_threshold / 2).max(1);
        if violations >= block_threshold {
            Severity::High
        } else if violations >= medium_at {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Report label
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ground-truth class of generated traffic (known to drivers, never to the engine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClass {
    #[default]
    Legitimate,
    Attack,
}
