//! AODV Shield
//!
//! Defense engine against control-plane attacks on ad-hoc routing:
//! route-request flooding and identity spoofing (Sybil).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        AODV SHIELD                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Ingress (call / channel)  ──► DefenseEngine::should_accept  │
//! │    Per-Source State Store   ←── one record per address       │
//! │    Sliding Window Tracker   ←── rate limit per window        │
//! │    Burst Sub-Detector       ←── optional, post-admission     │
//! │    Violation Ledger         ←── escalation to block          │
//! │  DefenseMetrics / TrafficTracer ←── run counters             │
//! │  Reporter                   ──► ThreatReport + RunSummary    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod metrics;
pub mod report;
pub mod scenario;
pub mod service;
pub mod trace;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, DefenseConfig};
pub use engine::DefenseEngine;
pub use metrics::{DefenseMetrics, TrafficTracer};
pub use report::{RunSummary, ThreatReport};
pub use types::{ArrivalEvent, Decision, RejectReason, Severity};
