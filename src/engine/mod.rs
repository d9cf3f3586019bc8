//! Defense Engine
//!
//! Streaming per-source decision engine for routing control messages.
//!
//! ## Pipeline (per event)
//!
//! 1. Look up or lazily create the source record
//! 2. Blocked sources are rejected at once, without touching the window
//! 3. Sliding window admission, then the optional burst sub-check
//! 4. A rejection by either check is a violation; enough violations block
//!    the source for the rest of the run
//!
//! Every call is a single synchronous step, O(1) amortized, with memory per
//! source bounded by the rate limit.

mod ledger;
mod store;
mod window;

pub use ledger::{Escalation, ViolationLedger};
pub use store::{SourceRecord, SourceStore};
pub use window::{Admission, SlidingWindow};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, DefenseConfig};
use crate::metrics::DefenseMetrics;
use crate::report::{SourceThreat, ThreatReport};
use crate::types::{ArrivalEvent, Decision, RejectReason, Seconds, SourceIdentity};

/// Per-source anomaly detector and admission controller
#[derive(Debug)]
pub struct DefenseEngine<S> {
    config: DefenseConfig,
    ledger: ViolationLedger,
    store: SourceStore<S>,
    metrics: Arc<DefenseMetrics>,
}

impl<S: SourceIdentity> DefenseEngine<S> {
    /// Create an engine, failing fast on invalid configuration
    pub fn new(config: DefenseConfig) -> Result<Self, ConfigError> {
        Self::with_metrics(config, Arc::new(DefenseMetrics::new()))
    }

    /// Create an engine that reports into an existing metrics collector
    pub fn with_metrics(
        config: DefenseConfig,
        metrics: Arc<DefenseMetrics>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            "🛡️  Defense engine ready: {} msgs / {:.2}s, block after {} violations{}{}",
            config.rate_limit,
            config.window_secs,
            config.block_threshold,
            if config.permanent_block { "" } else { " (blocking off)" },
            if config.burst_detection { ", burst check on" } else { "" },
        );

        Ok(Self {
            ledger: ViolationLedger::from_config(&config),
            config,
            store: SourceStore::new(),
            metrics,
        })
    }

    /// Decide whether a control message from `source` at `now` is accepted.
    ///
    /// Timestamps must be non-decreasing per source. Sources may interleave.
    pub fn should_accept(&mut self, source: &S, now: Seconds) -> Decision {
        self.metrics.inc_evaluated();

        let config = &self.config;
        let record = self.store.get_or_insert(source);
        record.last_seen = Some(now);

        if self.ledger.is_blocked(record) {
            record.rejected += 1;
            self.metrics.inc_blocked_drop();
            debug!("Dropping message from blocked source {}", source);
            return Decision::Reject(RejectReason::Blocked);
        }

        let admission = record.window.admit(now, config.window_secs, config.rate_limit);

        let reason = if !admission.within_limit {
            self.metrics.inc_rate_violation();
            Some(RejectReason::RateLimited {
                window_size: admission.window_size,
                limit: config.rate_limit,
            })
        } else if config.burst_detection {
            match record
                .window
                .detect_burst(config.burst_size as usize, config.burst_span_secs)
            {
                Some(span) => {
                    if !config.burst_retains_event {
                        record.window.retract_last();
                    }
                    self.metrics.inc_burst_violation();
                    Some(RejectReason::Burst { span })
                }
                None => None,
            }
        } else {
            None
        };

        let Some(reason) = reason else {
            record.accepted += 1;
            self.metrics.inc_accepted();
            return Decision::Accept;
        };

        record.rejected += 1;
        let escalation = self.ledger.record(record);

        // Unblockable sources would flood the log at WARN
        if self.violations_escalate() {
            warn!(
                "{:.3}s: {} from {} (violations: {})",
                now, reason, source, escalation.count
            );
        } else {
            debug!(
                "{:.3}s: {} from {} (violations: {})",
                now, reason, source, escalation.count
            );
        }

        self.after_violation(source, escalation);
        Decision::Reject(reason)
    }

    /// Evaluate an [`ArrivalEvent`]
    pub fn evaluate(&mut self, event: &ArrivalEvent<S>) -> Decision {
        self.should_accept(&event.source, event.timestamp)
    }

    /// Attribute a violation detected outside the decision path
    /// (e.g. a malformed control message). Returns the new count.
    pub fn record_violation(&mut self, source: &S) -> u32 {
        let record = self.store.get_or_insert(source);
        let escalation = self.ledger.record(record);
        self.metrics.inc_external_violation();

        if self.violations_escalate() {
            warn!("Violation recorded for {}: total {}", source, escalation.count);
        } else {
            debug!("Violation recorded for {}: total {}", source, escalation.count);
        }

        self.after_violation(source, escalation);
        escalation.count
    }

    /// Violations can lead to a block, so each one is operator-relevant
    fn violations_escalate(&self) -> bool {
        self.config.permanent_block
    }

    fn after_violation(&mut self, source: &S, escalation: Escalation) {
        if escalation.count == 1 {
            self.store.note_first_violation(source);
        }

        if escalation.newly_blocked {
            self.metrics.inc_sources_blocked();
            warn!(
                "⛔ Source {} blocked for the rest of the run after {} violations",
                source, escalation.count
            );
        }
    }

    /// Check if a source is permanently blocked
    pub fn is_blocked(&self, source: &S) -> bool {
        self.store
            .get(source)
            .map(|record| self.ledger.is_blocked(record))
            .unwrap_or(false)
    }

    /// Violations attributed to a source so far
    pub fn violations(&self, source: &S) -> u32 {
        self.store.get(source).map(|r| r.violations).unwrap_or(0)
    }

    /// Read-only view of a source's record
    pub fn source(&self, source: &S) -> Option<&SourceRecord> {
        self.store.get(source)
    }

    /// Number of distinct sources seen
    pub fn tracked_count(&self) -> usize {
        self.store.len()
    }

    /// Number of permanently blocked sources
    pub fn blocked_count(&self) -> usize {
        self.store.blocked_count()
    }

    /// Active policy
    pub fn config(&self) -> &DefenseConfig {
        &self.config
    }

    /// Shared decision counters
    pub fn metrics(&self) -> &Arc<DefenseMetrics> {
        &self.metrics
    }

    /// Point-in-time threat report over every source with violations.
    ///
    /// Reads state only; two calls with no decisions in between are equal.
    pub fn generate_report(&self) -> ThreatReport<S> {
        let sources = self
            .store
            .violators()
            .map(|(source, record)| SourceThreat {
                source: source.clone(),
                violations: record.violations,
                severity: self.ledger.severity(record.violations),
                blocked: record.blocked,
                accepted: record.accepted,
                rejected: record.rejected,
                last_seen: record.last_seen,
            })
            .collect();

        ThreatReport {
            block_threshold: self.ledger.block_threshold(),
            tracked_sources: self.store.len(),
            sources,
            totals: self.metrics.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn flooding_engine() -> DefenseEngine<IpAddr> {
        DefenseEngine::new(DefenseConfig::flooding()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DefenseConfig::default().with_window_secs(0.0);
        assert!(DefenseEngine::<IpAddr>::new(config).is_err());
    }

    #[test]
    fn test_first_burst_scenario() {
        let mut engine = flooding_engine();
        let x = ip(15);

        assert!(engine.should_accept(&x, 0.0).is_accepted());
        assert!(engine.should_accept(&x, 0.1).is_accepted());
        assert!(engine.should_accept(&x, 0.2).is_accepted());

        let decision = engine.should_accept(&x, 0.3);
        assert_eq!(
            decision,
            Decision::Reject(RejectReason::RateLimited { window_size: 3, limit: 3 })
        );
        assert_eq!(engine.violations(&x), 1);
        assert!(!engine.is_blocked(&x));
    }

    #[test]
    fn test_escalation_to_permanent_block() {
        let mut engine = flooding_engine();
        let x = ip(15);

        // Ten 4-event bursts, each a full window apart
        for burst in 0..10 {
            let base = burst as f64 * 2.0;
            for offset in [0.0, 0.1, 0.2] {
                assert!(engine.should_accept(&x, base + offset).is_accepted());
            }
            assert!(!engine.should_accept(&x, base + 0.3).is_accepted());
        }

        assert_eq!(engine.violations(&x), 10);
        assert!(engine.is_blocked(&x));

        // Alone after a long gap: still rejected, window untouched
        let window_before = engine.source(&x).unwrap().window().len();
        assert_eq!(
            engine.should_accept(&x, 1_000.0),
            Decision::Reject(RejectReason::Blocked)
        );
        assert_eq!(engine.source(&x).unwrap().window().len(), window_before);
        assert_eq!(engine.violations(&x), 10);

        let totals = engine.metrics().snapshot();
        assert_eq!(totals.evaluated, 41);
        assert_eq!(totals.accepted, 30);
        assert_eq!(totals.rejected, 11);
        assert_eq!(totals.blocked_drops, 1);
        assert_eq!(totals.sources_blocked, 1);
    }

    #[test]
    fn test_rejected_events_not_counted_in_window() {
        let mut engine = flooding_engine();
        let x = ip(1);

        for t in [0.0, 0.1, 0.2] {
            engine.should_accept(&x, t);
        }
        // Refused probes do not extend the window
        for t in [0.5, 0.6, 0.7] {
            assert!(!engine.should_accept(&x, t).is_accepted());
        }
        // 0.0 expires strictly after 1.0
        assert!(engine.should_accept(&x, 1.05).is_accepted());
        assert_eq!(engine.source(&x).unwrap().window().len(), 3);
    }

    #[test]
    fn test_burst_converts_accept_to_violation() {
        let config = DefenseConfig::sybil().with_rate_limit(10);
        let mut engine = DefenseEngine::new(config).unwrap();
        let x = ip(200);

        for t in [0.0, 0.1, 0.2, 0.3] {
            assert!(engine.should_accept(&x, t).is_accepted());
        }

        let decision = engine.should_accept(&x, 0.4);
        match decision {
            Decision::Reject(RejectReason::Burst { span }) => assert!((span - 0.4).abs() < 1e-9),
            other => panic!("expected burst rejection, got {:?}", other),
        }
        assert_eq!(engine.violations(&x), 1);

        // Retained by default
        assert_eq!(engine.source(&x).unwrap().window().len(), 5);
        assert_eq!(engine.metrics().snapshot().burst_violations, 1);
    }

    #[test]
    fn test_burst_event_released_when_configured() {
        let config = DefenseConfig::sybil()
            .with_rate_limit(10)
            .with_burst_retains_event(false);
        let mut engine = DefenseEngine::new(config).unwrap();
        let x = ip(200);

        for t in [0.0, 0.1, 0.2, 0.3, 0.4] {
            engine.should_accept(&x, t);
        }

        assert_eq!(engine.violations(&x), 1);
        assert_eq!(engine.source(&x).unwrap().window().len(), 4);
    }

    #[test]
    fn test_burst_needs_rate_headroom() {
        // With 3 per window the 4th event is refused by the rate limit
        // before the burst check can see 5 events.
        let mut engine = DefenseEngine::new(DefenseConfig::sybil()).unwrap();
        let x = ip(201);

        let decisions: Vec<_> = [0.0, 0.1, 0.2, 0.3, 0.4]
            .into_iter()
            .map(|t| engine.should_accept(&x, t))
            .collect();

        assert!(decisions[..3].iter().all(Decision::is_accepted));
        assert!(matches!(
            decisions[3],
            Decision::Reject(RejectReason::RateLimited { .. })
        ));
        assert_eq!(engine.metrics().snapshot().burst_violations, 0);
    }

    #[test]
    fn test_no_block_when_disabled() {
        let config = DefenseConfig::default()
            .with_block_threshold(2)
            .with_permanent_block(false);
        let mut engine = DefenseEngine::new(config).unwrap();
        let x = ip(5);

        for i in 0..20 {
            engine.should_accept(&x, i as f64 * 0.01);
        }
        assert!(engine.violations(&x) >= 2);
        assert!(!engine.is_blocked(&x));

        // Rate limit still applies after the window drains
        assert!(engine.should_accept(&x, 10.0).is_accepted());
    }

    #[test]
    fn test_violation_log_level_follows_blocking() {
        let engine = flooding_engine();
        assert!(engine.violations_escalate());

        let quiet = DefenseEngine::<IpAddr>::new(DefenseConfig::sybil()).unwrap();
        assert!(!quiet.violations_escalate());
    }

    #[test]
    fn test_external_violation_escalates() {
        let config = DefenseConfig::default().with_block_threshold(2);
        let mut engine = DefenseEngine::new(config).unwrap();
        let x = ip(7);

        assert_eq!(engine.record_violation(&x), 1);
        assert!(!engine.is_blocked(&x));
        assert_eq!(engine.record_violation(&x), 2);
        assert!(engine.is_blocked(&x));
        assert!(!engine.should_accept(&x, 0.0).is_accepted());
        assert_eq!(engine.metrics().snapshot().external_violations, 2);
    }

    #[test]
    fn test_report_order_and_severity() {
        let mut engine = flooding_engine();

        // ip(3) violates first, then ip(2); ip(1) stays clean
        engine.should_accept(&ip(1), 0.0);
        for t in [0.0, 0.0, 0.0, 0.0] {
            engine.should_accept(&ip(3), t);
        }
        for _ in 0..5 {
            engine.record_violation(&ip(2));
        }

        let report = engine.generate_report();
        let order: Vec<_> = report.sources.iter().map(|s| s.source).collect();
        assert_eq!(order, vec![ip(3), ip(2)]);
        assert_eq!(report.sources[0].severity, Severity::Low);
        assert_eq!(report.sources[1].severity, Severity::Medium);
        assert_eq!(report.tracked_sources, 3);

        // Idempotent
        assert_eq!(engine.generate_report(), report);
    }

    #[test]
    fn test_evaluate_event() {
        let mut engine = flooding_engine();
        let event = ArrivalEvent::new(ip(9), 4.0);
        assert!(engine.evaluate(&event).is_accepted());
        assert_eq!(engine.tracked_count(), 1);
        assert_eq!(engine.blocked_count(), 0);
    }
}
