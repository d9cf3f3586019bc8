// Defense Invariant Tests
// Rate enforcement, window eviction, monotone escalation and per-source
// independence, checked on fixed cases and on generated timelines.

#[cfg(test)]
mod tests {
    use crate::config::DefenseConfig;
    use crate::engine::DefenseEngine;
    use crate::types::{Decision, RejectReason};
    use proptest::prelude::*;
    use std::net::{IpAddr, Ipv4Addr};

    // =========================================================================
    // HELPER FUNCTIONS
    // =========================================================================

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    /// Turn (source, gap in ms) steps into a globally ordered timeline
    fn timeline(steps: &[(u8, u32)]) -> Vec<(IpAddr, f64)> {
        let mut now = 0.0;
        steps
            .iter()
            .map(|(source, gap_ms)| {
                now += *gap_ms as f64 / 1000.0;
                (ip(*source), now)
            })
            .collect()
    }

    fn policy(burst: bool) -> DefenseConfig {
        let config = DefenseConfig::default()
            .with_window_secs(1.0)
            .with_rate_limit(6)
            .with_block_threshold(5);
        if burst {
            config.with_burst(4, 0.2)
        } else {
            config
        }
    }

    // =========================================================================
    // RATE ENFORCEMENT
    // =========================================================================

    mod rate_enforcement {
        use super::*;

        #[test]
        fn test_exactly_rate_limit_accepted_per_window() {
            for limit in 1..=6u32 {
                let config = DefenseConfig::default()
                    .with_rate_limit(limit)
                    .with_block_threshold(100);
                let mut engine = DefenseEngine::new(config).unwrap();
                let x = ip(1);

                let accepted = (0..limit * 2)
                    .map(|i| engine.should_accept(&x, i as f64 * 0.01))
                    .filter(Decision::is_accepted)
                    .count();

                assert_eq!(accepted, limit as usize);
                assert_eq!(engine.violations(&x), limit);
            }
        }

        #[test]
        fn test_rejections_report_window_size() {
            let mut engine = DefenseEngine::new(DefenseConfig::default()).unwrap();
            for t in [0.0, 0.1, 0.2] {
                engine.should_accept(&ip(1), t);
            }
            assert_eq!(
                engine.should_accept(&ip(1), 0.25),
                Decision::Reject(RejectReason::RateLimited { window_size: 3, limit: 3 })
            );
        }
    }

    // =========================================================================
    // WINDOW EVICTION
    // =========================================================================

    mod window_eviction {
        use super::*;

        #[test]
        fn test_not_evicted_before_window_elapses() {
            let config = DefenseConfig::default()
                .with_rate_limit(1)
                .with_block_threshold(100);
            let mut engine = DefenseEngine::new(config).unwrap();
            let x = ip(1);

            assert!(engine.should_accept(&x, 2.0).is_accepted());
            assert!(!engine.should_accept(&x, 2.5).is_accepted());
            assert!(!engine.should_accept(&x, 3.0).is_accepted());
        }

        #[test]
        fn test_evicted_by_next_admission_after_window() {
            let config = DefenseConfig::default()
                .with_rate_limit(1)
                .with_block_threshold(100);
            let mut engine = DefenseEngine::new(config).unwrap();
            let x = ip(1);

            assert!(engine.should_accept(&x, 2.0).is_accepted());
            assert!(engine.should_accept(&x, 3.001).is_accepted());

            let window = engine.source(&x).unwrap().window();
            assert_eq!(window.iter().collect::<Vec<_>>(), vec![3.001]);
        }
    }

    // =========================================================================
    // ESCALATION
    // =========================================================================

    mod escalation {
        use super::*;

        #[test]
        fn test_blocked_source_rejected_even_when_under_rate() {
            let config = DefenseConfig::default().with_block_threshold(1);
            let mut engine = DefenseEngine::new(config).unwrap();
            let x = ip(1);

            for t in [0.0, 0.0, 0.0, 0.0] {
                engine.should_accept(&x, t);
            }
            assert!(engine.is_blocked(&x));

            for i in 0..10 {
                let t = 100.0 + i as f64 * 10.0;
                assert_eq!(
                    engine.should_accept(&x, t),
                    Decision::Reject(RejectReason::Blocked)
                );
            }
            assert_eq!(engine.violations(&x), 1);
        }

        #[test]
        fn test_blocked_drops_do_not_grow_window() {
            let config = DefenseConfig::default().with_block_threshold(1);
            let mut engine = DefenseEngine::new(config).unwrap();
            let x = ip(1);

            engine.record_violation(&x);
            for i in 0..50 {
                engine.should_accept(&x, i as f64);
            }

            assert!(engine.source(&x).unwrap().window().is_empty());
            assert_eq!(engine.metrics().snapshot().blocked_drops, 50);
        }
    }

    // =========================================================================
    // GENERATED TIMELINES
    // =========================================================================

    proptest! {
        #[test]
        fn prop_violations_never_decrease(
            steps in prop::collection::vec((0u8..4, 0u32..400), 1..300),
            burst in any::<bool>(),
        ) {
            let mut engine = DefenseEngine::new(policy(burst)).unwrap();
            let mut last = [0u32; 4];

            for (source, now) in timeline(&steps) {
                let was_blocked = engine.is_blocked(&source);
                let decision = engine.should_accept(&source, now);

                if was_blocked {
                    prop_assert_eq!(decision, Decision::Reject(RejectReason::Blocked));
                }

                let index = match source {
                    IpAddr::V4(v4) => v4.octets()[3] as usize,
                    IpAddr::V6(_) => unreachable!(),
                };
                let count = engine.violations(&source);
                prop_assert!(count >= last[index]);
                last[index] = count;

                if count >= engine.config().block_threshold {
                    prop_assert!(engine.is_blocked(&source));
                }
            }
        }

        #[test]
        fn prop_window_bounded_and_fresh(
            steps in prop::collection::vec((0u8..4, 0u32..400), 1..300),
            burst in any::<bool>(),
        ) {
            let config = policy(burst);
            let mut engine = DefenseEngine::new(config.clone()).unwrap();

            for (source, now) in timeline(&steps) {
                let was_blocked = engine.is_blocked(&source);
                engine.should_accept(&source, now);
                if was_blocked {
                    continue;
                }

                let window = engine.source(&source).unwrap().window();
                prop_assert!(window.len() <= config.rate_limit as usize);
                for t in window.iter() {
                    prop_assert!(now - t <= config.window_secs);
                    prop_assert!(t <= now);
                }
            }
        }

        #[test]
        fn prop_sources_are_independent(
            steps in prop::collection::vec((0u8..4, 0u32..400), 1..300),
            burst in any::<bool>(),
        ) {
            let events = timeline(&steps);
            let target = ip(0);

            let mut shared = DefenseEngine::new(policy(burst)).unwrap();
            let together: Vec<Decision> = events
                .iter()
                .map(|(source, now)| (source, shared.should_accept(source, *now)))
                .filter(|(source, _)| **source == target)
                .map(|(_, decision)| decision)
                .collect();

            let mut alone = DefenseEngine::new(policy(burst)).unwrap();
            let isolated: Vec<Decision> = events
                .iter()
                .filter(|(source, _)| *source == target)
                .map(|(source, now)| alone.should_accept(source, *now))
                .collect();

            prop_assert_eq!(together, isolated);
            prop_assert_eq!(shared.violations(&target), alone.violations(&target));
        }

        #[test]
        fn prop_tracked_sources_match_distinct_seen(
            steps in prop::collection::vec((0u8..16, 0u32..50), 1..200),
        ) {
            let events = timeline(&steps);
            let mut engine = DefenseEngine::new(DefenseConfig::default()).unwrap();
            for (source, now) in &events {
                engine.should_accept(source, *now);
            }

            let distinct: std::collections::HashSet<_> = events.iter().map(|(s, _)| *s).collect();
            prop_assert_eq!(engine.tracked_count(), distinct.len());

            let totals = engine.metrics().snapshot();
            prop_assert_eq!(totals.evaluated, events.len() as u64);
            prop_assert_eq!(totals.accepted + totals.rejected, totals.evaluated);
        }
    }
}
