//! Attack Scenarios
//!
//! Synthetic, reproducible event streams for the two attack scenarios the
//! engine was built against, plus legitimate background traffic:
//!
//! - **Flooding**: one attacker node sends bursts of 3 route requests every
//!   5 ms from its own address.
//! - **Sybil**: one attacker rotates round-robin over spoofed identities
//!   (`10.0.0.200 + i`), bursts of 6 every 20 ms.
//!
//! A legitimate client runs route discovery periodically and streams data
//! packets. A data packet is delivered when the client's last route
//! discovery was accepted and the shared channel carried fewer than
//! `channel_capacity_per_sec` accepted control messages over the preceding
//! second. With the defense disabled every control message is accepted, so
//! a flood saturates the channel.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tracing::{debug, info};

use crate::config::{ConfigError, DefenseConfig};
use crate::engine::{DefenseEngine, SlidingWindow};
use crate::metrics::TrafficTracer;
use crate::report::{RunSummary, ThreatReport};
use crate::types::{Seconds, TrafficClass};

/// Window over which channel load is measured (seconds)
const CHANNEL_WINDOW_SECS: Seconds = 1.0;

/// Highest number of spoofed identities that fit in 10.0.0.200..=254
pub const MAX_SYBIL_IDENTITIES: u32 = 55;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("invalid scenario parameter: {0}")]
    InvalidParameter(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Flooding,
    Sybil,
}

impl ScenarioKind {
    /// Defense policy deployed against this attack
    pub fn defense_preset(&self) -> DefenseConfig {
        match self {
            ScenarioKind::Flooding => DefenseConfig::flooding(),
            ScenarioKind::Sybil => DefenseConfig::sybil(),
        }
    }

    /// Address of the legitimate client node
    pub fn legit_client(&self) -> Ipv4Addr {
        match self {
            ScenarioKind::Flooding => Ipv4Addr::new(10, 0, 0, 1),
            ScenarioKind::Sybil => Ipv4Addr::new(10, 0, 0, 2),
        }
    }
}

/// What a generated event carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traffic {
    /// Route control message, evaluated by the defense
    Control(TrafficClass),

    /// Legitimate application data, never evaluated
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioEvent {
    pub source: Ipv4Addr,
    pub timestamp: Seconds,
    pub traffic: Traffic,
}

/// Scenario parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub kind: ScenarioKind,

    /// Simulated run length (seconds)
    pub duration_secs: Seconds,

    // === Legitimate client ===

    pub legit_start_secs: Seconds,
    pub legit_data_interval_secs: Seconds,
    pub legit_max_packets: u32,

    /// Interval between the client's route discoveries (seconds)
    pub legit_route_interval_secs: Seconds,

    // === Attacker ===

    pub attack_start_secs: Seconds,
    pub attack_stop_secs: Seconds,
    pub attack_burst_len: u32,
    pub attack_burst_interval_secs: Seconds,

    /// Spoofed identities (Sybil only)
    pub sybil_identities: u32,

    // === Channel ===

    /// Accepted control messages per second the shared channel can carry
    pub channel_capacity_per_sec: u32,

    // === Timing ===

    /// Random delay added to each data packet and attack burst, as a
    /// fraction of its interval, in `[0, 1)`
    pub jitter: f64,
    pub seed: u64,

    /// Route control messages through the defense engine
    pub defense_enabled: bool,
}

impl ScenarioConfig {
    /// RREQ flooding: 15 nodes, 30 s, attacker floods from t=5 s
    pub fn flooding() -> Self {
        Self {
            kind: ScenarioKind::Flooding,
            duration_secs: 30.0,
            legit_start_secs: 2.0,
            legit_data_interval_secs: 0.1,
            legit_max_packets: 1000,
            legit_route_interval_secs: 1.0,
            attack_start_secs: 5.0,
            attack_stop_secs: 29.0,
            attack_burst_len: 3,
            attack_burst_interval_secs: 0.005,
            sybil_identities: 1,
            channel_capacity_per_sec: 200,
            jitter: 0.05,
            seed: 7,
            defense_enabled: true,
        }
    }

    /// Sybil spoofing: 6 identities, 121 s, attack from t=30 s
    pub fn sybil() -> Self {
        Self {
            kind: ScenarioKind::Sybil,
            duration_secs: 121.0,
            legit_start_secs: 2.0,
            legit_data_interval_secs: 0.8,
            legit_max_packets: 100,
            legit_route_interval_secs: 2.0,
            attack_start_secs: 30.0,
            attack_stop_secs: 120.0,
            attack_burst_len: 6,
            attack_burst_interval_secs: 0.02,
            sybil_identities: 6,
            channel_capacity_per_sec: 200,
            jitter: 0.05,
            seed: 7,
            defense_enabled: true,
        }
    }

    /// Preset for a scenario kind
    pub fn for_kind(kind: ScenarioKind) -> Self {
        match kind {
            ScenarioKind::Flooding => Self::flooding(),
            ScenarioKind::Sybil => Self::sybil(),
        }
    }

    /// Override the jitter seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Override the run length
    pub fn with_duration(mut self, secs: Seconds) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Run with or without the engine in the path
    pub fn with_defense(mut self, enabled: bool) -> Self {
        self.defense_enabled = enabled;
        self
    }

    /// Reject parameters that cannot produce a run
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let positive = |v: Seconds| v.is_finite() && v > 0.0;

        if !positive(self.duration_secs) {
            return Err(ScenarioError::InvalidParameter("duration_secs must be positive"));
        }
        if !positive(self.legit_data_interval_secs) || !positive(self.legit_route_interval_secs) {
            return Err(ScenarioError::InvalidParameter("legitimate intervals must be positive"));
        }
        if !positive(self.attack_burst_interval_secs) {
            return Err(ScenarioError::InvalidParameter("attack_burst_interval_secs must be positive"));
        }
        if self.attack_burst_len == 0 {
            return Err(ScenarioError::InvalidParameter("attack_burst_len must be at least 1"));
        }
        if self.kind == ScenarioKind::Sybil
            && !(1..=MAX_SYBIL_IDENTITIES).contains(&self.sybil_identities)
        {
            return Err(ScenarioError::InvalidParameter("sybil_identities must be in 1..=55"));
        }
        if self.channel_capacity_per_sec == 0 {
            return Err(ScenarioError::InvalidParameter("channel_capacity_per_sec must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(ScenarioError::InvalidParameter("jitter must be in [0, 1)"));
        }
        Ok(())
    }

    /// Source addresses the attacker transmits from
    pub fn attack_sources(&self) -> Vec<Ipv4Addr> {
        match self.kind {
            ScenarioKind::Flooding => vec![Ipv4Addr::new(10, 0, 0, 15)],
            ScenarioKind::Sybil => (0..self.sybil_identities.min(MAX_SYBIL_IDENTITIES))
                .map(|i| Ipv4Addr::new(10, 0, 0, 200 + i as u8))
                .collect(),
        }
    }

    fn jitter(&self, rng: &mut StdRng, interval: Seconds) -> Seconds {
        if self.jitter > 0.0 {
            rng.gen_range(0.0..self.jitter * interval)
        } else {
            0.0
        }
    }

    /// Build the full event stream, ordered by time.
    ///
    /// Each burst or packet is delayed by less than its own interval, so
    /// per-source order is preserved.
    pub fn generate(&self) -> Vec<ScenarioEvent> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut events = Vec::new();
        let client = self.kind.legit_client();

        // Route discovery, unjittered so it precedes the first data packet
        let mut k = 0u32;
        loop {
            let t = self.legit_start_secs + k as f64 * self.legit_route_interval_secs;
            if t >= self.duration_secs {
                break;
            }
            events.push(ScenarioEvent {
                source: client,
                timestamp: t,
                traffic: Traffic::Control(TrafficClass::Legitimate),
            });
            k += 1;
        }

        for k in 0..self.legit_max_packets {
            let t = self.legit_start_secs
                + k as f64 * self.legit_data_interval_secs
                + self.jitter(&mut rng, self.legit_data_interval_secs);
            if t >= self.duration_secs {
                break;
            }
            events.push(ScenarioEvent {
                source: client,
                timestamp: t,
                traffic: Traffic::Data,
            });
        }

        let sources = self.attack_sources();
        let stop = self.attack_stop_secs.min(self.duration_secs);
        let mut next = 0usize;
        let mut burst = 0u64;
        loop {
            let t = self.attack_start_secs
                + burst as f64 * self.attack_burst_interval_secs
                + self.jitter(&mut rng, self.attack_burst_interval_secs);
            if t >= stop || sources.is_empty() {
                break;
            }
            for _ in 0..self.attack_burst_len {
                events.push(ScenarioEvent {
                    source: sources[next % sources.len()],
                    timestamp: t,
                    traffic: Traffic::Control(TrafficClass::Attack),
                });
                next += 1;
            }
            burst += 1;
        }

        // Stable: ties keep generation order
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        events
    }

    /// Drive `engine` with this scenario and summarize the run
    pub fn run(&self, engine: &mut DefenseEngine<Ipv4Addr>, tracer: &TrafficTracer) -> RunSummary {
        let events = self.generate();
        let client = self.kind.legit_client();

        info!(
            "▶️  Running {:?} scenario: {} events over {:.1}s (defense {})",
            self.kind,
            events.len(),
            self.duration_secs,
            if self.defense_enabled { "enabled" } else { "disabled" }
        );

        let mut channel = SlidingWindow::new();
        let mut route_ok = false;

        for event in &events {
            match event.traffic {
                Traffic::Control(class) => {
                    if class == TrafficClass::Attack {
                        tracer.inc_attack_sent();
                    }

                    let accepted = !self.defense_enabled
                        || engine.should_accept(&event.source, event.timestamp).is_accepted();

                    if accepted {
                        channel.record(event.timestamp, CHANNEL_WINDOW_SECS);
                    }

                    if class == TrafficClass::Legitimate && event.source == client {
                        if !accepted {
                            debug!("{:.3}s: route discovery from {} dropped", event.timestamp, client);
                        }
                        route_ok = accepted;
                    }
                }
                Traffic::Data => {
                    tracer.inc_legit_sent();
                    channel.evict(event.timestamp, CHANNEL_WINDOW_SECS);

                    if route_ok && channel.len() < self.channel_capacity_per_sec as usize {
                        tracer.inc_legit_received();
                    } else {
                        debug!("{:.3}s: data packet from {} lost", event.timestamp, client);
                    }
                }
            }
        }

        RunSummary::compute(
            engine.metrics().snapshot(),
            tracer.snapshot(),
            self.duration_secs,
            self.defense_enabled,
        )
    }
}

/// Report and summary of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub report: ThreatReport<Ipv4Addr>,
    pub summary: RunSummary,
}

/// Run `scenario` against a fresh engine configured with `defense`
pub fn run_scenario(
    scenario: &ScenarioConfig,
    defense: DefenseConfig,
) -> Result<ScenarioOutcome, ScenarioError> {
    scenario.validate()?;

    let mut engine = DefenseEngine::new(defense)?;
    let tracer = TrafficTracer::new();
    let summary = scenario.run(&mut engine, &tracer);

    Ok(ScenarioOutcome {
        report: engine.generate_report(),
        summary,
    })
}
