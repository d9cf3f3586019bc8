//! Threat Reporting
//!
//! Read-only views over engine and traffic counters, rendered as
//! human-readable text for an operator or as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metrics::{MetricsSnapshot, TrafficSnapshot};
use crate::types::{Seconds, Severity};

/// One source with at least one violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceThreat<S> {
    pub source: S,
    pub violations: u32,
    pub severity: Severity,
    pub blocked: bool,
    pub accepted: u64,
    pub rejected: u64,

    /// Timestamp of the last message evaluated, if any
    pub last_seen: Option<Seconds>,
}

/// Per-source threat summary, in first-violation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatReport<S> {
    /// Threshold the severity labels were computed against
    pub block_threshold: u32,

    /// Distinct sources seen, violators or not
    pub tracked_sources: usize,

    pub sources: Vec<SourceThreat<S>>,

    /// Engine decision counters at report time
    pub totals: MetricsSnapshot,
}

impl<S> ThreatReport<S> {
    /// Sources at the given severity
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.sources.iter().filter(|s| s.severity == severity).count()
    }

    /// Sources in the blocked state
    pub fn blocked_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.blocked).count()
    }

    /// No source has a violation
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl<S: fmt::Display> fmt::Display for ThreatReport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== Security Analysis Report ==========")?;
        writeln!(f, "Sources Tracked:             {}", self.tracked_sources)?;
        writeln!(f, "Suspicious Sources Detected: {}", self.sources.len())?;
        writeln!(
            f,
            "  HIGH: {}  MEDIUM: {}  LOW: {}  (blocked: {})",
            self.count_by_severity(Severity::High),
            self.count_by_severity(Severity::Medium),
            self.count_by_severity(Severity::Low),
            self.blocked_sources()
        )?;
        for entry in &self.sources {
            write!(
                f,
                "  {} - Violations: {} (Threat: {})",
                entry.source, entry.violations, entry.severity
            )?;
            if entry.blocked {
                write!(f, " [BLOCKED]")?;
            }
            if let Some(last_seen) = entry.last_seen {
                write!(f, " last seen {:.3}s", last_seen)?;
            }
            writeln!(f)?;
        }
        write!(f, "===============================================")
    }
}

/// Qualitative impact of the attack on legitimate delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttackImpact {
    Critical,
    High,
    Medium,
    Low,
}

impl AttackImpact {
    /// Classify a packet delivery ratio (%)
    pub fn from_delivery_ratio(pdr: f64) -> Self {
        if pdr < 50.0 {
            AttackImpact::Critical
        } else if pdr < 70.0 {
            AttackImpact::High
        } else if pdr < 90.0 {
            AttackImpact::Medium
        } else {
            AttackImpact::Low
        }
    }
}

impl fmt::Display for AttackImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttackImpact::Critical => "CRITICAL",
            AttackImpact::High => "HIGH",
            AttackImpact::Medium => "MEDIUM",
            AttackImpact::Low => "LOW",
        })
    }
}

/// Network protection state derived from defense effectiveness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkStatus {
    Vulnerable,
    WellProtected,
    PartiallyProtected,
    DefenseActive,
}

impl NetworkStatus {
    /// Classify defense effectiveness (%)
    pub fn assess(defense_enabled: bool, effectiveness: f64) -> Self {
        if !defense_enabled {
            NetworkStatus::Vulnerable
        } else if effectiveness > 70.0 {
            NetworkStatus::WellProtected
        } else if effectiveness > 40.0 {
            NetworkStatus::PartiallyProtected
        } else {
            NetworkStatus::DefenseActive
        }
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NetworkStatus::Vulnerable => "VULNERABLE",
            NetworkStatus::WellProtected => "WELL PROTECTED",
            NetworkStatus::PartiallyProtected => "PARTIALLY PROTECTED",
            NetworkStatus::DefenseActive => "DEFENSE ACTIVE",
        })
    }
}

/// Overall verdict on the defense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Success,
    PartialSuccess,
    Warning,
}

impl Verdict {
    /// Verdict for a defense effectiveness (%)
    pub fn from_effectiveness(effectiveness: f64) -> Self {
        if effectiveness > 50.0 {
            Verdict::Success
        } else if effectiveness > 25.0 {
            Verdict::PartialSuccess
        } else {
            Verdict::Warning
        }
    }

    /// Operator-facing verdict line
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Success => "SUCCESS: defense effectively mitigated the attack",
            Verdict::PartialSuccess => {
                "PARTIAL SUCCESS: defense provided some protection but needs tuning"
            }
            Verdict::Warning => "WARNING: defense needs improvement to handle this attack",
        }
    }
}

/// Run-level aggregate figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub defense_enabled: bool,
    pub duration_secs: Seconds,
    pub traffic: TrafficSnapshot,
    pub totals: MetricsSnapshot,

    /// Legitimate received / sent (%)
    pub delivery_ratio: f64,

    /// Attack packets per second of run time
    pub attack_intensity: f64,

    /// Rejected / evaluated (%)
    pub defense_effectiveness: f64,

    /// Accepted / (accepted + rejected) (%)
    pub network_resilience: f64,

    pub attack_impact: AttackImpact,
    pub network_status: NetworkStatus,

    /// Only meaningful with the defense enabled
    pub verdict: Option<Verdict>,
}

fn percent(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

impl RunSummary {
    /// Derive the run figures from raw counters
    pub fn compute(
        totals: MetricsSnapshot,
        traffic: TrafficSnapshot,
        duration_secs: Seconds,
        defense_enabled: bool,
    ) -> Self {
        let delivery_ratio = percent(traffic.legit_received, traffic.legit_sent);
        let attack_intensity = if duration_secs > 0.0 {
            traffic.attack_sent as f64 / duration_secs
        } else {
            0.0
        };
        let defense_effectiveness = percent(totals.rejected, totals.evaluated);
        let network_resilience = percent(totals.accepted, totals.accepted + totals.rejected);

        Self {
            defense_enabled,
            duration_secs,
            traffic,
            totals,
            delivery_ratio,
            attack_intensity,
            defense_effectiveness,
            network_resilience,
            attack_impact: AttackImpact::from_delivery_ratio(delivery_ratio),
            network_status: NetworkStatus::assess(defense_enabled, defense_effectiveness),
            verdict: defense_enabled.then(|| Verdict::from_effectiveness(defense_effectiveness)),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== Defense Simulation Results ==========")?;
        writeln!(
            f,
            "Defense Status:              {}",
            if self.defense_enabled { "ENABLED" } else { "DISABLED" }
        )?;
        writeln!(f, "Run Duration (s):            {:.2}", self.duration_secs)?;
        writeln!(f, "Legitimate Packets Sent:     {}", self.traffic.legit_sent)?;
        writeln!(f, "Legitimate Packets Received: {}", self.traffic.legit_received)?;
        writeln!(f, "Packet Delivery Ratio (%):   {:.2}", self.delivery_ratio)?;
        writeln!(f, "Attack Packets Generated:    {}", self.traffic.attack_sent)?;
        writeln!(f, "Control Messages Processed:  {}", self.totals.evaluated)?;
        writeln!(f, "Control Messages Blocked:    {}", self.totals.rejected)?;
        writeln!(f, "  already blocked source:    {}", self.totals.blocked_drops)?;
        writeln!(f, "  rate limit:                {}", self.totals.rate_violations)?;
        writeln!(f, "  burst pattern:             {}", self.totals.burst_violations)?;
        writeln!(f, "Control Messages Allowed:    {}", self.totals.accepted)?;
        writeln!(f, "Defense Effectiveness (%):   {:.2}", self.defense_effectiveness)?;
        writeln!(f, "Network Resilience (%):      {:.2}", self.network_resilience)?;
        writeln!(f, "Attack Intensity (pkt/sec):  {:.2}", self.attack_intensity)?;
        writeln!(f, "Attack Impact Assessment:    {}", self.attack_impact)?;
        writeln!(f, "Network Security Status:     {}", self.network_status)?;
        if let Some(verdict) = self.verdict {
            writeln!(f, "{}", verdict.message())?;
        }
        write!(f, "================================================")
    }
}
