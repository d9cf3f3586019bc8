//! Trace Replay
//!
//! Reads captured control-message arrivals from a JSON-lines file and feeds
//! them to the engine service. One object per line:
//!
//! ```text
//! {"source": "10.0.0.15", "timestamp": 5.005, "class": "attack"}
//! ```
//!
//! `class` is optional and defaults to `legitimate`. For a trace, delivery
//! is measured on legitimate control messages themselves.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::net::IpAddr;
use tracing::{debug, info};

use crate::metrics::TrafficTracer;
use crate::service::{EngineHandle, ServiceError};
use crate::types::{ArrivalEvent, Seconds, TrafficClass};

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: timestamp {timestamp} for {address} is earlier than its previous event ({previous})")]
    OutOfOrder {
        line: usize,
        address: IpAddr,
        timestamp: Seconds,
        previous: Seconds,
    },

    #[error("line {line}: timestamp must be a finite number")]
    InvalidTimestamp { line: usize },
}

/// One captured arrival
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub source: IpAddr,
    pub timestamp: Seconds,
    #[serde(default)]
    pub class: TrafficClass,
}

/// Parse a JSON-lines trace. Blank lines and `#` comments are skipped.
///
/// Fails on the first line whose timestamp goes backwards for its source.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();
    let mut last_seen: HashMap<IpAddr, Seconds> = HashMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: TraceRecord = serde_json::from_str(trimmed).map_err(|source| TraceError::Json {
            line: line_no,
            source,
        })?;

        if !record.timestamp.is_finite() {
            return Err(TraceError::InvalidTimestamp { line: line_no });
        }

        if let Some(&previous) = last_seen.get(&record.source) {
            if record.timestamp < previous {
                return Err(TraceError::OutOfOrder {
                    line: line_no,
                    address: record.source,
                    timestamp: record.timestamp,
                    previous,
                });
            }
        }
        last_seen.insert(record.source, record.timestamp);

        records.push(record);
    }

    debug!("Parsed {} trace records from {} sources", records.len(), last_seen.len());
    Ok(records)
}

/// Time spanned by a trace (seconds)
pub fn trace_duration(records: &[TraceRecord]) -> Seconds {
    let first = records.iter().map(|r| r.timestamp).fold(f64::INFINITY, f64::min);
    let last = records.iter().map(|r| r.timestamp).fold(f64::NEG_INFINITY, f64::max);
    if records.is_empty() {
        0.0
    } else {
        last - first
    }
}

/// Feed `records` to the engine in order, updating `tracer`
pub async fn replay(
    handle: &EngineHandle<IpAddr>,
    records: &[TraceRecord],
    tracer: &TrafficTracer,
) -> Result<(), ServiceError> {
    info!("⏯️  Replaying {} trace records", records.len());

    for record in records {
        let decision = handle
            .evaluate(ArrivalEvent::new(record.source, record.timestamp))
            .await?;

        match record.class {
            TrafficClass::Attack => tracer.inc_attack_sent(),
            TrafficClass::Legitimate => {
                tracer.inc_legit_sent();
                if decision.is_accepted() {
                    tracer.inc_legit_received();
                }
            }
        }
    }

    Ok(())
}
