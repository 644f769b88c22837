//! Outbound telemetry payloads.
//!
//! Two message shapes share one envelope `{ "topic", "payload" }`:
//!
//! - `twin/config`: announced once per session
//! - `twin/state`: emitted on every accepted cycle and on every heartbeat
//!
//! Optional fields are omitted from the JSON, not written as `null`, so a
//! heartbeat carries no "last cycle" keys at all.

use crate::twin::history::HistoryBuffer;
use crate::twin::stats::{self, CycleField};
use crate::twin::types::{CycleRecord, Endpoint};
use serde::Serialize;

/// Topic of the configuration announcement.
pub const CONFIG_TOPIC: &str = "twin/config";

/// Topic of state and heartbeat payloads.
pub const STATE_TOPIC: &str = "twin/state";

/// Outbound message envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<P> {
    /// Message topic.
    pub topic: &'static str,
    /// Message body.
    pub payload: P,
}

/// Configuration snapshot announced on session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigAnnouncement {
    /// Ideal cycle duration.
    pub ideal_cycle_ms: i64,
    /// Accepted deviation.
    pub tolerance_ms: i64,
    /// Statistics window size.
    pub window_n: usize,
}

/// State / heartbeat payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatePayload {
    /// Ideal cycle duration.
    pub ideal_cycle_ms: i64,
    /// Accepted deviation.
    pub tolerance_ms: i64,
    /// Statistics window size.
    pub window_n: usize,
    /// Cycles per minute of the windowed mean cycle (1 decimal).
    pub cpm_window: f64,
    /// Number of accepted cycles so far.
    pub cycle_seq: u64,

    /// Anchor of the reported cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Endpoint>,
    /// Duration of the reported cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_cycle_ms: Option<i64>,
    /// `observed - ideal`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_ms: Option<i64>,
    /// Error as a percentage of the ideal cycle (2 decimals).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_pct: Option<f64>,
    /// `|error| <= tolerance`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<bool>,
    /// Cycles per minute of the reported cycle (1 decimal).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpm_instant: Option<f64>,
    /// Anchor to opposite endpoint leg.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advance_ms: Option<i64>,
    /// Opposite endpoint back to anchor leg.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_ms: Option<i64>,

    /// Windowed mean cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_avg_ms: Option<i64>,
    /// Windowed 95th percentile cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_p95_ms: Option<i64>,
    /// Windowed shortest cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_min_ms: Option<i64>,
    /// Windowed longest cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_max_ms: Option<i64>,
}

/// Builds outbound payloads from the twin's history.
#[derive(Debug, Clone, Copy)]
pub struct StatePublisher {
    ideal_cycle_ms: i64,
    tolerance_ms: i64,
    window_n: usize,
}

impl StatePublisher {
    /// Creates a publisher for the given targets.
    #[must_use]
    pub fn new(ideal_cycle_ms: i64, tolerance_ms: i64, window_n: usize) -> Self {
        Self { ideal_cycle_ms, tolerance_ms, window_n }
    }

    /// Statistics window size.
    #[must_use]
    pub fn window_n(&self) -> usize {
        self.window_n
    }

    /// Returns true if `cycle_ms` is within tolerance of the ideal cycle.
    #[must_use]
    pub fn passes(&self, cycle_ms: i64) -> bool {
        (cycle_ms - self.ideal_cycle_ms).abs() <= self.tolerance_ms
    }

    /// The `twin/config` announcement.
    #[must_use]
    pub fn config_announcement(&self) -> Envelope<ConfigAnnouncement> {
        Envelope {
            topic: CONFIG_TOPIC,
            payload: ConfigAnnouncement {
                ideal_cycle_ms: self.ideal_cycle_ms,
                tolerance_ms: self.tolerance_ms,
                window_n: self.window_n,
            },
        }
    }

    /// The `twin/state` payload, optionally reporting `last_cycle`.
    #[must_use]
    pub fn build_state(
        &self,
        history: &HistoryBuffer,
        sequence: u64,
        last_cycle: Option<&CycleRecord>,
    ) -> Envelope<StatePayload> {
        let window = history.recent(self.window_n);

        let mut payload = StatePayload {
            ideal_cycle_ms: self.ideal_cycle_ms,
            tolerance_ms: self.tolerance_ms,
            window_n: self.window_n,
            cpm_window: round_to(stats::windowed_cpm(&window), 1),
            cycle_seq: sequence,
            anchor: None,
            observed_cycle_ms: None,
            error_ms: None,
            error_pct: None,
            pass: None,
            cpm_instant: None,
            advance_ms: None,
            return_ms: None,
            cycle_avg_ms: None,
            cycle_p95_ms: None,
            cycle_min_ms: None,
            cycle_max_ms: None,
        };

        if let Some(cycle) = last_cycle {
            let error_ms = cycle.cycle_ms - self.ideal_cycle_ms;
            payload.anchor = Some(cycle.anchor);
            payload.observed_cycle_ms = Some(cycle.cycle_ms);
            payload.error_ms = Some(error_ms);
            payload.error_pct = Some(round_to(100.0 * error_ms as f64 / self.ideal_cycle_ms as f64, 2));
            payload.pass = Some(self.passes(cycle.cycle_ms));
            payload.cpm_instant = Some(round_to(stats::cycles_per_minute(cycle.cycle_ms as f64), 1));
            payload.advance_ms = Some(cycle.advance_ms);
            payload.return_ms = Some(cycle.return_ms);
        }

        if let Some(st) = stats::record_stats(&window, CycleField::Cycle) {
            payload.cycle_avg_ms = Some(st.avg.trunc() as i64);
            payload.cycle_p95_ms = Some(st.p95.trunc() as i64);
            payload.cycle_min_ms = Some(st.min.trunc() as i64);
            payload.cycle_max_ms = Some(st.max.trunc() as i64);
        }

        Envelope { topic: STATE_TOPIC, payload }
    }
}

/// Rounds to `digits` decimal places, ties to even.
fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    let scaled = value * scale;
    let rounded = if (scaled - scaled.trunc()).abs() == 0.5 {
        2.0 * (scaled / 2.0).round()
    } else {
        scaled.round()
    };
    rounded / scale
}
