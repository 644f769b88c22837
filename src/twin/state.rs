//! Twin context: detector state plus cycle history.
//!
//! The context is owned by exactly one task. Nothing in it is shared or
//! locked; callers that feed it from several producers must serialize access
//! themselves.

use crate::twin::config::Config;
use crate::twin::detector::{CycleDetector, DetectorState, Observation};
use crate::twin::history::HistoryBuffer;
use crate::twin::types::{now_ms, CycleRecord, TransitionEvent};

/// Mutable state of one twin.
#[derive(Debug, Clone)]
pub struct Twin {
    detector: CycleDetector,
    history: HistoryBuffer,
}

impl Twin {
    /// Creates a twin with explicit limits.
    #[must_use]
    pub fn new(max_cycle_ms: i64, drop_first: bool, history_capacity: usize) -> Self {
        Self {
            detector: CycleDetector::new(max_cycle_ms, drop_first),
            history: HistoryBuffer::with_capacity(history_capacity),
        }
    }

    /// Creates a twin from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_cycle_ms(), config.cycle.prime_drop_first, config.cycle.history_capacity)
    }

    /// Feeds a transition; returns the accepted cycle, if one closed.
    pub fn observe(&mut self, event: TransitionEvent) -> Option<CycleRecord> {
        self.observe_at(event, now_ms()).record().copied()
    }

    /// Feeds a transition with an explicit capture time.
    ///
    /// Accepted cycles are appended to the history before returning.
    pub fn observe_at(&mut self, event: TransitionEvent, captured_at_ms: i64) -> Observation {
        let observation = self.detector.observe_at(event, captured_at_ms);
        if let Observation::Accepted(record) = observation {
            self.history.append(record);
        }
        observation
    }

    /// Accepted cycle history.
    #[must_use]
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Detector state.
    #[must_use]
    pub fn detector(&self) -> &DetectorState {
        self.detector.state()
    }

    /// Number of accepted cycles.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.detector.sequence()
    }
}

/// Running totals for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Frames received from the transport.
    pub received: u64,
    /// Frames that were not transitions.
    pub ignored: u64,
    /// Valid transition events.
    pub transitions: u64,
    /// Cycles dropped as out of range.
    pub rejected: u64,
    /// Cycles discarded by priming.
    pub primed: u64,
    /// Cycles accepted.
    pub accepted: u64,
    /// Accepted cycles outside tolerance.
    pub out_of_spec: u64,
    /// Heartbeats sent.
    pub heartbeats: u64,
}
