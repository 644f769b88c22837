//! Cycle detection state machine.
//!
//! A single detector tracks the last crossing of both endpoints. Every new
//! crossing of endpoint `E` may close a cycle anchored at `E`:
//!
//! ```text
//! E(t1) -> opposite(t2) -> E(t3)      closeable iff t2 > t1
//! ```
//!
//! Because both anchors are tracked independently, a cycle can close on every
//! transition; top-anchored and base-anchored cycles interleave in the output.
//!
//! Candidates outside `(0, max_cycle_ms]` are rejected. The first valid
//! candidate is discarded once as warm-up (priming). Whatever the outcome,
//! the crossing becomes the new `last[E]`.

use crate::twin::types::{CycleRecord, Endpoint, TransitionEvent};
use tracing::{info, warn};

/// Mutable detector state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorState {
    /// Timestamp of the most recent top crossing.
    pub last_top: Option<i64>,
    /// Timestamp of the most recent base crossing.
    pub last_base: Option<i64>,
    /// Set once the warm-up cycle has been discarded; never cleared.
    pub primed: bool,
    /// Number of accepted cycles.
    pub sequence: u64,
}

impl DetectorState {
    /// Last crossing of `kind`, if any.
    #[must_use]
    pub fn last(&self, kind: Endpoint) -> Option<i64> {
        match kind {
            Endpoint::Top => self.last_top,
            Endpoint::Base => self.last_base,
        }
    }

    fn set_last(&mut self, kind: Endpoint, t_ms: i64) {
        match kind {
            Endpoint::Top => self.last_top = Some(t_ms),
            Endpoint::Base => self.last_base = Some(t_ms),
        }
    }
}

/// Outcome of feeding one transition to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// No cycle could be closed (missing history or repeated crossing).
    Open,
    /// A valid cycle closed but was discarded as the warm-up cycle.
    Primed {
        /// Anchor of the discarded cycle.
        anchor: Endpoint,
        /// Duration of the discarded cycle.
        cycle_ms: i64,
    },
    /// A cycle closed outside `(0, max_cycle_ms]`.
    Rejected {
        /// Anchor of the rejected cycle.
        anchor: Endpoint,
        /// Duration of the rejected cycle.
        cycle_ms: i64,
    },
    /// A cycle was accepted; `sequence` has already been advanced.
    Accepted(CycleRecord),
}

impl Observation {
    /// The accepted record, if any.
    #[must_use]
    pub fn record(&self) -> Option<&CycleRecord> {
        match self {
            Self::Accepted(record) => Some(record),
            _ => None,
        }
    }
}

/// Symmetric top/base cycle detector.
#[derive(Debug, Clone)]
pub struct CycleDetector {
    state: DetectorState,
    max_cycle_ms: i64,
}

impl CycleDetector {
    /// Creates a detector.
    ///
    /// With `drop_first` set, the first valid cycle is discarded as warm-up.
    #[must_use]
    pub fn new(max_cycle_ms: i64, drop_first: bool) -> Self {
        Self {
            state: DetectorState { primed: !drop_first, ..DetectorState::default() },
            max_cycle_ms,
        }
    }

    /// Current detector state.
    #[must_use]
    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Number of accepted cycles.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.state.sequence
    }

    /// Upper bound on a valid cycle duration.
    #[must_use]
    pub fn max_cycle_ms(&self) -> i64 {
        self.max_cycle_ms
    }

    /// Returns true if `cycle_ms` lies in `(0, max_cycle_ms]`.
    #[must_use]
    pub fn is_valid_cycle(&self, cycle_ms: i64) -> bool {
        cycle_ms > 0 && cycle_ms <= self.max_cycle_ms
    }

    /// Feeds one transition, stamping accepted records with `captured_at_ms`.
    pub fn observe_at(&mut self, event: TransitionEvent, captured_at_ms: i64) -> Observation {
        let anchor = event.kind;
        let outcome = match (self.state.last(anchor), self.state.last(anchor.opposite())) {
            (Some(t1), Some(t2)) if t2 > t1 => self.close(anchor, t1, t2, event.t_ms, captured_at_ms),
            _ => Observation::Open,
        };

        self.state.set_last(anchor, event.t_ms);
        outcome
    }

    fn close(&mut self, anchor: Endpoint, t1: i64, t2: i64, t3: i64, captured_at_ms: i64) -> Observation {
        // Legs that overflow i64 count as out of range.
        let cycle_ms = match (t2.checked_sub(t1), t3.checked_sub(t2), t3.checked_sub(t1)) {
            (Some(_), Some(_), Some(c)) if self.is_valid_cycle(c) => c,
            (.., c) => {
                let cycle_ms = c.unwrap_or_else(|| t3.saturating_sub(t1));
                warn!(%anchor, cycle_ms, max_cycle_ms = self.max_cycle_ms, "cycle out of range, dropped");
                return Observation::Rejected { anchor, cycle_ms };
            }
        };

        if !self.state.primed {
            self.state.primed = true;
            info!(%anchor, cycle_ms, "primed: first cycle discarded");
            return Observation::Primed { anchor, cycle_ms };
        }

        self.state.sequence += 1;
        Observation::Accepted(CycleRecord::new(anchor, t1, t2, t3, captured_at_ms))
    }
}
