//! Core types for the cycle twin.
//!
//! - [`Endpoint`]: which physical endpoint a transition crossed (top or base)
//! - [`TransitionEvent`]: a single timestamped crossing
//! - [`CycleRecord`]: a completed, validated cycle anchored at one endpoint

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Largest timestamp magnitude accepted from the wire (2^53 ms).
///
/// Every integer up to this bound is exact as a JSON number, and differences
/// of two such timestamps cannot overflow `i64`.
pub const MAX_TIMESTAMP_MS: i64 = 1 << 53;

/// A physical endpoint of the back-and-forth motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Upper endpoint.
    Top,
    /// Lower endpoint.
    Base,
}

impl Endpoint {
    /// Returns the opposite endpoint.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Base,
            Self::Base => Self::Top,
        }
    }

    /// Returns the wire name of the endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Base => "base",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "top" => Ok(Self::Top),
            "base" => Ok(Self::Base),
            _ => Err(()),
        }
    }
}

/// A reported crossing of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Which endpoint was crossed.
    pub kind: Endpoint,
    /// Device timestamp of the crossing in milliseconds.
    pub t_ms: i64,
}

impl TransitionEvent {
    /// Creates a new transition event.
    #[must_use]
    pub fn new(kind: Endpoint, t_ms: i64) -> Self {
        Self { kind, t_ms }
    }

    /// Shorthand for a top crossing.
    #[must_use]
    pub fn top(t_ms: i64) -> Self {
        Self::new(Endpoint::Top, t_ms)
    }

    /// Shorthand for a base crossing.
    #[must_use]
    pub fn base(t_ms: i64) -> Self {
        Self::new(Endpoint::Base, t_ms)
    }
}

/// A completed cycle: `anchor(t_start) -> opposite(t_mid) -> anchor(t_end)`.
///
/// Records are immutable once built. Both anchors share one constructor;
/// "advance" is always the leg from the anchor to the opposite endpoint and
/// "return" the leg back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Endpoint the cycle starts and ends at.
    pub anchor: Endpoint,
    /// Previous crossing of the anchor.
    pub t_start_ms: i64,
    /// Intervening crossing of the opposite endpoint.
    pub t_mid_ms: i64,
    /// Current crossing of the anchor.
    pub t_end_ms: i64,
    /// `t_mid_ms - t_start_ms`.
    pub advance_ms: i64,
    /// `t_end_ms - t_mid_ms`.
    pub return_ms: i64,
    /// `t_end_ms - t_start_ms`.
    pub cycle_ms: i64,
    /// Host wall-clock time the record was created.
    pub captured_at_ms: i64,
}

impl CycleRecord {
    /// Builds a record from the three crossing timestamps.
    ///
    /// The pairwise differences must fit in `i64`; [`CycleDetector`] rejects
    /// candidates that do not before building a record.
    ///
    /// [`CycleDetector`]: crate::twin::detector::CycleDetector
    #[must_use]
    pub fn new(anchor: Endpoint, t_start_ms: i64, t_mid_ms: i64, t_end_ms: i64, captured_at_ms: i64) -> Self {
        Self {
            anchor,
            t_start_ms,
            t_mid_ms,
            t_end_ms,
            advance_ms: t_mid_ms - t_start_ms,
            return_ms: t_end_ms - t_mid_ms,
            cycle_ms: t_end_ms - t_start_ms,
            captured_at_ms,
        }
    }
}

/// Current host wall-clock time in milliseconds since the UNIX epoch.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
