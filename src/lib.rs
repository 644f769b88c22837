//! # cycle-twin
//!
//! Cycle-time digital twin for reciprocating machines.
//!
//! A sensor stream reports each time the machine reaches its `top` or `base`
//! endpoint. The twin pairs those crossings into complete cycles, keeps a
//! bounded history, and publishes per-cycle and windowed telemetry (mean,
//! p95, min, max, cycles per minute, pass/fail against a tolerance) on every
//! accepted cycle and on a fixed heartbeat.
//!
//! ## Quick Start
//!
//! ```rust
//! use cycle_twin::prelude::*;
//!
//! let mut twin = Twin::new(8700, false, 500);
//! twin.observe(TransitionEvent::top(0));
//! twin.observe(TransitionEvent::base(1000));
//!
//! let cycle = twin.observe(TransitionEvent::top(2950)).unwrap();
//! assert_eq!(cycle.cycle_ms, 2950);
//! assert_eq!(cycle.anchor, Endpoint::Top);
//! ```

#![warn(missing_docs)]
// Allow unwrap() in tests only - banned in production code
#![cfg_attr(test, allow(clippy::unwrap_used))]
// Millisecond timestamps move between i64 and f64 for statistics
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Error Types
// ============================================================================

/// Error types for cycle-twin operations.
pub mod error;

pub use error::{Result, TwinError};

// ============================================================================
// Twin
// ============================================================================

/// Cycle detection, statistics, publishing and the runtime loop.
pub mod twin;

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types for convenient imports.
///
/// ```rust
/// use cycle_twin::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Result, TwinError};
    pub use crate::twin::{
        App, Config, CycleRecord, Endpoint, HistoryBuffer, Observation, ReconnectPolicy,
        StatePublisher, TransitionEvent, Transport, Twin, WindowStats,
    };
}
