//! Cycle-time digital twin.
//!
//! Watches endpoint transitions of a reciprocating machine (`top` / `base`),
//! reconstructs complete cycles and publishes live telemetry against an
//! ideal cycle time.
//!
//! ```text
//! transport ──▶ EventFilter ──▶ CycleDetector ──▶ HistoryBuffer
//!                                                      │
//!         heartbeat ticker ──▶ StatePublisher ◀────────┘ ──▶ transport
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cycle_twin::twin::{App, Config, TcpTransport};
//!
//! let config = Config::load_or_default("twin.yaml");
//! let mut app = App::new(&config);
//! let url = config.transport.url.clone();
//! app.run(|| TcpTransport::connect(url.clone()), config.reconnect_policy()).await?;
//! ```

// ============================================================================
// Core Types
// ============================================================================

pub mod history;
pub mod types;

pub use history::{HistoryBuffer, HISTORY_CAPACITY};
pub use types::{CycleRecord, Endpoint, TransitionEvent, MAX_TIMESTAMP_MS};

// ============================================================================
// Pipeline
// ============================================================================

pub mod detector;
pub mod filter;
pub mod publisher;
pub mod stats;

pub use detector::{CycleDetector, DetectorState, Observation};
pub use filter::{EventFilter, Rejection, TRANSITION_TOPIC};
pub use publisher::{StatePublisher, CONFIG_TOPIC, STATE_TOPIC};
pub use stats::{window_stats, WindowStats};

// ============================================================================
// Configuration
// ============================================================================

pub mod config;

pub use config::Config;

// ============================================================================
// I/O
// ============================================================================

pub mod recorder;
pub mod transport;

pub use recorder::Recorder;
pub use transport::{ChannelTransport, ReconnectPolicy, TcpTransport, Transport};

// ============================================================================
// Application
// ============================================================================

pub mod app;
pub mod state;

pub use app::App;
pub use state::{Counters, Twin};
