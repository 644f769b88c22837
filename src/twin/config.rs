//! Configuration for the cycle twin.
//!
//! Supports YAML configuration with precedence: CLI > ENV > file > defaults.
//! All values are fixed at startup.

use crate::error::{Result, TwinError};
use crate::twin::filter::TRANSITION_TOPIC;
use crate::twin::history::HISTORY_CAPACITY;
use crate::twin::transport::ReconnectPolicy;
use crate::twin::types::MAX_TIMESTAMP_MS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cycle detection and reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Ideal cycle duration in seconds.
    #[serde(default = "default_ideal_cycle_s")]
    pub ideal_cycle_s: f64,

    /// Accepted deviation from the ideal cycle, in milliseconds.
    #[serde(default = "default_tolerance_ms")]
    pub tolerance_ms: i64,

    /// Number of recent cycles used for windowed statistics.
    #[serde(default = "default_window_n")]
    pub window_n: usize,

    /// Heartbeat period in milliseconds.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    /// Number of accepted cycles kept in memory.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Longest valid cycle as a multiple of the ideal cycle.
    #[serde(default = "default_max_cycle_factor")]
    pub max_cycle_factor: u32,

    /// Discard the first valid cycle as warm-up.
    #[serde(default = "default_prime_drop_first")]
    pub prime_drop_first: bool,

    /// Topic carrying transition events.
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_ideal_cycle_s() -> f64 {
    2.9
}
fn default_tolerance_ms() -> i64 {
    100
}
fn default_window_n() -> usize {
    20
}
fn default_heartbeat_ms() -> u64 {
    1000
}
fn default_history_capacity() -> usize {
    HISTORY_CAPACITY
}
fn default_max_cycle_factor() -> u32 {
    3
}
fn default_prime_drop_first() -> bool {
    true
}
fn default_topic() -> String {
    TRANSITION_TOPIC.to_string()
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            ideal_cycle_s: default_ideal_cycle_s(),
            tolerance_ms: default_tolerance_ms(),
            window_n: default_window_n(),
            heartbeat_ms: default_heartbeat_ms(),
            history_capacity: default_history_capacity(),
            max_cycle_factor: default_max_cycle_factor(),
            prime_drop_first: default_prime_drop_first(),
            topic: default_topic(),
        }
    }
}

/// Reconnection strategy name in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectMode {
    /// Exit when the connection drops.
    Never,
    /// Reconnect right away.
    Immediate,
    /// Reconnect with doubling delays.
    Backoff,
}

/// Transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Broker address (`host:port`).
    #[serde(default = "default_url")]
    pub url: String,

    /// Reconnection strategy.
    #[serde(default = "default_reconnect")]
    pub reconnect: ReconnectMode,

    /// First reconnect delay in milliseconds (backoff mode).
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Longest reconnect delay in milliseconds (backoff mode).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_url() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_reconnect() -> ReconnectMode {
    ReconnectMode::Backoff
}
fn default_backoff_initial_ms() -> u64 {
    1000
}
fn default_backoff_max_ms() -> u64 {
    2000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            reconnect: default_reconnect(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cycle detection settings.
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Optional JSON-lines file recording every inbound and outbound message.
    #[serde(default)]
    pub record_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/cycle-twin/config.yaml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cycle-twin").join("config.yaml"))
    }

    /// Loads configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| TwinError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parses configuration from a YAML string.
    ///
    /// Parse errors carry the offending line number.
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            let line = e.location().map(|l| l.line()).unwrap_or(0);
            TwinError::ConfigParse { line, message: e.to_string() }
        })
    }

    /// Loads configuration with fallback to defaults.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Applies `TWIN_*` overrides from `vars`.
    ///
    /// Pass `std::env::vars()` in production; tests pass explicit pairs.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let value: String = value.into();
            match key {
                "TWIN_URL" => self.transport.url = value,
                "TWIN_TOPIC" => self.cycle.topic = value,
                "TWIN_RECORD_PATH" => self.record_path = Some(PathBuf::from(value)),
                "TWIN_IDEAL_CYCLE_S" => self.cycle.ideal_cycle_s = parse_env(key, &value)?,
                "TWIN_TOLERANCE_MS" => self.cycle.tolerance_ms = parse_env(key, &value)?,
                "TWIN_WINDOW_N" => self.cycle.window_n = parse_env(key, &value)?,
                "TWIN_HEARTBEAT_MS" => self.cycle.heartbeat_ms = parse_env(key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        let c = &self.cycle;
        if !(c.ideal_cycle_s.is_finite() && c.ideal_cycle_s > 0.0) || self.ideal_ms() <= 0 {
            return Err(invalid("ideal_cycle_s", "must be a positive number of seconds of at least 1ms"));
        }
        if c.tolerance_ms < 0 {
            return Err(invalid("tolerance_ms", "must not be negative"));
        }
        if c.window_n == 0 {
            return Err(invalid("window_n", "must be at least 1"));
        }
        if c.heartbeat_ms == 0 {
            return Err(invalid("heartbeat_ms", "must be at least 1"));
        }
        if c.history_capacity == 0 {
            return Err(invalid("history_capacity", "must be at least 1"));
        }
        if c.max_cycle_factor == 0 {
            return Err(invalid("max_cycle_factor", "must be at least 1"));
        }
        if self.ideal_ms() > MAX_TIMESTAMP_MS {
            return Err(invalid("ideal_cycle_s", "must not exceed 2^53 ms"));
        }
        if self.ideal_ms().checked_mul(i64::from(c.max_cycle_factor)).map_or(true, |m| m > MAX_TIMESTAMP_MS) {
            return Err(invalid("max_cycle_factor", "ideal cycle times factor must not exceed 2^53 ms"));
        }
        if self.transport.url.is_empty() {
            return Err(invalid("url", "must not be empty"));
        }
        Ok(())
    }

    /// Ideal cycle duration in milliseconds (truncated).
    #[must_use]
    pub fn ideal_ms(&self) -> i64 {
        (self.cycle.ideal_cycle_s * 1000.0) as i64
    }

    /// Longest valid cycle in milliseconds (saturating).
    #[must_use]
    pub fn max_cycle_ms(&self) -> i64 {
        self.ideal_ms().saturating_mul(i64::from(self.cycle.max_cycle_factor))
    }

    /// Heartbeat period as a Duration.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.cycle.heartbeat_ms)
    }

    /// Reconnection policy described by the transport settings.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        match self.transport.reconnect {
            ReconnectMode::Never => ReconnectPolicy::Never,
            ReconnectMode::Immediate => ReconnectPolicy::Immediate,
            ReconnectMode::Backoff => ReconnectPolicy::Backoff {
                initial: Duration::from_millis(self.transport.backoff_initial_ms),
                max: Duration::from_millis(self.transport.backoff_max_ms),
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, &format!("cannot parse '{value}'")))
}

fn invalid(key: &str, message: &str) -> TwinError {
    TwinError::ConfigInvalid { key: key.to_string(), message: message.to_string() }
}
