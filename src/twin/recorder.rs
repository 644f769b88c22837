//! JSON-lines message recorder.
//!
//! Appends every inbound and outbound frame to a file, one row per line:
//!
//! ```text
//! {"ts_iso":"2026-10-19T12:00:00Z","direction":"in","topic":"cycle/events","event":"top","t_ms":1000,"raw_json":"..."}
//! ```
//!
//! The recorder is best effort. Write failures are logged and the runtime
//! loop carries on.

use crate::error::{Result, TwinError};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Which way a recorded frame travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the transport.
    In,
    /// Sent to the transport.
    Out,
}

/// One recorded row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRow {
    /// UTC time the frame was recorded (RFC 3339, seconds).
    pub ts_iso: String,
    /// Frame direction.
    pub direction: Direction,
    /// `topic`, when the frame is a JSON object carrying one.
    pub topic: Option<String>,
    /// `payload.event`, when present.
    pub event: Option<String>,
    /// `payload.t_ms`, when present.
    pub t_ms: Option<f64>,
    /// The frame text as received or sent.
    pub raw_json: String,
}

impl RecordRow {
    /// Builds a row for `raw`, extracting the common fields when it parses.
    #[must_use]
    pub fn new(direction: Direction, raw: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(raw).ok();
        let payload = parsed.as_ref().and_then(|v| v.get("payload"));

        Self {
            ts_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            direction,
            topic: parsed
                .as_ref()
                .and_then(|v| v.get("topic"))
                .and_then(Value::as_str)
                .map(str::to_string),
            event: payload.and_then(|p| p.get("event")).and_then(Value::as_str).map(str::to_string),
            t_ms: payload.and_then(|p| p.get("t_ms")).and_then(Value::as_f64),
            raw_json: raw.to_string(),
        }
    }
}

/// Appends rows to a JSON-lines file.
#[derive(Debug)]
pub struct Recorder {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl Recorder {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TwinError::Recorder(format!("{}: {e}", path.display())))?;

        Ok(Self { path, writer: BufWriter::new(file), rows: 0 })
    }

    /// File being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written since opening.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Records one frame. Failures are logged, never returned.
    pub fn record(&mut self, direction: Direction, raw: &str) {
        if let Err(e) = self.write_row(&RecordRow::new(direction, raw)) {
            warn!(path = %self.path.display(), error = %e, "recorder write failed");
        }
    }

    fn write_row(&mut self, row: &RecordRow) -> Result<()> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_rows(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_row_extracts_fields() {
        let row = RecordRow::new(
            Direction::In,
            r#"{"topic":"cycle/events","payload":{"event":"top","t_ms":1200}}"#,
        );

        assert_eq!(row.topic.as_deref(), Some("cycle/events"));
        assert_eq!(row.event.as_deref(), Some("top"));
        assert_eq!(row.t_ms, Some(1200.0));
        assert!(row.ts_iso.ends_with('Z'));
    }

    #[test]
    fn test_row_for_garbage_keeps_raw() {
        let row = RecordRow::new(Direction::In, "not json");

        assert_eq!(row.topic, None);
        assert_eq!(row.event, None);
        assert_eq!(row.t_ms, None);
        assert_eq!(row.raw_json, "not json");
    }

    #[test]
    fn test_recorder_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twin.jsonl");

        let mut recorder = Recorder::open(&path).unwrap();
        recorder.record(Direction::In, r#"{"topic":"cycle/events","payload":{"event":"base","t_ms":5}}"#);
        recorder.record(Direction::Out, r#"{"topic":"twin/state","payload":{}}"#);
        assert_eq!(recorder.rows(), 2);
        drop(recorder);

        // Reopening appends instead of truncating.
        let mut recorder = Recorder::open(&path).unwrap();
        recorder.record(Direction::Out, "{}");
        assert_eq!(recorder.path(), path.as_path());

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["direction"], "in");
        assert_eq!(rows[0]["event"], "base");
        assert_eq!(rows[1]["direction"], "out");
        assert_eq!(rows[1]["topic"], "twin/state");
        assert_eq!(rows[2]["raw_json"], "{}");
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Recorder::open(dir.path().join("missing").join("twin.jsonl")).unwrap_err();

        assert!(matches!(err, TwinError::Recorder(_)));
    }
}
