//! Inbound message classification.
//!
//! Turns raw transport frames into [`TransitionEvent`]s. Anything that is not
//! a well-formed transition on the configured topic is classified with a
//! [`Rejection`] reason and dropped by the caller; nothing here is an error.

use crate::twin::types::{Endpoint, TransitionEvent, MAX_TIMESTAMP_MS};
use serde_json::Value;

/// Default topic carrying transition events.
pub const TRANSITION_TOPIC: &str = "cycle/events";

/// Why an inbound message was not a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Frame was not valid JSON.
    Malformed,
    /// Message topic is not the transition topic.
    OtherTopic,
    /// `payload.event` is missing or not `top`/`base`.
    UnknownEvent,
    /// `payload.t_ms` is missing, not a finite number, or beyond
    /// [`MAX_TIMESTAMP_MS`] in magnitude.
    BadTimestamp,
}

impl Rejection {
    /// Short label used in logs and counters.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::OtherTopic => "other_topic",
            Self::UnknownEvent => "unknown_event",
            Self::BadTimestamp => "bad_timestamp",
        }
    }
}

/// Classifies inbound messages against a single transition topic.
#[derive(Debug, Clone)]
pub struct EventFilter {
    topic: String,
}

impl EventFilter {
    /// Creates a filter accepting transitions on `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self { topic: topic.into() }
    }

    /// The topic this filter accepts.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Parses and classifies a raw text frame.
    pub fn parse(&self, raw: &str) -> Result<TransitionEvent, Rejection> {
        let value: Value = serde_json::from_str(raw).map_err(|_| Rejection::Malformed)?;
        self.classify(&value)
    }

    /// Classifies an already decoded message.
    pub fn classify(&self, message: &Value) -> Result<TransitionEvent, Rejection> {
        if message.get("topic").and_then(Value::as_str) != Some(self.topic.as_str()) {
            return Err(Rejection::OtherTopic);
        }

        let payload = message.get("payload");

        let kind = payload
            .and_then(|p| p.get("event"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Endpoint>().ok())
            .ok_or(Rejection::UnknownEvent)?;

        // Bools are not numbers here; as_f64 only matches JSON numbers.
        let t_ms = payload
            .and_then(|p| p.get("t_ms"))
            .and_then(Value::as_f64)
            .filter(|t| t.is_finite() && t.abs() <= MAX_TIMESTAMP_MS as f64)
            .ok_or(Rejection::BadTimestamp)?;

        Ok(TransitionEvent::new(kind, t_ms.trunc() as i64))
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new(TRANSITION_TOPIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_top_event() {
        let filter = EventFilter::default();
        let ev = filter.parse(r#"{"topic":"cycle/events","payload":{"event":"top","t_ms":1234}}"#);

        assert_eq!(ev, Ok(TransitionEvent::top(1234)));
    }

    #[test]
    fn test_parse_base_event_with_extra_fields() {
        let filter = EventFilter::default();
        let msg = json!({
            "topic": "cycle/events",
            "payload": { "event": "base", "t_ms": 99, "v_rms_g": 0.4 }
        });

        assert_eq!(filter.classify(&msg), Ok(TransitionEvent::base(99)));
    }

    #[test]
    fn test_fractional_timestamp_truncates() {
        let filter = EventFilter::default();
        let msg = json!({ "topic": "cycle/events", "payload": { "event": "top", "t_ms": 1500.9 } });

        assert_eq!(filter.classify(&msg), Ok(TransitionEvent::top(1500)));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let filter = EventFilter::default();

        assert_eq!(filter.parse("{not json"), Err(Rejection::Malformed));
        assert_eq!(filter.parse(""), Err(Rejection::Malformed));
    }

    #[test]
    fn test_other_topic_is_ignored() {
        let filter = EventFilter::default();
        let msg = json!({ "topic": "twin/state", "payload": { "event": "top", "t_ms": 1 } });

        assert_eq!(filter.classify(&msg), Err(Rejection::OtherTopic));
    }

    #[test]
    fn test_missing_topic_is_ignored() {
        let filter = EventFilter::default();

        assert_eq!(filter.classify(&json!({ "payload": {} })), Err(Rejection::OtherTopic));
        assert_eq!(filter.classify(&json!([1, 2, 3])), Err(Rejection::OtherTopic));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let filter = EventFilter::default();

        for event in [json!("middle"), json!("TOP"), json!(1), json!(null)] {
            let msg = json!({ "topic": "cycle/events", "payload": { "event": event, "t_ms": 1 } });
            assert_eq!(filter.classify(&msg), Err(Rejection::UnknownEvent));
        }

        let no_payload = json!({ "topic": "cycle/events" });
        assert_eq!(filter.classify(&no_payload), Err(Rejection::UnknownEvent));
    }

    #[test]
    fn test_non_numeric_timestamp_is_rejected() {
        let filter = EventFilter::default();

        for t in [json!("1000"), json!(true), json!(null), json!({}), json!([1])] {
            let msg = json!({ "topic": "cycle/events", "payload": { "event": "top", "t_ms": t } });
            assert_eq!(filter.classify(&msg), Err(Rejection::BadTimestamp));
        }

        let missing = json!({ "topic": "cycle/events", "payload": { "event": "top" } });
        assert_eq!(filter.classify(&missing), Err(Rejection::BadTimestamp));
    }

    #[test]
    fn test_out_of_range_timestamp_is_rejected() {
        let filter = EventFilter::default();

        for t in [json!(1e30), json!(-9e18), json!(9_007_199_254_740_994_i64), json!(i64::MIN)] {
            let msg = json!({ "topic": "cycle/events", "payload": { "event": "top", "t_ms": t } });
            assert_eq!(filter.classify(&msg), Err(Rejection::BadTimestamp), "t_ms = {t}");
        }

        let edge = json!({ "topic": "cycle/events", "payload": { "event": "base", "t_ms": MAX_TIMESTAMP_MS } });
        assert_eq!(filter.classify(&edge), Ok(TransitionEvent::base(MAX_TIMESTAMP_MS)));

        let neg = json!({ "topic": "cycle/events", "payload": { "event": "top", "t_ms": -MAX_TIMESTAMP_MS } });
        assert_eq!(filter.classify(&neg), Ok(TransitionEvent::top(-MAX_TIMESTAMP_MS)));
    }

    #[test]
    fn test_custom_topic() {
        let filter = EventFilter::new("press/1/events");
        let msg = json!({ "topic": "press/1/events", "payload": { "event": "base", "t_ms": 5 } });

        assert_eq!(filter.topic(), "press/1/events");
        assert_eq!(filter.classify(&msg), Ok(TransitionEvent::base(5)));
        assert_eq!(
            EventFilter::default().classify(&msg),
            Err(Rejection::OtherTopic)
        );
    }
}
