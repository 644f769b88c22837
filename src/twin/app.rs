//! Runtime loop for the twin.
//!
//! One task owns the [`Twin`] and multiplexes two sources:
//!
//! 1. A wall-clock heartbeat ticker (checked first, so traffic cannot starve it)
//! 2. Inbound frames from the transport
//!
//! Every accepted cycle is published immediately; every tick publishes a
//! heartbeat without cycle fields. Twin state survives reconnects.

use crate::error::{Result, TwinError};
use crate::twin::config::Config;
use crate::twin::detector::Observation;
use crate::twin::filter::EventFilter;
use crate::twin::publisher::StatePublisher;
use crate::twin::recorder::{Direction, Recorder};
use crate::twin::state::{Counters, Twin};
use crate::twin::transport::{ReconnectPolicy, Transport};
use crate::twin::types::{now_ms, CycleRecord};
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// The cycle twin application.
#[derive(Debug)]
pub struct App {
    twin: Twin,
    filter: EventFilter,
    publisher: StatePublisher,
    heartbeat: Duration,
    recorder: Option<Recorder>,
    counters: Counters,
}

impl App {
    /// Creates an application from a validated configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            twin: Twin::from_config(config),
            filter: EventFilter::new(config.cycle.topic.clone()),
            publisher: StatePublisher::new(
                config.ideal_ms(),
                config.cycle.tolerance_ms,
                config.cycle.window_n,
            ),
            heartbeat: config.heartbeat_interval(),
            recorder: None,
            counters: Counters::default(),
        }
    }

    /// Records every frame to `recorder`.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Twin state.
    #[must_use]
    pub fn twin(&self) -> &Twin {
        &self.twin
    }

    /// Running totals.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// The `twin/config` frame.
    pub fn config_announcement(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.publisher.config_announcement())?)
    }

    /// A `twin/state` frame, optionally reporting `last_cycle`.
    pub fn state_frame(&self, last_cycle: Option<&CycleRecord>) -> Result<String> {
        let envelope = self.publisher.build_state(self.twin.history(), self.twin.sequence(), last_cycle);
        Ok(serde_json::to_string(&envelope)?)
    }

    /// A heartbeat frame (no cycle fields).
    pub fn heartbeat(&self) -> Result<String> {
        self.state_frame(None)
    }

    /// Processes one inbound frame.
    ///
    /// Returns the state frame to publish when the frame closed an accepted
    /// cycle. Malformed or irrelevant frames are dropped.
    pub fn handle_message(&mut self, raw: &str) -> Result<Option<String>> {
        self.counters.received += 1;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(Direction::In, raw);
        }

        let event = match self.filter.parse(raw) {
            Ok(event) => event,
            Err(reason) => {
                self.counters.ignored += 1;
                debug!(reason = reason.as_str(), "message ignored");
                return Ok(None);
            }
        };
        self.counters.transitions += 1;

        match self.twin.observe_at(event, now_ms()) {
            Observation::Open => Ok(None),
            Observation::Primed { .. } => {
                self.counters.primed += 1;
                Ok(None)
            }
            Observation::Rejected { .. } => {
                self.counters.rejected += 1;
                Ok(None)
            }
            Observation::Accepted(cycle) => {
                self.counters.accepted += 1;
                if !self.publisher.passes(cycle.cycle_ms) {
                    self.counters.out_of_spec += 1;
                }
                debug!(
                    seq = self.twin.sequence(),
                    anchor = %cycle.anchor,
                    cycle_ms = cycle.cycle_ms,
                    advance_ms = cycle.advance_ms,
                    return_ms = cycle.return_ms,
                    "cycle accepted"
                );
                self.state_frame(Some(&cycle)).map(Some)
            }
        }
    }

    /// Runs one session on a connected transport until it fails or closes.
    ///
    /// Announces the configuration, then alternates between heartbeats and
    /// inbound frames. Never returns `Ok`: a clean close from the peer is
    /// reported as [`TwinError::ConnectionClosed`].
    pub async fn run_session<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        let announcement = self.config_announcement()?;
        self.send(transport, announcement).await?;
        info!(interval_ms = self.heartbeat.as_millis() as u64, "session started");

        let mut ticker = time::interval(self.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = ticker.tick() => {
                    let frame = self.heartbeat()?;
                    self.send(transport, frame).await?;
                    self.counters.heartbeats += 1;
                    trace!(counters = ?self.counters, "heartbeat");
                }

                inbound = transport.recv() => {
                    let Some(raw) = inbound? else {
                        return Err(TwinError::ConnectionClosed);
                    };
                    if let Some(frame) = self.handle_message(&raw)? {
                        self.send(transport, frame).await?;
                    }
                }
            }
        }
    }

    /// Runs sessions until the reconnect policy gives up.
    ///
    /// `connect` is called for every (re)connection. Twin state is kept
    /// across sessions. Non-transport errors end the loop immediately.
    pub async fn run<T, C, Fut>(&mut self, mut connect: C, policy: ReconnectPolicy) -> Result<()>
    where
        T: Transport,
        C: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let err = match connect().await {
                Ok(mut transport) => {
                    info!(seq = self.twin.sequence(), "transport connected");
                    attempt = 0;
                    match self.run_session(&mut transport).await {
                        Ok(()) => return Ok(()),
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            if !err.is_transport() {
                return Err(err);
            }

            let Some(delay) = policy.delay(attempt) else {
                return Err(err);
            };
            warn!(error = %err, attempt, delay_ms = delay.as_millis() as u64, "transport lost, reconnecting");
            attempt = attempt.saturating_add(1);
            time::sleep(delay).await;
        }
    }

    async fn send<T: Transport>(&mut self, transport: &mut T, frame: String) -> Result<()> {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(Direction::Out, &frame);
        }
        transport.send(frame).await
    }
}
