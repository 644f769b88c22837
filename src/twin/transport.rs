//! Message transport for the twin.
//!
//! The twin exchanges one JSON text frame at a time with a broker. Two
//! transports are provided:
//!
//! - [`TcpTransport`]: newline-delimited JSON over TCP
//! - [`ChannelTransport`]: in-process pair over tokio channels
//!
//! `recv()` must be cancellation safe: the runtime loop races it against the
//! heartbeat timer and drops the losing future.

use crate::error::{Result, TwinError};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::warn;

/// Largest accepted frame in bytes.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

/// A bidirectional stream of JSON text frames.
pub trait Transport: Send {
    /// Waits for the next inbound frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Sends one outbound frame.
    fn send(&mut self, frame: String) -> impl Future<Output = Result<()>> + Send;
}

// ============================================================================
// TCP
// ============================================================================

/// Newline-delimited JSON over a TCP connection.
#[derive(Debug)]
pub struct TcpTransport {
    framed: Framed<TcpStream, LinesCodec>,
}

impl TcpTransport {
    /// Connects to `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream))
    }

    /// Wraps an established stream.
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_BYTES)) }
    }
}

impl Transport for TcpTransport {
    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.framed.next().await {
                Some(Ok(line)) => return Ok(Some(line)),
                // The codec skips to the next newline; the stream stays usable.
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!(max_bytes = MAX_FRAME_BYTES, "oversized frame dropped");
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn send(&mut self, frame: String) -> Result<()> {
        self.framed.send(frame).await.map_err(|e| TwinError::Transport(e.to_string()))
    }
}

// ============================================================================
// In-process channels
// ============================================================================

/// Transport backed by tokio channels.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
}

/// The far end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelPeer {
    /// Frames sent here arrive at the transport's `recv()`.
    pub inbound: mpsc::Sender<String>,
    /// Frames the transport `send()`s arrive here.
    pub outbound: mpsc::Receiver<String>,
}

impl ChannelTransport {
    /// Creates a connected transport/peer pair with `capacity` slots per
    /// direction.
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, ChannelPeer) {
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        (Self { inbound: in_rx, outbound: out_tx }, ChannelPeer { inbound: in_tx, outbound: out_rx })
    }
}

impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<String>> {
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, frame: String) -> Result<()> {
        self.outbound.send(frame).await.map_err(|_| TwinError::ConnectionClosed)
    }
}

// ============================================================================
// Reconnection
// ============================================================================

/// What to do after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Give up and surface the error.
    Never,
    /// Reconnect without delay.
    Immediate,
    /// Reconnect after `initial`, doubling up to `max`.
    Backoff {
        /// Delay before the first retry.
        initial: Duration,
        /// Upper bound on the delay.
        max: Duration,
    },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based); `None` to give up.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Never => None,
            Self::Immediate => Some(Duration::ZERO),
            Self::Backoff { initial, max } => {
                let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
                Some(initial.saturating_mul(factor).min(max))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_channel_transport_round_trip() {
        let (mut transport, mut peer) = ChannelTransport::pair(4);

        peer.inbound.send("hello".to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), Some("hello".to_string()));

        transport.send("world".to_string()).await.unwrap();
        assert_eq!(peer.outbound.recv().await, Some("world".to_string()));
    }

    #[tokio::test]
    async fn test_channel_transport_close() {
        let (mut transport, peer) = ChannelTransport::pair(4);
        let ChannelPeer { inbound, outbound } = peer;

        drop(inbound);
        assert_eq!(transport.recv().await.unwrap(), None);

        drop(outbound);
        let err = transport.send("x".to_string()).await.unwrap_err();
        assert!(matches!(err, TwinError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_tcp_transport_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            write.write_all(b"{\"topic\":\"a\"}\n{\"topic\":\"b\"}\n").await.unwrap();
            let mut lines = BufReader::new(read).lines();
            lines.next_line().await.unwrap()
        });

        let mut transport = TcpTransport::connect(addr).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{\"topic\":\"a\"}"));
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{\"topic\":\"b\"}"));

        transport.send("{\"topic\":\"twin/state\"}".to_string()).await.unwrap();
        assert_eq!(server.await.unwrap().as_deref(), Some("{\"topic\":\"twin/state\"}"));

        assert_eq!(transport.recv().await.unwrap(), None, "server closed the socket");
    }

    #[test]
    fn test_reconnect_never() {
        assert_eq!(ReconnectPolicy::Never.delay(0), None);
    }

    #[test]
    fn test_reconnect_immediate() {
        assert_eq!(ReconnectPolicy::Immediate.delay(0), Some(Duration::ZERO));
        assert_eq!(ReconnectPolicy::Immediate.delay(9), Some(Duration::ZERO));
    }

    #[test]
    fn test_reconnect_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::Backoff {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(2),
        };

        assert_eq!(policy.delay(0), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(1000)));
        assert_eq!(policy.delay(3), Some(Duration::from_millis(2000)));
        assert_eq!(policy.delay(40), Some(Duration::from_millis(2000)));
    }
}
