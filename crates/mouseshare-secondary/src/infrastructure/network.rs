//! Session connection, secondary side.
//!
//! Connects to the primary's session port and feeds decoded frames to the
//! replay task. Reconnection is unconditional and infinite at a fixed
//! interval; on a trusted LAN the cheap retry beats backoff bookkeeping.
//!
//! Liveness: `last_recv` resets on *any* inbound frame (keepalives
//! included); when nothing arrives for the idle timeout the session is
//! declared dead and torn down. A malformed frame also closes the
//! connection; no resynchronisation is attempted on protocol corruption.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mouseshare_core::clock;
use mouseshare_core::protocol::codec::{decode_event, Decoded, ProtocolError};
use mouseshare_core::protocol::event::Event;

/// Default fixed reconnect interval.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;

/// Default inbound idle timeout.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Why a connection attempt or an established session ended.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to resolve {host}: {source}")]
    AddressResolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connection to {addr} refused: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("connection to {addr} timed out")]
    ConnectTimeout { addr: SocketAddr },
    #[error("receive failed: {0}")]
    Recv(std::io::Error),
    #[error("connection closed by primary")]
    PeerClosed,
    #[error("malformed frame: {0}")]
    MalformedFrame(ProtocolError),
    #[error("no inbound traffic for {idle_ms} ms")]
    IdleTimeout { idle_ms: u64 },
}

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Primary host name or address.
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    pub idle_timeout_ms: u64,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

/// Events delivered to the replay task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected { peer: SocketAddr },
    Frame(Event),
    Disconnected,
}

/// Whether the inbound side has been quiet past the idle limit.
pub fn idle_timed_out(now_ms: u64, last_recv_ms: u64, idle_timeout_ms: u64) -> bool {
    now_ms.saturating_sub(last_recv_ms) > idle_timeout_ms
}

/// The reconnecting session link to the primary.
pub struct PrimaryLink {
    config: ConnectionConfig,
}

impl PrimaryLink {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Spawns the connect/read/reconnect loop and returns the event
    /// channel. The loop runs until `running` clears.
    pub fn start(self, running: Arc<AtomicBool>) -> mpsc::Receiver<LinkEvent> {
        let (tx, rx) = mpsc::channel(128);

        tokio::spawn(async move {
            while running.load(Ordering::Relaxed) {
                match connect_once(&self.config).await {
                    Ok((stream, peer)) => {
                        info!("connected to primary at {peer}");
                        if tx.send(LinkEvent::Connected { peer }).await.is_err() {
                            return;
                        }

                        let reason =
                            read_frames(stream, &tx, self.config.idle_timeout_ms).await;
                        match reason {
                            LinkError::PeerClosed => info!("primary closed the session"),
                            other => warn!("session ended: {other}"),
                        }
                        if tx.send(LinkEvent::Disconnected).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => debug!("connect attempt failed: {e}"),
                }

                if running.load(Ordering::Relaxed) {
                    tokio::time::sleep(Duration::from_millis(self.config.reconnect_interval_ms))
                        .await;
                }
            }
        });

        rx
    }
}

async fn connect_once(config: &ConnectionConfig) -> Result<(TcpStream, SocketAddr), LinkError> {
    let mut addrs =
        lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(|source| LinkError::AddressResolve {
                host: config.host.clone(),
                source,
            })?;
    let addr = addrs.next().ok_or_else(|| LinkError::AddressResolve {
        host: config.host.clone(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
    })?;

    let stream = tokio::time::timeout(
        Duration::from_millis(config.connect_timeout_ms),
        TcpStream::connect(addr),
    )
    .await
    .map_err(|_| LinkError::ConnectTimeout { addr })?
    .map_err(|source| LinkError::Connect { addr, source })?;

    stream.set_nodelay(true).map_err(LinkError::Recv)?;
    if let Err(e) = socket2::SockRef::from(&stream).set_keepalive(true) {
        warn!("failed to enable tcp keepalive: {e}");
    }
    Ok((stream, addr))
}

/// Reads frames until the session dies; the return value is the reason.
///
/// Reads are accumulated in a buffer and complete frames peeled off the
/// front, so the periodic idle check never cancels a partial frame read.
async fn read_frames(
    mut stream: TcpStream,
    tx: &mpsc::Sender<LinkEvent>,
    idle_timeout_ms: u64,
) -> LinkError {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 2048];
    let mut last_recv_ms = clock::now_ms();
    let mut idle_check = tokio::time::interval(Duration::from_millis(500));
    idle_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            read = stream.read(&mut chunk) => {
                let n = match read {
                    Ok(0) => return LinkError::PeerClosed,
                    Ok(n) => n,
                    Err(e) => return LinkError::Recv(e),
                };
                last_recv_ms = clock::now_ms();
                buf.extend_from_slice(&chunk[..n]);

                loop {
                    match decode_event(&buf) {
                        Ok((Decoded::Event(event), used)) => {
                            buf.drain(..used);
                            if tx.send(LinkEvent::Frame(event)).await.is_err() {
                                return LinkError::PeerClosed;
                            }
                        }
                        Ok((Decoded::Unknown { event_type }, used)) => {
                            debug!("ignoring unknown frame type {event_type}");
                            buf.drain(..used);
                        }
                        Err(ProtocolError::Truncated { .. }) => break,
                        Err(e) => return LinkError::MalformedFrame(e),
                    }
                }
            }
            _ = idle_check.tick() => {
                if idle_timed_out(clock::now_ms(), last_recv_ms, idle_timeout_ms) {
                    return LinkError::IdleTimeout { idle_ms: idle_timeout_ms };
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
