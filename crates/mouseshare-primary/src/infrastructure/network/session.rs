//! Session transport, primary side.
//!
//! One reliable ordered TCP connection to the secondary, accepted on the
//! session port. The listener sets SO_REUSEADDR; accepted streams get
//! TCP_NODELAY (every event is its own small write and must go out
//! immediately) and OS-level keepalive.
//!
//! The [`SessionHandle`] is the send capability handed to the focus
//! controller: a write half behind its own lock, separate from the topology
//! lock, acquired only for the duration of one send. `send` is best-effort
//! fire-and-forget: any error closes the session, and the accept loop goes
//! back to waiting for the next connection.
//!
//! Application keepalive: when nothing has been sent for the configured
//! interval, a `Keepalive` frame proves to the secondary that the session
//! is alive. The primary's inbound direction normally carries nothing, so
//! liveness toward the secondary is judged by send failures and EOF, not by
//! a receive timeout.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mouseshare_core::clock;
use mouseshare_core::protocol::codec::{decode_event, encode_event, Decoded, ProtocolError};
use mouseshare_core::protocol::event::Event;
use mouseshare_core::Topology;

use crate::application::share_input::EventSink;

/// Default application keepalive interval.
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 5_000;

/// Error type for the session transport.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to bind session listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("no open session")]
    Closed,
    #[error("send failed: {0}")]
    Send(std::io::Error),
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

/// Lifecycle notices delivered to the focus task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    Opened { peer: SocketAddr },
    Closed,
}

struct SessionShared {
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    state: AtomicU8,
    last_send_ms: AtomicU64,
    last_recv_ms: AtomicU64,
}

/// Cloneable send capability over the one active session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionShared {
                writer: tokio::sync::Mutex::new(None),
                state: AtomicU8::new(SessionState::Closed as u8),
                last_send_ms: AtomicU64::new(0),
                last_recv_ms: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.inner.state.load(Ordering::Relaxed) {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            _ => SessionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn last_send_ms(&self) -> u64 {
        self.inner.last_send_ms.load(Ordering::Relaxed)
    }

    pub fn mark_recv(&self) {
        self.inner.last_recv_ms.store(clock::now_ms(), Ordering::Relaxed);
    }

    /// Adopts a freshly accepted connection's write half.
    pub async fn attach(&self, writer: OwnedWriteHalf) {
        let mut guard = self.inner.writer.lock().await;
        *guard = Some(writer);
        let now = clock::now_ms();
        self.inner.last_send_ms.store(now, Ordering::Relaxed);
        self.inner.last_recv_ms.store(now, Ordering::Relaxed);
        self.inner.state.store(SessionState::Open as u8, Ordering::Relaxed);
    }

    /// Sends one frame. Any failure closes the session.
    pub async fn send_event(&self, event: &Event) -> Result<(), SessionError> {
        let frame = encode_event(event, clock::wire_timestamp());
        let mut guard = self.inner.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(SessionError::Closed);
        };
        match writer.write_all(&frame).await {
            Ok(()) => {
                self.inner.last_send_ms.store(clock::now_ms(), Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                *guard = None;
                self.inner.state.store(SessionState::Closed as u8, Ordering::Relaxed);
                Err(SessionError::Send(e))
            }
        }
    }

    pub async fn close(&self) {
        let mut guard = self.inner.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            let _ = writer.shutdown().await;
        }
        self.inner.state.store(SessionState::Closed as u8, Ordering::Relaxed);
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for SessionHandle {
    fn is_open(&self) -> bool {
        SessionHandle::is_open(self)
    }

    async fn send(&self, event: Event) -> Result<(), String> {
        self.send_event(&event).await.map_err(|e| e.to_string())
    }
}

/// Whether an application keepalive is owed.
pub fn keepalive_due(now_ms: u64, last_send_ms: u64, interval_ms: u64) -> bool {
    now_ms.saturating_sub(last_send_ms) >= interval_ms
}

/// Binds the session listener with SO_REUSEADDR.
///
/// # Errors
///
/// Returns [`SessionError::Bind`] when the port cannot be bound; the caller
/// treats that as fatal.
pub async fn bind_listener(port: u16) -> Result<TcpListener, SessionError> {
    let into_bind = |source| SessionError::Bind { port, source };
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse().expect("valid bind addr");

    let socket = TcpSocket::new_v4().map_err(into_bind)?;
    socket.set_reuseaddr(true).map_err(into_bind)?;
    socket.bind(addr).map_err(into_bind)?;
    let listener = socket.listen(8).map_err(into_bind)?;
    info!("session listener on tcp {addr}");
    Ok(listener)
}

/// Applies the per-stream socket options the transport contract requires.
fn configure_stream(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    socket2::SockRef::from(stream).set_keepalive(true)?;
    Ok(())
}

/// Accept loop: adopt one connection at a time, greet it with our screen
/// dimensions, drain its inbound side, and loop back to `accept` after
/// every disconnect.
pub async fn run_accept_loop(
    listener: TcpListener,
    handle: SessionHandle,
    topology: Arc<Mutex<Topology>>,
    notices: mpsc::Sender<SessionNotice>,
    screen: (i32, i32),
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        if let Err(e) = configure_stream(&stream) {
            warn!("failed to set socket options for {peer}: {e}");
        }
        info!("secondary connected from {peer}");

        let (reader, writer) = stream.into_split();
        handle.attach(writer).await;

        let greeting = Event::ScreenInfo { width: screen.0, height: screen.1 };
        if let Err(e) = handle.send_event(&greeting).await {
            warn!("failed to send screen info to {peer}: {e}");
            handle.close().await;
            continue;
        }

        let peer_name = set_peer_connected(&topology, peer, true);
        let _ = notices.send(SessionNotice::Opened { peer }).await;

        drain_inbound(reader, &handle).await;

        handle.close().await;
        if peer_name.is_some() {
            set_peer_connected(&topology, peer, false);
        }
        let _ = notices.send(SessionNotice::Closed).await;
        info!("secondary {peer} disconnected");
    }
}

/// Flags the topology peer matching the connection's address, so the edge
/// state machine knows a flush neighbor is actually reachable.
fn set_peer_connected(
    topology: &Arc<Mutex<Topology>>,
    peer: SocketAddr,
    connected: bool,
) -> Option<String> {
    let mut topo = topology.lock().expect("topology lock poisoned");
    let name = topo
        .peers()
        .find(|p| p.addr == peer.ip() && p.name != topo.local_name())
        .map(|p| p.name.clone());
    match &name {
        Some(name) => {
            topo.set_connected(name, connected);
        }
        None => debug!("no discovered peer at {}; topology unchanged", peer.ip()),
    }
    name
}

/// Reads and discards inbound traffic so connection loss and protocol
/// corruption surface promptly. Returns when the session is over.
async fn drain_inbound(mut reader: OwnedReadHalf, handle: &SessionHandle) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                debug!("session read error: {e}");
                return;
            }
        };
        buf.extend_from_slice(&chunk[..n]);
        handle.mark_recv();

        loop {
            match decode_event(&buf) {
                Ok((decoded, used)) => {
                    if let Decoded::Unknown { event_type } = decoded {
                        debug!("ignoring unknown frame type {event_type}");
                    }
                    buf.drain(..used);
                }
                Err(ProtocolError::Truncated { .. }) => break,
                Err(e) => {
                    // Protocol corruption; no resync attempt.
                    warn!("malformed inbound frame ({e}); closing session");
                    return;
                }
            }
        }
    }
}

/// Emits a `Keepalive` whenever the outbound side has been quiet for
/// `interval_ms` while the session is open.
pub async fn run_keepalive(handle: SessionHandle, interval_ms: u64, running: Arc<AtomicBool>) {
    let mut tick = tokio::time::interval(Duration::from_millis((interval_ms / 4).clamp(50, 1000)));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        if !running.load(Ordering::Relaxed) {
            return;
        }
        if handle.is_open() && keepalive_due(clock::now_ms(), handle.last_send_ms(), interval_ms) {
            if let Err(e) = handle.send_event(&Event::Keepalive).await {
                debug!("keepalive send failed: {e}");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
