//! Presence broadcasting, secondary side.
//!
//! The secondary announces itself on the discovery port so the primary's
//! topology learns its name, address, and screen size; without that the
//! primary never treats it as a switchable neighbor. Inbound announcements
//! are only logged here; the secondary takes no routing decisions.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use mouseshare_core::protocol::discovery::{encode_presence, parse_presence, PresencePacket};

/// How often presence is broadcast.
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 3_000;

/// Error type for the presence broadcaster.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to bind discovery socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// What this host announces about itself.
#[derive(Debug, Clone)]
pub struct LocalAnnouncement {
    pub name: String,
    pub session_port: u16,
    pub screen_width: i32,
    pub screen_height: i32,
}

/// Binds the discovery socket and spawns the broadcast thread.
///
/// # Errors
///
/// Returns [`DiscoveryError::Bind`] if the socket cannot be set up; the
/// caller treats that as fatal.
pub fn start_broadcaster(
    discovery_port: u16,
    announcement: LocalAnnouncement,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, DiscoveryError> {
    let socket = bind_broadcast_socket(discovery_port)?;
    info!("presence broadcaster on udp 0.0.0.0:{discovery_port}");

    let handle = std::thread::Builder::new()
        .name("ms-discovery".to_string())
        .spawn(move || broadcast_loop(socket, discovery_port, announcement, running))
        .expect("failed to spawn discovery thread");
    Ok(handle)
}

fn bind_broadcast_socket(port: u16) -> Result<UdpSocket, DiscoveryError> {
    let into_bind = |source| DiscoveryError::Bind { port, source };

    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )
    .map_err(into_bind)?;
    socket.set_reuse_address(true).map_err(into_bind)?;
    // Unix needs SO_REUSEPORT as well before two processes can share the
    // discovery port; SO_REUSEADDR alone only does that on Windows.
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(into_bind)?;
    socket.set_broadcast(true).map_err(into_bind)?;
    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .map_err(into_bind)?;
    let addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into()).map_err(into_bind)?;
    Ok(socket.into())
}

fn broadcast_loop(
    socket: UdpSocket,
    discovery_port: u16,
    announcement: LocalAnnouncement,
    running: Arc<AtomicBool>,
) {
    let broadcast_addr =
        SocketAddr::from(SocketAddrV4::new(Ipv4Addr::BROADCAST, discovery_port));
    let packet = PresencePacket {
        session_port: announcement.session_port,
        screen_width: announcement.screen_width,
        screen_height: announcement.screen_height,
        is_primary: false,
        name: announcement.name.clone(),
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut buf = [0u8; 512];
    let mut last_broadcast: Option<std::time::Instant> = None;
    let interval = Duration::from_millis(DEFAULT_BROADCAST_INTERVAL_MS);

    while running.load(Ordering::Relaxed) {
        if last_broadcast.map_or(true, |t| t.elapsed() >= interval) {
            if let Err(e) = socket.send_to(&encode_presence(&packet), broadcast_addr) {
                debug!("presence broadcast failed: {e}");
            }
            last_broadcast = Some(std::time::Instant::now());
        }

        match socket.recv_from(&mut buf) {
            Ok((len, src)) => {
                if let Some(peer) = parse_presence(&buf[..len]) {
                    if peer.name != announcement.name && seen.insert(peer.name.clone()) {
                        info!(
                            "saw {} {} at {}",
                            if peer.is_primary { "primary" } else { "peer" },
                            peer.name,
                            src.ip()
                        );
                    }
                }
            }
            Err(e) if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) => {}
            Err(e) => warn!("discovery recv error: {e}"),
        }
    }

    info!("presence broadcaster stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
