//! UDP broadcast discovery, primary side.
//!
//! A single UDP socket bound to the discovery port with SO_BROADCAST and
//! SO_REUSEADDR. Every broadcast interval the local peer announces itself
//! to the LAN; every valid foreign announcement is upserted into the
//! topology, and peers that have gone quiet are reaped.
//!
//! The loop runs as a blocking thread with a short read timeout so it can
//! observe the shutdown flag; the topology mutex is held only for the
//! duration of one upsert or reap, never across socket I/O.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use mouseshare_core::clock;
use mouseshare_core::protocol::discovery::{
    encode_presence, parse_presence, PresencePacket, PRESENCE_PACKET_SIZE,
};
use mouseshare_core::Topology;

/// How often presence is broadcast.
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 3_000;

/// Error type for the discovery service.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The UDP socket could not be created or bound. Fatal: without it the
    /// topology never learns about peers.
    #[error("failed to bind discovery socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Discovery timing knobs.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub discovery_port: u16,
    pub broadcast_interval_ms: u64,
    pub peer_expiry_ms: u64,
}

/// Binds the discovery socket and spawns the broadcast/receive thread.
///
/// # Errors
///
/// Returns [`DiscoveryError::Bind`] if the socket cannot be set up.
pub fn start_discovery(
    config: DiscoveryConfig,
    topology: Arc<Mutex<Topology>>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, DiscoveryError> {
    let socket = bind_broadcast_socket(config.discovery_port)?;
    info!("discovery on udp 0.0.0.0:{}", config.discovery_port);

    let handle = std::thread::Builder::new()
        .name("ms-discovery".to_string())
        .spawn(move || discovery_loop(socket, config, topology, running))
        .expect("failed to spawn discovery thread");
    Ok(handle)
}

/// Builds the shared broadcast socket: SO_REUSEADDR so primary and
/// secondary can coexist on one machine, SO_BROADCAST for the announce
/// sends, and a short read timeout so the loop stays responsive.
pub(crate) fn bind_broadcast_socket(port: u16) -> Result<UdpSocket, DiscoveryError> {
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

fn discovery_loop(
    socket: UdpSocket,
    config: DiscoveryConfig,
    topology: Arc<Mutex<Topology>>,
    running: Arc<AtomicBool>,
) {
    let broadcast_addr = SocketAddr::from(SocketAddrV4::new(
        Ipv4Addr::BROADCAST,
        config.discovery_port,
    ));
    let mut buf = [0u8; 512];
    let mut last_broadcast_ms: Option<u64> = None;

    while running.load(Ordering::Relaxed) {
        let now = clock::now_ms();

        if last_broadcast_ms.map_or(true, |t| now - t >= config.broadcast_interval_ms) {
            broadcast_presence(&socket, broadcast_addr, &topology);
            last_broadcast_ms = Some(now);
        }

        match socket.recv_from(&mut buf) {
            Ok((len, src)) => handle_datagram(&buf[..len], src, &topology),
            Err(e) if is_timeout(&e) => {}
            Err(e) => warn!("discovery recv error: {e}"),
        }

        let reaped = {
            let mut topo = topology.lock().expect("topology lock poisoned");
            topo.reap_expired(clock::now_ms(), config.peer_expiry_ms)
        };
        for name in reaped {
            info!("peer {name} expired from topology");
        }
    }

    info!("discovery stopped");
}

fn broadcast_presence(
    socket: &UdpSocket,
    broadcast_addr: SocketAddr,
    topology: &Arc<Mutex<Topology>>,
) {
    let packet = {
        let topo = topology.lock().expect("topology lock poisoned");
        let local = topo.local();
        PresencePacket {
            session_port: local.port,
            screen_width: local.screen_width,
            screen_height: local.screen_height,
            is_primary: local.is_primary,
            name: local.name.clone(),
        }
    };
    if let Err(e) = socket.send_to(&encode_presence(&packet), broadcast_addr) {
        debug!("presence broadcast failed: {e}");
    }
}

fn handle_datagram(datagram: &[u8], src: SocketAddr, topology: &Arc<Mutex<Topology>>) {
    if datagram.len() < PRESENCE_PACKET_SIZE {
        return;
    }
    let Some(packet) = parse_presence(datagram) else {
        debug!("dropping malformed discovery datagram from {src}");
        return;
    };

    let mut topo = topology.lock().expect("topology lock poisoned");
    let inserted = topo.observe(
        &packet.name,
        src.ip(),
        packet.session_port,
        packet.screen_width,
        packet.screen_height,
        packet.is_primary,
        clock::now_ms(),
    );
    if inserted {
        info!(
            "discovered peer {} at {} ({}x{})",
            packet.name,
            src.ip(),
            packet.screen_width,
            packet.screen_height
        );
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
