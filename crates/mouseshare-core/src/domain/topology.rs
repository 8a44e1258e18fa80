//! Live peer topology with virtual-layout arrangement.
//!
//! Discovery feeds this map; the primary's focus controller reads it to
//! decide whether an edge hit should transfer focus. Every peer's screen is
//! a rectangle in a shared virtual-pixel space: `layout_x/layout_y` place
//! its top-left corner, with the local screen starting at (0, 0).
//!
//! Peers are identified by name. Two hosts announcing the same name will
//! shadow each other (last packet wins); the fixed discovery packet has no
//! room for a stable instance id, so the hazard is documented rather than
//! solved here.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use crate::protocol::event::Edge;

/// A remote peer expires this long after its last packet.
pub const DEFAULT_PEER_EXPIRY_MS: u64 = 10_000;

/// One discovered host and its place in the virtual layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Host name; the identity key.
    pub name: String,
    pub addr: IpAddr,
    /// TCP session port the peer uses.
    pub port: u16,
    pub screen_width: i32,
    pub screen_height: i32,
    pub is_primary: bool,
    /// Monotonic milliseconds of the most recent packet.
    pub last_seen_ms: u64,
    /// Whether a session to this peer is currently open.
    pub is_connected: bool,
    /// Top-left corner in virtual-pixel space.
    pub layout_x: i32,
    pub layout_y: i32,
}

impl PeerRecord {
    /// A fresh record for the local host, anchored at the layout origin.
    pub fn local(name: impl Into<String>, port: u16, width: i32, height: i32, is_primary: bool) -> Self {
        Self {
            name: name.into(),
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            screen_width: width,
            screen_height: height,
            is_primary,
            last_seen_ms: 0,
            is_connected: false,
            layout_x: 0,
            layout_y: 0,
        }
    }

    fn right(&self) -> i32 {
        self.layout_x + self.screen_width
    }

    fn bottom(&self) -> i32 {
        self.layout_y + self.screen_height
    }
}

/// The mapping `name -> PeerRecord`.
///
/// The local peer is always present and never expires. Iteration order is
/// by name, which keeps the same-side tie-break stable across runs.
#[derive(Debug)]
pub struct Topology {
    local_name: String,
    peers: BTreeMap<String, PeerRecord>,
}

impl Topology {
    pub fn new(local: PeerRecord) -> Self {
        let local_name = local.name.clone();
        let mut peers = BTreeMap::new();
        peers.insert(local_name.clone(), local);
        Self { local_name, peers }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn local(&self) -> &PeerRecord {
        &self.peers[&self.local_name]
    }

    pub fn get(&self, name: &str) -> Option<&PeerRecord> {
        self.peers.get(name)
    }

    /// All peers, local included, in name order.
    pub fn peers(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Records a presence announcement.
    ///
    /// Self-packets (matching the local name) are dropped. A known peer has
    /// its address, dimensions, role, and `last_seen` refreshed while its
    /// arrangement and connection state are kept. A new peer is placed
    /// flush right of the rightmost existing screen, top-aligned; the
    /// arrangement UI may move it afterwards.
    pub fn observe(
        &mut self,
        name: &str,
        addr: IpAddr,
        port: u16,
        screen_width: i32,
        screen_height: i32,
        is_primary: bool,
        now_ms: u64,
    ) -> bool {
        if name == self.local_name {
            return false;
        }

        if let Some(existing) = self.peers.get_mut(name) {
            existing.addr = addr;
            existing.port = port;
            existing.screen_width = screen_width;
            existing.screen_height = screen_height;
            existing.is_primary = is_primary;
            existing.last_seen_ms = now_ms;
            return false;
        }

        let rightmost = self.peers.values().map(PeerRecord::right).max().unwrap_or(0);
        self.peers.insert(
            name.to_string(),
            PeerRecord {
                name: name.to_string(),
                addr,
                port,
                screen_width,
                screen_height,
                is_primary,
                last_seen_ms: now_ms,
                is_connected: false,
                layout_x: rightmost,
                layout_y: 0,
            },
        );
        true
    }

    /// Removes remote peers not heard from within `expiry_ms`. The local
    /// peer is exempt. Returns the names that were dropped.
    pub fn reap_expired(&mut self, now_ms: u64, expiry_ms: u64) -> Vec<String> {
        let local = self.local_name.clone();
        let stale: Vec<String> = self
            .peers
            .values()
            .filter(|p| p.name != local && now_ms.saturating_sub(p.last_seen_ms) > expiry_ms)
            .map(|p| p.name.clone())
            .collect();
        for name in &stale {
            self.peers.remove(name);
        }
        stale
    }

    /// Marks whether a session to `name` is open. Returns `false` for an
    /// unknown peer.
    pub fn set_connected(&mut self, name: &str, connected: bool) -> bool {
        match self.peers.get_mut(name) {
            Some(peer) => {
                peer.is_connected = connected;
                true
            }
            None => false,
        }
    }

    /// Repositions a peer's screen in the virtual layout (the arrangement
    /// UI's surface). Overlap prevention is the UI's responsibility.
    pub fn set_layout(&mut self, name: &str, layout_x: i32, layout_y: i32) -> bool {
        match self.peers.get_mut(name) {
            Some(peer) => {
                peer.layout_x = layout_x;
                peer.layout_y = layout_y;
                true
            }
            None => false,
        }
    }

    /// Finds the connected peer whose screen is flush against the local
    /// screen on `edge` and whose extent contains the cursor's
    /// perpendicular coordinate (`perp` is the cursor's local `y` for
    /// LEFT/RIGHT, local `x` for TOP/BOTTOM).
    ///
    /// Flushness is evaluated on the peers' full virtual-layout offsets,
    /// so a local screen moved off the origin still resolves correctly.
    /// When several peers qualify, the first in name order wins.
    pub fn connected_neighbor(&self, edge: Edge, perp: i32) -> Option<&PeerRecord> {
        let local = self.local();

        self.peers.values().find(|peer| {
            if peer.name == self.local_name || !peer.is_connected {
                return false;
            }
            match edge {
                Edge::Right => {
                    peer.layout_x == local.right()
                        && contains(peer.layout_y, peer.screen_height, local.layout_y + perp)
                }
                Edge::Left => {
                    peer.right() == local.layout_x
                        && contains(peer.layout_y, peer.screen_height, local.layout_y + perp)
                }
                Edge::Bottom => {
                    peer.layout_y == local.bottom()
                        && contains(peer.layout_x, peer.screen_width, local.layout_x + perp)
                }
                Edge::Top => {
                    peer.bottom() == local.layout_y
                        && contains(peer.layout_x, peer.screen_width, local.layout_x + perp)
                }
            }
        })
    }
}

fn contains(start: i32, length: i32, coord: i32) -> bool {
    start <= coord && coord < start + length
}

// ── Tests ─────────────────────────────────────────────────────────────────────
