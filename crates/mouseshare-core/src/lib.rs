//! # mouseshare-core
//!
//! Shared library for MouseShare containing the wire protocol codec, the
//! LAN discovery packet format, and the screen-topology domain logic.
//!
//! This crate is used by both the primary and secondary applications. It has
//! zero dependencies on OS input APIs, UI frameworks, or network sockets, so
//! every routing and framing decision is unit-testable on any platform.
//!
//! - **`protocol`** – how bytes travel over the wire: input events framed
//!   behind a fixed 9-byte little-endian header, plus the UDP presence
//!   packet used for discovery.
//! - **`domain`** – pure policy: the live peer topology with its
//!   virtual-layout arrangement, screen-edge geometry, and the
//!   emergency-key rules the interceptor must never violate.
//! - **`clock`** – process-monotonic millisecond timestamps.

pub mod clock;
pub mod domain;
pub mod protocol;

pub use domain::geometry::{clamp_to_screen, edge_hit, scale_edge_position};
pub use domain::topology::{PeerRecord, Topology, DEFAULT_PEER_EXPIRY_MS};
pub use protocol::codec::{decode_event, encode_event, Decoded, ProtocolError};
pub use protocol::event::{Edge, Event, EventType, MouseButton};
