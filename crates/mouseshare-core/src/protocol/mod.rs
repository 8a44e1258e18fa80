//! Wire protocol: session frames and discovery packets.
//!
//! The session protocol frames one input event per TCP write behind a fixed
//! 9-byte header (see [`codec`]). The discovery protocol is a single
//! fixed-layout UDP broadcast packet (see [`discovery`]).

pub mod codec;
pub mod discovery;
pub mod event;

pub use codec::{decode_event, encode_event, Decoded, FrameHeader, ProtocolError};
pub use event::{Edge, Event, EventType, MouseButton};
