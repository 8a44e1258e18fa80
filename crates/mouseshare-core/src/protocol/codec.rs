//! Binary codec for session protocol frames.
//!
//! Wire format:
//! ```text
//! [version:u16][type:u8][timestamp:u32][payload_size:u16][payload:N]
//! ```
//! Total header size: 9 bytes. All multi-byte integers are little-endian.
//! The timestamp is sender-local monotonic milliseconds and is diagnostic
//! only. Every payload has a fixed footprint per event type; `payload_size`
//! must match it exactly (`Keepalive` carries none).
//!
//! Unrecognised event types are skipped, not rejected, so a newer sender can
//! talk to an older receiver as long as the header stays parseable.

use thiserror::Error;

use crate::protocol::event::{Edge, Event, EventType, MouseButton};

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 9;

/// Upper bound on `payload_size`; the field itself is a `u16`, so this is
/// the largest value it can carry.
pub const MAX_PAYLOAD_SIZE: usize = 65_535;

/// Errors that can occur while decoding a frame.
///
/// Any of these means the byte stream can no longer be trusted; callers
/// close the session rather than attempt to resynchronise.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes available than the header (or declared payload) needs.
    #[error("truncated frame: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The version field does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    /// `payload_size` does not match the fixed footprint for the type.
    #[error("wrong payload size for {event_type:?}: declared {declared}, expected {expected}")]
    WrongPayloadSize {
        event_type: EventType,
        declared: usize,
        expected: usize,
    },

    /// A payload field held a value outside its enumeration.
    #[error("malformed payload: {0}")]
    MalformedPayload(&'static str),
}

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u16,
    pub event_type: u8,
    pub timestamp_ms: u32,
    pub payload_size: u16,
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Event(Event),
    /// A structurally valid frame of a type this build does not know.
    /// The caller logs it and moves on.
    Unknown { event_type: u8 },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes an event into a single wire frame.
pub fn encode_event(event: &Event, timestamp_ms: u32) -> Vec<u8> {
    let payload = encode_payload(event);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());

    buf.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    buf.push(event.event_type() as u8);
    buf.extend_from_slice(&timestamp_ms.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    buf.extend_from_slice(&payload);
    buf
}

fn encode_payload(event: &Event) -> Vec<u8> {
    let mut buf = Vec::new();
    match event {
        Event::MouseMove { x, y, dx, dy } => {
            buf.extend_from_slice(&x.to_le_bytes());
            buf.extend_from_slice(&y.to_le_bytes());
            buf.extend_from_slice(&dx.to_le_bytes());
            buf.extend_from_slice(&dy.to_le_bytes());
        }
        Event::MouseButton { button, pressed } => {
            buf.push(*button as u8);
            buf.push(u8::from(*pressed));
        }
        Event::MouseScroll { dx, dy } => {
            buf.extend_from_slice(&dx.to_le_bytes());
            buf.extend_from_slice(&dy.to_le_bytes());
        }
        // `pressed` travels in the frame type (KeyPress vs KeyRelease),
        // not in the payload.
        Event::Key { vk, scan, flags, .. } => {
            buf.extend_from_slice(&vk.to_le_bytes());
            buf.extend_from_slice(&scan.to_le_bytes());
            buf.extend_from_slice(&flags.to_le_bytes());
        }
        Event::ScreenInfo { width, height } => {
            buf.extend_from_slice(&width.to_le_bytes());
            buf.extend_from_slice(&height.to_le_bytes());
        }
        Event::SwitchScreen { edge, position } => {
            buf.push(*edge as u8);
            buf.extend_from_slice(&position.to_le_bytes());
        }
        Event::Keepalive => {}
    }
    buf
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Parses the 9-byte header from the front of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError::Truncated`] when fewer than [`HEADER_SIZE`]
/// bytes are available, and [`ProtocolError::UnsupportedVersion`] for any
/// version other than [`PROTOCOL_VERSION`].
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::Truncated {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = u16::from_le_bytes([bytes[0], bytes[1]]);
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    Ok(FrameHeader {
        version,
        event_type: bytes[2],
        timestamp_ms: u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
        payload_size: u16::from_le_bytes([bytes[7], bytes[8]]),
    })
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the decoded value and the total number of bytes consumed
/// (header + payload), so the caller can advance its read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] for a bad version, a truncated or wrong-sized
/// payload, or an out-of-range enumeration value inside the payload.
pub fn decode_event(bytes: &[u8]) -> Result<(Decoded, usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let payload_size = header.payload_size as usize;
    let total = HEADER_SIZE + payload_size;

    if bytes.len() < total {
        return Err(ProtocolError::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }
    let payload = &bytes[HEADER_SIZE..total];

    let event_type = match EventType::try_from(header.event_type) {
        Ok(ty) => ty,
        // Forward compatibility: consume and skip the whole frame.
        Err(()) => {
            return Ok((
                Decoded::Unknown {
                    event_type: header.event_type,
                },
                total,
            ));
        }
    };

    let expected = payload_footprint(event_type);
    if payload_size != expected {
        return Err(ProtocolError::WrongPayloadSize {
            event_type,
            declared: payload_size,
            expected,
        });
    }

    let event = decode_payload(event_type, payload)?;
    Ok((Decoded::Event(event), total))
}

/// Fixed payload size in bytes for each event type.
fn payload_footprint(event_type: EventType) -> usize {
    match event_type {
        EventType::MouseMove => 16,
        EventType::MouseButton => 2,
        EventType::MouseScroll => 8,
        EventType::KeyPress | EventType::KeyRelease => 12,
        EventType::Keepalive => 0,
        EventType::ScreenInfo => 8,
        EventType::SwitchScreen => 5,
    }
}

fn decode_payload(event_type: EventType, p: &[u8]) -> Result<Event, ProtocolError> {
    let event = match event_type {
        EventType::MouseMove => Event::MouseMove {
            x: read_i32(p, 0),
            y: read_i32(p, 4),
            dx: read_i32(p, 8),
            dy: read_i32(p, 12),
        },
        EventType::MouseButton => Event::MouseButton {
            button: MouseButton::try_from(p[0])
                .map_err(|()| ProtocolError::MalformedPayload("unknown mouse button"))?,
            pressed: p[1] != 0,
        },
        EventType::MouseScroll => Event::MouseScroll {
            dx: read_i32(p, 0),
            dy: read_i32(p, 4),
        },
        EventType::KeyPress | EventType::KeyRelease => Event::Key {
            vk: read_u32(p, 0),
            scan: read_u32(p, 4),
            flags: read_u32(p, 8),
            pressed: event_type == EventType::KeyPress,
        },
        EventType::Keepalive => Event::Keepalive,
        EventType::ScreenInfo => Event::ScreenInfo {
            width: read_i32(p, 0),
            height: read_i32(p, 4),
        },
        EventType::SwitchScreen => Event::SwitchScreen {
            edge: Edge::try_from(p[0])
                .map_err(|()| ProtocolError::MalformedPayload("unknown screen edge"))?,
            position: read_i32(p, 1),
        },
    };
    Ok(event)
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(event: &Event) -> Event {
        let encoded = encode_event(event, 1234);
        let (decoded, consumed) = decode_event(&encoded).expect("decode failed");
        assert_eq!(consumed, encoded.len(), "must consume the whole frame");
        match decoded {
            Decoded::Event(e) => e,
            Decoded::Unknown { event_type } => panic!("unexpected unknown type {event_type}"),
        }
    }

    // ── Round trips ───────────────────────────────────────────────────────────

    #[test]
    fn test_mouse_move_round_trip() {
        let event = Event::MouseMove { x: 1918, y: 500, dx: -5, dy: 12 };
        assert_eq!(round_trip(&event), event);
    }

    #[test]
    fn test_mouse_button_round_trip_for_all_buttons() {
        for button in [
            MouseButton::Left,
            MouseButton::Middle,
            MouseButton::Right,
            MouseButton::X1,
            MouseButton::X2,
        ] {
            for pressed in [true, false] {
                let event = Event::MouseButton { button, pressed };
                assert_eq!(round_trip(&event), event);
            }
        }
    }

    #[test]
    fn test_mouse_scroll_round_trip_with_negative_notches() {
        let event = Event::MouseScroll { dx: -1, dy: -3 };
        assert_eq!(round_trip(&event), event);
    }

    #[test]
    fn test_key_round_trip_preserves_scan_and_flags_verbatim() {
        let event = Event::Key {
            vk: 0x26, // up arrow
            scan: 0x48,
            flags: 0x01, // extended-key bit
            pressed: true,
        };
        assert_eq!(round_trip(&event), event);
    }

    #[test]
    fn test_key_release_round_trip() {
        let event = Event::Key { vk: 0x41, scan: 0x1E, flags: 0, pressed: false };
        assert_eq!(round_trip(&event), event);
    }

    #[test]
    fn test_screen_info_round_trip() {
        let event = Event::ScreenInfo { width: 2560, height: 1440 };
        assert_eq!(round_trip(&event), event);
    }

    #[test]
    fn test_switch_screen_round_trip_for_all_edges() {
        for edge in [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom] {
            let event = Event::SwitchScreen { edge, position: 500 };
            assert_eq!(round_trip(&event), event);
        }
    }

    #[test]
    fn test_keepalive_round_trip_is_header_only() {
        let encoded = encode_event(&Event::Keepalive, 0);
        assert_eq!(encoded.len(), HEADER_SIZE);
        assert_eq!(round_trip(&Event::Keepalive), Event::Keepalive);
    }

    // ── Header layout ─────────────────────────────────────────────────────────

    #[test]
    fn test_header_fields_are_little_endian_packed() {
        let encoded = encode_event(&Event::Keepalive, 0x0102_0304);
        assert_eq!(u16::from_le_bytes([encoded[0], encoded[1]]), PROTOCOL_VERSION);
        assert_eq!(encoded[2], EventType::Keepalive as u8);
        assert_eq!(
            u32::from_le_bytes([encoded[3], encoded[4], encoded[5], encoded[6]]),
            0x0102_0304
        );
        assert_eq!(u16::from_le_bytes([encoded[7], encoded[8]]), 0);
    }

    #[test]
    fn test_decode_header_reports_declared_payload_size() {
        let encoded = encode_event(&Event::MouseMove { x: 0, y: 0, dx: 0, dy: 0 }, 7);
        let header = decode_header(&encoded).unwrap();
        assert_eq!(header.payload_size, 16);
        assert_eq!(header.timestamp_ms, 7);
    }

    // ── Robustness ────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_input_is_truncated() {
        assert_eq!(
            decode_event(&[]),
            Err(ProtocolError::Truncated { needed: HEADER_SIZE, available: 0 })
        );
    }

    #[test]
    fn test_decode_partial_header_is_truncated() {
        let encoded = encode_event(&Event::Keepalive, 0);
        let result = decode_event(&encoded[..4]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let mut encoded = encode_event(&Event::Keepalive, 0);
        encoded[0] = 2;
        encoded[1] = 0;
        assert_eq!(decode_event(&encoded), Err(ProtocolError::UnsupportedVersion(2)));
    }

    #[test]
    fn test_decode_rejects_payload_shorter_than_declared() {
        let encoded = encode_event(&Event::MouseMove { x: 1, y: 2, dx: 3, dy: 4 }, 0);
        // Drop the last payload byte.
        let result = decode_event(&encoded[..encoded.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_decode_rejects_wrong_footprint_for_type() {
        // A Keepalive frame claiming a 4-byte payload.
        let mut frame = encode_event(&Event::Keepalive, 0);
        frame[7..9].copy_from_slice(&4u16.to_le_bytes());
        frame.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(
            decode_event(&frame),
            Err(ProtocolError::WrongPayloadSize {
                event_type: EventType::Keepalive,
                declared: 4,
                expected: 0,
            })
        );
    }

    #[test]
    fn test_decode_rejects_unknown_mouse_button_value() {
        let mut frame = encode_event(
            &Event::MouseButton { button: MouseButton::Left, pressed: true },
            0,
        );
        frame[HEADER_SIZE] = 9;
        assert_eq!(
            decode_event(&frame),
            Err(ProtocolError::MalformedPayload("unknown mouse button"))
        );
    }

    #[test]
    fn test_decode_rejects_unknown_edge_value() {
        let mut frame = encode_event(&Event::SwitchScreen { edge: Edge::Left, position: 0 }, 0);
        frame[HEADER_SIZE] = 0;
        assert_eq!(
            decode_event(&frame),
            Err(ProtocolError::MalformedPayload("unknown screen edge"))
        );
    }

    #[test]
    fn test_decode_skips_unknown_event_type_and_consumes_frame() {
        // Hand-build a version-1 frame of the reserved clipboard type (6)
        // with a 3-byte payload.
        let mut frame = Vec::new();
        frame.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        frame.push(6);
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&3u16.to_le_bytes());
        frame.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let (decoded, consumed) = decode_event(&frame).unwrap();
        assert_eq!(decoded, Decoded::Unknown { event_type: 6 });
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn test_decode_unknown_type_with_truncated_payload_is_truncated() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        frame.push(200);
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&100u16.to_le_bytes());
        // No payload bytes follow.
        assert!(matches!(decode_event(&frame), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_two_frames_back_to_back_decode_sequentially() {
        let mut stream = encode_event(&Event::MouseScroll { dx: 0, dy: -1 }, 1);
        stream.extend(encode_event(&Event::Keepalive, 2));

        let (first, used) = decode_event(&stream).unwrap();
        assert_eq!(first, Decoded::Event(Event::MouseScroll { dx: 0, dy: -1 }));
        let (second, _) = decode_event(&stream[used..]).unwrap();
        assert_eq!(second, Decoded::Event(Event::Keepalive));
    }
}
