//! LAN discovery packet format.
//!
//! Every host broadcasts a fixed-layout 80-byte presence packet on the
//! discovery UDP port every few seconds:
//!
//! ```text
//! magic[4] = "MSHR"   type:u8   port:u16
//! screen_w:i32        screen_h:i32
//! is_primary:u8       name[64] (NUL-terminated UTF-8)
//! ```
//!
//! Integers are little-endian. Receivers drop anything without the magic
//! or with an unknown packet type, and ignore their own packets by name.

/// The four-byte packet magic.
pub const DISCOVERY_MAGIC: [u8; 4] = *b"MSHR";

/// Fixed size of every presence packet.
pub const PRESENCE_PACKET_SIZE: usize = 80;

/// Packet type byte for a presence announcement.
pub const PACKET_TYPE_ANNOUNCE: u8 = 1;

/// Longest name that fits the NUL-terminated 64-byte field.
pub const MAX_NAME_LEN: usize = 63;

/// Default TCP session port.
pub const DEFAULT_SESSION_PORT: u16 = 24800;

/// Default UDP discovery port.
pub const DEFAULT_DISCOVERY_PORT: u16 = 24801;

/// A parsed presence announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresencePacket {
    /// TCP session port the sender accepts (or connects) on.
    pub session_port: u16,
    pub screen_width: i32,
    pub screen_height: i32,
    pub is_primary: bool,
    /// Sender's host name; peers are identified by it.
    pub name: String,
}

/// Encodes a presence packet into its fixed wire layout.
///
/// Names longer than [`MAX_NAME_LEN`] bytes are truncated on a character
/// boundary so the field stays valid UTF-8.
pub fn encode_presence(packet: &PresencePacket) -> [u8; PRESENCE_PACKET_SIZE] {
    let mut buf = [0u8; PRESENCE_PACKET_SIZE];
    buf[0..4].copy_from_slice(&DISCOVERY_MAGIC);
    buf[4] = PACKET_TYPE_ANNOUNCE;
    buf[5..7].copy_from_slice(&packet.session_port.to_le_bytes());
    buf[7..11].copy_from_slice(&packet.screen_width.to_le_bytes());
    buf[11..15].copy_from_slice(&packet.screen_height.to_le_bytes());
    buf[15] = u8::from(packet.is_primary);

    let name = truncate_name(&packet.name);
    buf[16..16 + name.len()].copy_from_slice(name.as_bytes());
    // Remaining name bytes are already NUL.
    buf
}

/// Parses a presence packet, returning `None` for anything that is not a
/// well-formed announcement (too short, bad magic, unknown type, name that
/// is not UTF-8).
pub fn parse_presence(datagram: &[u8]) -> Option<PresencePacket> {
    if datagram.len() < PRESENCE_PACKET_SIZE {
        return None;
    }
    if datagram[0..4] != DISCOVERY_MAGIC {
        return None;
    }
    if datagram[4] != PACKET_TYPE_ANNOUNCE {
        return None;
    }

    let session_port = u16::from_le_bytes([datagram[5], datagram[6]]);
    let screen_width = i32::from_le_bytes([datagram[7], datagram[8], datagram[9], datagram[10]]);
    let screen_height = i32::from_le_bytes([datagram[11], datagram[12], datagram[13], datagram[14]]);
    let is_primary = datagram[15] != 0;

    let name_field = &datagram[16..16 + 64];
    let name_end = name_field.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);
    let name = std::str::from_utf8(&name_field[..name_end]).ok()?.to_string();

    Some(PresencePacket {
        session_port,
        screen_width,
        screen_height,
        is_primary,
        name,
    })
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
