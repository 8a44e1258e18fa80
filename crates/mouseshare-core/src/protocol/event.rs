//! Session protocol event types.
//!
//! Every value that crosses the session connection is one of these events.
//! Wire discriminants and payload layouts are fixed; see [`super::codec`]
//! for the framing rules.

use serde::{Deserialize, Serialize};

/// Wire discriminant for each frame type.
///
/// Type `6` is reserved for clipboard transfer and is never produced or
/// consumed here; decoders skip it like any other unrecognised type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    MouseMove = 1,
    MouseButton = 2,
    MouseScroll = 3,
    KeyPress = 4,
    KeyRelease = 5,
    Keepalive = 7,
    ScreenInfo = 8,
    SwitchScreen = 9,
}

impl TryFrom<u8> for EventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            1 => Ok(EventType::MouseMove),
            2 => Ok(EventType::MouseButton),
            3 => Ok(EventType::MouseScroll),
            4 => Ok(EventType::KeyPress),
            5 => Ok(EventType::KeyRelease),
            7 => Ok(EventType::Keepalive),
            8 => Ok(EventType::ScreenInfo),
            9 => Ok(EventType::SwitchScreen),
            _ => Err(()),
        }
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouseButton {
    Left = 1,
    Middle = 2,
    Right = 3,
    X1 = 4,
    X2 = 5,
}

impl TryFrom<u8> for MouseButton {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            1 => Ok(MouseButton::Left),
            2 => Ok(MouseButton::Middle),
            3 => Ok(MouseButton::Right),
            4 => Ok(MouseButton::X1),
            5 => Ok(MouseButton::X2),
            _ => Err(()),
        }
    }
}

/// A screen edge, as carried in `SwitchScreen` frames and used by the
/// focus controllers on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Edge {
    Left = 1,
    Right = 2,
    Top = 3,
    Bottom = 4,
}

impl Edge {
    /// The mirrored edge: a cursor leaving the sender's RIGHT edge enters
    /// the receiver's LEFT edge, and so on.
    pub fn opposite(self) -> Edge {
        match self {
            Edge::Left => Edge::Right,
            Edge::Right => Edge::Left,
            Edge::Top => Edge::Bottom,
            Edge::Bottom => Edge::Top,
        }
    }

    /// Lowercase name for CLI parsing and log output.
    pub fn name(self) -> &'static str {
        match self {
            Edge::Left => "left",
            Edge::Right => "right",
            Edge::Top => "top",
            Edge::Bottom => "bottom",
        }
    }
}

impl TryFrom<u8> for Edge {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            1 => Ok(Edge::Left),
            2 => Ok(Edge::Right),
            3 => Ok(Edge::Top),
            4 => Ok(Edge::Bottom),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for Edge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Edge::Left),
            "right" => Ok(Edge::Right),
            "top" => Ok(Edge::Top),
            "bottom" => Ok(Edge::Bottom),
            other => Err(format!("unknown edge: {other}")),
        }
    }
}

/// One session protocol event.
///
/// `Key` carries the platform virtual keycode plus the opaque scan code and
/// flags verbatim; the injector on the receiving side needs the flags intact
/// to reconstruct extended-key semantics (arrow keys, numpad Enter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Absolute sender cursor position plus the delta since the previous move.
    MouseMove { x: i32, y: i32, dx: i32, dy: i32 },
    MouseButton { button: MouseButton, pressed: bool },
    /// Wheel notches; negative is down/left.
    MouseScroll { dx: i32, dy: i32 },
    Key { vk: u32, scan: u32, flags: u32, pressed: bool },
    /// Sender's screen dimensions in pixels.
    ScreenInfo { width: i32, height: i32 },
    /// Receiver entry edge plus the coordinate along it, in sender pixels.
    SwitchScreen { edge: Edge, position: i32 },
    Keepalive,
}

impl Event {
    /// The wire discriminant for this event.
    pub fn event_type(&self) -> EventType {
        match self {
            Event::MouseMove { .. } => EventType::MouseMove,
            Event::MouseButton { .. } => EventType::MouseButton,
            Event::MouseScroll { .. } => EventType::MouseScroll,
            Event::Key { pressed: true, .. } => EventType::KeyPress,
            Event::Key { pressed: false, .. } => EventType::KeyRelease,
            Event::ScreenInfo { .. } => EventType::ScreenInfo,
            Event::SwitchScreen { .. } => EventType::SwitchScreen,
            Event::Keepalive => EventType::Keepalive,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
