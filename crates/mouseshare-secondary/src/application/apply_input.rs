//! ReplayController: applies streamed input on the secondary.
//!
//! The secondary side of the edge-crossing state machine. `SwitchScreen`
//! activates replay and places the cursor just inside the entry edge; from
//! then on the primary streams *deltas*, so the controller maintains its
//! own cursor position, clamped to the local screen. When the cursor is
//! driven back onto the entry edge, replay stops and control conceptually
//! returns to the primary (which is still sending; those frames are
//! dropped until the next switch).
//!
//! Buttons, scrolls, and keys are applied only while active; arriving
//! while idle they are stale, because the user is on the primary.

use std::sync::Arc;

use tracing::{debug, info};

use mouseshare_core::domain::geometry::{clamp_to_screen, scale_edge_position};
use mouseshare_core::protocol::event::{Edge, Event};

use crate::infrastructure::input_injection::{InjectionError, InputInjector};

/// Whether streamed input is currently being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Active,
}

/// The secondary-side focus controller.
pub struct ReplayController {
    state: ReplayState,
    /// Edge the cursor entered through; crossing it again deactivates.
    entry_edge: Option<Edge>,
    cursor_x: i32,
    cursor_y: i32,
    screen_width: i32,
    screen_height: i32,
    /// Sender dimensions for scaling entry positions; updated by
    /// `ScreenInfo`, assumed 1920x1080 until one arrives.
    sender_width: i32,
    sender_height: i32,
    injector: Arc<dyn InputInjector>,
}

impl ReplayController {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        let (screen_width, screen_height) = injector.screen_size();
        Self {
            state: ReplayState::Idle,
            entry_edge: None,
            cursor_x: screen_width / 2,
            cursor_y: screen_height / 2,
            screen_width,
            screen_height,
            sender_width: 1920,
            sender_height: 1080,
            injector,
        }
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn cursor(&self) -> (i32, i32) {
        (self.cursor_x, self.cursor_y)
    }

    /// Handles one decoded frame from the session.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] when the OS refuses a synthetic event;
    /// the caller logs it and keeps going.
    pub fn handle_event(&mut self, event: Event) -> Result<(), InjectionError> {
        match event {
            Event::SwitchScreen { edge, position } => self.activate(edge, position),
            Event::MouseMove { dx, dy, .. } => self.apply_move(dx, dy),
            Event::MouseButton { button, pressed } => {
                if self.state == ReplayState::Active {
                    self.injector.button(button, pressed)?;
                }
                Ok(())
            }
            Event::MouseScroll { dx, dy } => {
                if self.state == ReplayState::Active {
                    self.injector.scroll(dx, dy)?;
                }
                Ok(())
            }
            Event::Key { vk, scan, flags, pressed } => {
                if self.state == ReplayState::Active {
                    self.injector.key(vk, scan, flags, pressed)?;
                }
                Ok(())
            }
            Event::ScreenInfo { width, height } => {
                debug!("primary screen is {width}x{height}");
                self.sender_width = width;
                self.sender_height = height;
                Ok(())
            }
            // Liveness is the transport's concern.
            Event::Keepalive => Ok(()),
        }
    }

    /// The session dropped; any in-flight activation is void.
    pub fn reset(&mut self) {
        self.state = ReplayState::Idle;
        self.entry_edge = None;
    }

    /// Places the cursor just inside `edge`, scaling the along-edge
    /// coordinate from sender pixels to local pixels.
    fn activate(&mut self, edge: Edge, position: i32) -> Result<(), InjectionError> {
        let (x, y) = match edge {
            Edge::Left => (
                0,
                scale_edge_position(position, self.sender_height, self.screen_height),
            ),
            Edge::Right => (
                self.screen_width - 1,
                scale_edge_position(position, self.sender_height, self.screen_height),
            ),
            Edge::Top => (
                scale_edge_position(position, self.sender_width, self.screen_width),
                0,
            ),
            Edge::Bottom => (
                scale_edge_position(position, self.sender_width, self.screen_width),
                self.screen_height - 1,
            ),
        };
        let (x, y) = clamp_to_screen(x, y, self.screen_width, self.screen_height);

        self.state = ReplayState::Active;
        self.entry_edge = Some(edge);
        self.cursor_x = x;
        self.cursor_y = y;
        info!("input active, entry edge {}", edge.name());
        self.injector.move_absolute(x, y)
    }

    fn apply_move(&mut self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        if self.state != ReplayState::Active {
            return Ok(());
        }

        let (x, y) = clamp_to_screen(
            self.cursor_x + dx,
            self.cursor_y + dy,
            self.screen_width,
            self.screen_height,
        );
        self.cursor_x = x;
        self.cursor_y = y;
        self.injector.move_absolute(x, y)?;

        if self.on_entry_edge() {
            // Back where we came in: hand control to the primary and park
            // the cursor off the edge so re-activation starts clean.
            info!("cursor returned to entry edge; input back on primary");
            self.state = ReplayState::Idle;
            self.entry_edge = None;
            self.cursor_x = self.screen_width / 2;
            self.cursor_y = self.screen_height / 2;
            self.injector.move_absolute(self.cursor_x, self.cursor_y)?;
        }
        Ok(())
    }

    fn on_entry_edge(&self) -> bool {
        match self.entry_edge {
            Some(Edge::Left) => self.cursor_x <= 0,
            Some(Edge::Right) => self.cursor_x >= self.screen_width - 1,
            Some(Edge::Top) => self.cursor_y <= 0,
            Some(Edge::Bottom) => self.cursor_y >= self.screen_height - 1,
            None => false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
