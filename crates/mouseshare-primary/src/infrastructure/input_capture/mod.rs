//! Input interception infrastructure.
//!
//! On Windows this installs low-level keyboard and mouse hooks
//! (WH_KEYBOARD_LL, WH_MOUSE_LL) on a dedicated Win32 message-loop thread.
//! Captured events are pushed into a bounded channel with a non-blocking
//! `try_send`; the hook callback must finish in well under a millisecond or
//! Windows starts dropping the hook.
//!
//! While `suppress` is on, captured events are consumed instead of being
//! delivered to local applications. The emergency keys in
//! [`mouseshare_core::domain::keys`] always pass. A safety watchdog
//! releases a suppress that has seen no input at all for 30 seconds, on the
//! assumption that the remote side is dead.
//!
//! The [`InputCapture`] trait keeps the rest of the primary testable: tests
//! and non-Windows builds use [`mock::MockInputCapture`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::warn;

use mouseshare_core::clock;
use mouseshare_core::protocol::event::MouseButton;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Capacity of the hook → controller channel: roughly a second of peak
/// mouse traffic. When the consumer stalls longer than that, events are
/// dropped rather than blocking the hook thread.
pub const EVENT_CHANNEL_CAPACITY: usize = 512;

/// One captured input event, delivered before the propagate/suppress
/// decision is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedEvent {
    /// Absolute position plus the delta since the last *delivered* move.
    MouseMove { x: i32, y: i32, dx: i32, dy: i32 },
    MouseButton { button: MouseButton, pressed: bool },
    /// Wheel notches; negative is down/left.
    MouseScroll { dx: i32, dy: i32 },
    Key { vk: u32, scan: u32, flags: u32, pressed: bool },
}

/// Error type for interception operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to install input hooks: {0}")]
    HookInstall(String),
    #[error("input capture is already running")]
    AlreadyRunning,
}

/// The interception surface the rest of the primary sees.
pub trait InputCapture: Send + Sync {
    /// Installs the hooks and returns the captured-event channel.
    /// May be called once per process; interception is a global singleton
    /// because the OS callback carries no user-data pointer.
    fn start(&self) -> Result<mpsc::Receiver<CapturedEvent>, CaptureError>;

    /// Uninstalls the hooks and stops the message loop. Always releases
    /// suppress.
    fn stop(&self);

    /// Starts or stops suppressing local delivery of captured events.
    fn set_suppress(&self, suppress: bool);

    fn is_suppressed(&self) -> bool;

    /// Teleports the physical cursor; also re-anchors delta tracking.
    fn warp_cursor(&self, x: i32, y: i32);

    fn cursor_pos(&self) -> (i32, i32);

    /// Primary screen dimensions in pixels.
    fn screen_size(&self) -> (i32, i32);
}

// ── Delta tracking ────────────────────────────────────────────────────────────

/// Derives per-move deltas from absolute positions.
///
/// Invariant: while suppress is on, the OS never actually moves the cursor,
/// so the anchor must stay at the last *delivered* position. Advancing it
/// on suppressed moves would make the deltas collapse toward zero and the
/// remote cursor crawl.
#[derive(Debug)]
pub struct DeltaTracker {
    last_x: i32,
    last_y: i32,
}

impl DeltaTracker {
    pub fn new(x: i32, y: i32) -> Self {
        Self { last_x: x, last_y: y }
    }

    /// Returns the delta for a move to `(x, y)`, advancing the anchor only
    /// when the move will actually be delivered.
    pub fn track(&mut self, x: i32, y: i32, suppressed: bool) -> (i32, i32) {
        let dx = x - self.last_x;
        let dy = y - self.last_y;
        if !suppressed {
            self.last_x = x;
            self.last_y = y;
        }
        (dx, dy)
    }

    /// A warp moves the cursor for real regardless of suppress.
    pub fn warp_to(&mut self, x: i32, y: i32) {
        self.last_x = x;
        self.last_y = y;
    }

    pub fn anchor(&self) -> (i32, i32) {
        (self.last_x, self.last_y)
    }
}

// ── Safety release ────────────────────────────────────────────────────────────

/// Whether the watchdog should force suppress off: suppress has been on
/// with no input activity at all for longer than `release_after_ms`.
pub fn safety_release_due(
    suppressed: bool,
    now_ms: u64,
    last_activity_ms: u64,
    release_after_ms: u64,
) -> bool {
    suppressed && now_ms.saturating_sub(last_activity_ms) > release_after_ms
}

/// Spawns the watchdog thread backing the safety timer.
///
/// `last_activity_ms` is stamped by the capture back end on every callback;
/// if nothing stamps it for `release_after_ms` while `suppress` is set, the
/// suppress is dropped. The thread exits when `running` clears.
pub fn spawn_safety_release(
    suppress: Arc<AtomicBool>,
    last_activity_ms: Arc<AtomicU64>,
    release_after_ms: u64,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("ms-safety-release".to_string())
        .spawn(move || {
            let poll = Duration::from_millis((release_after_ms / 8).clamp(10, 1000));
            while running.load(Ordering::Relaxed) {
                std::thread::sleep(poll);
                if safety_release_due(
                    suppress.load(Ordering::Relaxed),
                    clock::now_ms(),
                    last_activity_ms.load(Ordering::Relaxed),
                    release_after_ms,
                ) {
                    warn!("no input for {release_after_ms} ms while suppressed; releasing capture");
                    suppress.store(false, Ordering::Relaxed);
                }
            }
        })
        .expect("failed to spawn safety-release thread")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
