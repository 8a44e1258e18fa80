//! Mock interception back end for tests and non-Windows builds.
//!
//! Injected events run through the same delta tracking and suppress rules
//! as the real hooks, so controller tests observe identical semantics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use mouseshare_core::clock;
use mouseshare_core::protocol::event::MouseButton;

use super::{CaptureError, CapturedEvent, DeltaTracker, InputCapture, EVENT_CHANNEL_CAPACITY};
use crate::application::share_input::CaptureControl;

/// An [`InputCapture`] whose "hardware" is the test itself.
pub struct MockInputCapture {
    screen_width: i32,
    screen_height: i32,
    suppress: Arc<AtomicBool>,
    last_activity_ms: Arc<AtomicU64>,
    tracker: Mutex<DeltaTracker>,
    cursor: Mutex<(i32, i32)>,
    sender: Mutex<Option<mpsc::Sender<CapturedEvent>>>,
    warps: Mutex<Vec<(i32, i32)>>,
}

impl MockInputCapture {
    pub fn new(screen_width: i32, screen_height: i32) -> Self {
        Self {
            screen_width,
            screen_height,
            suppress: Arc::new(AtomicBool::new(false)),
            last_activity_ms: Arc::new(AtomicU64::new(0)),
            tracker: Mutex::new(DeltaTracker::new(screen_width / 2, screen_height / 2)),
            cursor: Mutex::new((screen_width / 2, screen_height / 2)),
            sender: Mutex::new(None),
            warps: Mutex::new(Vec::new()),
        }
    }

    /// Simulates a physical cursor move to `(x, y)`.
    pub fn inject_move(&self, x: i32, y: i32) {
        let suppressed = self.is_suppressed();
        let (dx, dy) = self.tracker.lock().unwrap().track(x, y, suppressed);
        if dx == 0 && dy == 0 {
            return;
        }
        if !suppressed {
            *self.cursor.lock().unwrap() = (x, y);
        }
        self.emit(CapturedEvent::MouseMove { x, y, dx, dy });
    }

    pub fn inject_button(&self, button: MouseButton, pressed: bool) {
        self.emit(CapturedEvent::MouseButton { button, pressed });
    }

    pub fn inject_scroll(&self, dx: i32, dy: i32) {
        self.emit(CapturedEvent::MouseScroll { dx, dy });
    }

    pub fn inject_key(&self, vk: u32, scan: u32, flags: u32, pressed: bool) {
        self.emit(CapturedEvent::Key { vk, scan, flags, pressed });
    }

    /// Positions warped to, oldest first.
    pub fn warps(&self) -> Vec<(i32, i32)> {
        self.warps.lock().unwrap().clone()
    }

    /// Shared suppress flag, e.g. for wiring a safety-release watchdog.
    pub fn suppress_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.suppress)
    }

    /// Shared activity stamp, updated on every injected event.
    pub fn activity_stamp(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.last_activity_ms)
    }

    fn emit(&self, event: CapturedEvent) {
        self.last_activity_ms.store(clock::now_ms(), Ordering::Relaxed);
        let guard = self.sender.lock().unwrap();
        if let Some(sender) = guard.as_ref() {
            sender.try_send(event).expect("mock event channel full or closed");
        }
    }
}

impl InputCapture for MockInputCapture {
    fn start(&self) -> Result<mpsc::Receiver<CapturedEvent>, CaptureError> {
        let mut guard = self.sender.lock().unwrap();
        if guard.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        *self.sender.lock().unwrap() = None;
        self.suppress.store(false, Ordering::Relaxed);
    }

    fn set_suppress(&self, suppress: bool) {
        self.suppress.store(suppress, Ordering::Relaxed);
    }

    fn is_suppressed(&self) -> bool {
        self.suppress.load(Ordering::Relaxed)
    }

    fn warp_cursor(&self, x: i32, y: i32) {
        self.tracker.lock().unwrap().warp_to(x, y);
        *self.cursor.lock().unwrap() = (x, y);
        self.warps.lock().unwrap().push((x, y));
    }

    fn cursor_pos(&self) -> (i32, i32) {
        *self.cursor.lock().unwrap()
    }

    fn screen_size(&self) -> (i32, i32) {
        (self.screen_width, self.screen_height)
    }
}

impl CaptureControl for MockInputCapture {
    fn set_suppress(&self, suppress: bool) {
        InputCapture::set_suppress(self, suppress);
    }

    fn warp_cursor(&self, x: i32, y: i32) {
        InputCapture::warp_cursor(self, x, y);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_moves_carry_deltas() {
        let capture = MockInputCapture::new(1920, 1080);
        let mut rx = capture.start().unwrap();

        capture.inject_move(970, 540);
        capture.inject_move(980, 535);

        assert_eq!(
            rx.recv().await,
            Some(CapturedEvent::MouseMove { x: 970, y: 540, dx: 10, dy: 0 })
        );
        assert_eq!(
            rx.recv().await,
            Some(CapturedEvent::MouseMove { x: 980, y: 535, dx: 10, dy: -5 })
        );
    }

    #[tokio::test]
    async fn test_suppressed_moves_do_not_advance_the_cursor_or_anchor() {
        let capture = MockInputCapture::new(1920, 1080);
        let mut rx = capture.start().unwrap();
        InputCapture::set_suppress(&capture, true);

        capture.inject_move(965, 540);
        capture.inject_move(970, 540);

        // Physical cursor never moved.
        assert_eq!(capture.cursor_pos(), (960, 540));
        // Deltas stay relative to the pinned anchor.
        assert_eq!(
            rx.recv().await,
            Some(CapturedEvent::MouseMove { x: 965, y: 540, dx: 5, dy: 0 })
        );
        assert_eq!(
            rx.recv().await,
            Some(CapturedEvent::MouseMove { x: 970, y: 540, dx: 10, dy: 0 })
        );
    }

    #[tokio::test]
    async fn test_zero_delta_moves_are_dropped() {
        let capture = MockInputCapture::new(1920, 1080);
        let mut rx = capture.start().unwrap();

        capture.inject_move(960, 540); // already there
        capture.inject_key(0x41, 0x1E, 0, true);

        // The first event received is the key, not a (0, 0) move.
        assert!(matches!(rx.recv().await, Some(CapturedEvent::Key { .. })));
    }

    #[test]
    fn test_second_start_is_refused() {
        let capture = MockInputCapture::new(1920, 1080);
        let _rx = capture.start().unwrap();
        assert!(matches!(capture.start(), Err(CaptureError::AlreadyRunning)));
    }

    #[test]
    fn test_stop_releases_suppress() {
        let capture = MockInputCapture::new(1920, 1080);
        let _rx = capture.start().unwrap();
        InputCapture::set_suppress(&capture, true);
        capture.stop();
        assert!(!capture.is_suppressed());
    }

    #[test]
    fn test_warp_records_position_and_moves_cursor() {
        let capture = MockInputCapture::new(1920, 1080);
        InputCapture::warp_cursor(&capture, 100, 200);
        assert_eq!(capture.cursor_pos(), (100, 200));
        assert_eq!(capture.warps(), vec![(100, 200)]);
    }
}
