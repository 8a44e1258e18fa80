//! FocusController: decides when local input is suppressed and streamed.
//!
//! This is the primary side of the edge-crossing state machine. It receives
//! captured input events from the interception layer, consults the peer
//! topology on edge hits, and either lets input stay local or streams it to
//! the connected secondary through the session sink.
//!
//! Event flow:
//!
//! ```text
//! OS hook (dedicated thread)
//!   └─ CapturedEvent over a bounded channel
//!        └─ FocusController::handle_event()            (single async task)
//!             ├─ LOCAL:  edge hit → topology lookup → enter_remote()
//!             │            ├─ suppress local delivery
//!             │            ├─ send SwitchScreen{opposite edge, position}
//!             │            └─ warp cursor off the edge
//!             └─ REMOTE: forward every event over the session
//! ```
//!
//! All state transitions happen on the single task that drains the capture
//! channel, so they are strictly serialized. The controller depends only on
//! the [`EventSink`] and [`CaptureControl`] traits plus the shared topology;
//! the recording doubles at the bottom test it without sockets or hooks.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use mouseshare_core::domain::geometry::edge_hit;
use mouseshare_core::protocol::event::{Edge, Event};
use mouseshare_core::Topology;

use crate::infrastructure::input_capture::CapturedEvent;

/// Which host the shared cursor currently inhabits, from the primary's
/// point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FocusState {
    Local = 0,
    Remote = 1,
}

impl FocusState {
    fn from_u8(value: u8) -> FocusState {
        if value == FocusState::Remote as u8 {
            FocusState::Remote
        } else {
            FocusState::Local
        }
    }
}

/// Outbound capability the controller sends events through.
///
/// The session transport implements this; tests use a recording double.
/// `send` is fire-and-forget: an `Err` means the session is gone and the
/// controller must fall back to local focus.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Whether a session is currently open.
    fn is_open(&self) -> bool;

    /// Sends one event over the session.
    async fn send(&self, event: Event) -> Result<(), String>;
}

/// The slice of the interceptor surface the controller drives.
pub trait CaptureControl: Send + Sync {
    /// Starts or stops suppressing delivery of captured events to the
    /// local OS.
    fn set_suppress(&self, suppress: bool);

    /// Teleports the physical cursor to `(x, y)`.
    fn warp_cursor(&self, x: i32, y: i32);
}

/// The primary-side focus controller.
pub struct FocusController {
    state: FocusState,
    /// Mirror of `state` for observers on other threads; canonical writes
    /// happen only on the task driving `handle_event`.
    state_cell: Arc<AtomicU8>,
    screen_width: i32,
    screen_height: i32,
    topology: Arc<Mutex<Topology>>,
    sink: Arc<dyn EventSink>,
    capture: Arc<dyn CaptureControl>,
    /// Panic release; forces local focus in any state. Default Scroll Lock.
    toggle_vk: u32,
    /// Manual flip; default F8.
    user_toggle_vk: u32,
    /// Exit edge used by the manual flip when no edge was crossed.
    default_edge: Edge,
}

impl FocusController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        screen_width: i32,
        screen_height: i32,
        topology: Arc<Mutex<Topology>>,
        sink: Arc<dyn EventSink>,
        capture: Arc<dyn CaptureControl>,
        toggle_vk: u32,
        user_toggle_vk: u32,
        default_edge: Edge,
    ) -> Self {
        Self {
            state: FocusState::Local,
            state_cell: Arc::new(AtomicU8::new(FocusState::Local as u8)),
            screen_width,
            screen_height,
            topology,
            sink,
            capture,
            toggle_vk,
            user_toggle_vk,
            default_edge,
        }
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    /// Shared cell other threads may poll for the current focus state.
    pub fn state_cell(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.state_cell)
    }

    /// Reads a state cell written by [`FocusController`].
    pub fn read_state(cell: &AtomicU8) -> FocusState {
        FocusState::from_u8(cell.load(Ordering::Relaxed))
    }

    /// Handles one captured event.
    pub async fn handle_event(&mut self, event: CapturedEvent) {
        match event {
            CapturedEvent::MouseMove { x, y, dx, dy } => self.handle_move(x, y, dx, dy).await,
            CapturedEvent::MouseButton { button, pressed } => {
                self.forward_if_remote(Event::MouseButton { button, pressed }).await;
            }
            CapturedEvent::MouseScroll { dx, dy } => {
                self.forward_if_remote(Event::MouseScroll { dx, dy }).await;
            }
            CapturedEvent::Key { vk, scan, flags, pressed } => {
                self.handle_key(vk, scan, flags, pressed).await;
            }
        }
    }

    /// The session dropped. Restore input to the local user; the warp pulls
    /// the cursor off whatever edge it was parked near so the next move
    /// cannot instantly re-trigger a switch.
    pub fn on_session_closed(&mut self) {
        if self.state == FocusState::Remote {
            warn!("session closed while remote; returning focus to local");
            self.revert_to_local();
            self.capture
                .warp_cursor(self.screen_width / 2, self.screen_height / 2);
        }
    }

    // ── Private event handlers ────────────────────────────────────────────────

    async fn handle_move(&mut self, x: i32, y: i32, dx: i32, dy: i32) {
        match self.state {
            FocusState::Local => {
                let Some(edge) = edge_hit(x, y, self.screen_width, self.screen_height) else {
                    return;
                };
                if !self.sink.is_open() {
                    return;
                }

                let position = match edge {
                    Edge::Left | Edge::Right => y,
                    Edge::Top | Edge::Bottom => x,
                };

                // Topology lock is released before any send.
                let neighbor = {
                    let topo = self.topology.lock().expect("topology lock poisoned");
                    topo.connected_neighbor(edge, position).map(|p| p.name.clone())
                };
                let Some(neighbor) = neighbor else {
                    return;
                };

                debug!("cursor hit {} edge at {position}, neighbor {neighbor}", edge.name());
                self.enter_remote(edge, position).await;
            }
            FocusState::Remote => {
                self.forward(Event::MouseMove { x, y, dx, dy }).await;
            }
        }
    }

    async fn handle_key(&mut self, vk: u32, scan: u32, flags: u32, pressed: bool) {
        // Scroll Lock is the user's panic: local focus, capture released,
        // in the same critical section, from any state.
        if vk == self.toggle_vk && pressed {
            if self.state == FocusState::Remote {
                info!("toggle key pressed; returning focus to local");
                self.revert_to_local();
            }
            return;
        }

        // Manual flip. Entering remote without an edge crossing uses the
        // configured default edge at its midpoint; refused when no session
        // is open.
        if vk == self.user_toggle_vk && pressed {
            match self.state {
                FocusState::Remote => {
                    info!("manual toggle; returning focus to local");
                    self.revert_to_local();
                }
                FocusState::Local if self.sink.is_open() => {
                    let position = match self.default_edge {
                        Edge::Left | Edge::Right => self.screen_height / 2,
                        Edge::Top | Edge::Bottom => self.screen_width / 2,
                    };
                    info!("manual toggle; switching to remote via {} edge", self.default_edge.name());
                    self.enter_remote(self.default_edge, position).await;
                }
                FocusState::Local => {}
            }
            return;
        }

        self.forward_if_remote(Event::Key { vk, scan, flags, pressed }).await;
    }

    /// Transition LOCAL → REMOTE: suppress, announce the switch, and pull
    /// the physical pointer off the edge so the OS's edge pinning cannot
    /// fight the stream of suppressed moves.
    async fn enter_remote(&mut self, exit_edge: Edge, position: i32) {
        self.set_state(FocusState::Remote);
        self.capture.set_suppress(true);

        let switch = Event::SwitchScreen {
            edge: exit_edge.opposite(),
            position,
        };
        if let Err(e) = self.sink.send(switch).await {
            warn!("switch announcement failed ({e}); staying local");
            self.revert_to_local();
            return;
        }

        self.capture
            .warp_cursor(self.screen_width / 2, self.screen_height / 2);
    }

    /// Transition REMOTE → LOCAL. Suppress drops before the state flips so
    /// no observer can see suppressed-but-local.
    fn revert_to_local(&mut self) {
        self.capture.set_suppress(false);
        self.set_state(FocusState::Local);
    }

    async fn forward_if_remote(&mut self, event: Event) {
        if self.state == FocusState::Remote {
            self.forward(event).await;
        }
    }

    async fn forward(&mut self, event: Event) {
        if let Err(e) = self.sink.send(event).await {
            // A dead session must not strand the user's input on a screen
            // they cannot reach.
            warn!("session send failed ({e}); returning focus to local");
            self.revert_to_local();
        }
    }

    fn set_state(&mut self, state: FocusState) {
        self.state = state;
        self.state_cell.store(state as u8, Ordering::Relaxed);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mouseshare_core::domain::keys;
    use mouseshare_core::protocol::event::MouseButton;
    use mouseshare_core::PeerRecord;
    use std::sync::atomic::AtomicBool;

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingSink {
        open: AtomicBool,
        fail_sends: AtomicBool,
        sent: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn open() -> Self {
            let sink = Self::default();
            sink.open.store(true, Ordering::Relaxed);
            sink
        }

        fn sent(&self) -> Vec<Event> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::Relaxed)
        }

        async fn send(&self, event: Event) -> Result<(), String> {
            if self.fail_sends.load(Ordering::Relaxed) {
                return Err("injected failure".to_string());
            }
            self.sent.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingCapture {
        suppressed: AtomicBool,
        warps: Mutex<Vec<(i32, i32)>>,
    }

    impl CaptureControl for RecordingCapture {
        fn set_suppress(&self, suppress: bool) {
            self.suppressed.store(suppress, Ordering::Relaxed);
        }

        fn warp_cursor(&self, x: i32, y: i32) {
            self.warps.lock().unwrap().push((x, y));
        }
    }

    const SCROLL_LOCK: u32 = keys::VK_SCROLL;
    const F8: u32 = keys::VK_F8;

    fn topology_with_right_peer(connected: bool) -> Arc<Mutex<Topology>> {
        let mut topo = Topology::new(PeerRecord::local("alpha", 24800, 1920, 1080, true));
        topo.observe("bravo", "192.168.1.20".parse().unwrap(), 24800, 1920, 1080, false, 0);
        topo.set_connected("bravo", connected);
        Arc::new(Mutex::new(topo))
    }

    fn controller(
        topology: Arc<Mutex<Topology>>,
    ) -> (FocusController, Arc<RecordingSink>, Arc<RecordingCapture>) {
        let sink = Arc::new(RecordingSink::open());
        let capture = Arc::new(RecordingCapture::default());
        let fc = FocusController::new(
            1920,
            1080,
            topology,
            Arc::clone(&sink) as Arc<dyn EventSink>,
            Arc::clone(&capture) as Arc<dyn CaptureControl>,
            SCROLL_LOCK,
            F8,
            Edge::Right,
        );
        (fc, sink, capture)
    }

    async fn move_to(fc: &mut FocusController, x: i32, y: i32, dx: i32, dy: i32) {
        fc.handle_event(CapturedEvent::MouseMove { x, y, dx, dy }).await;
    }

    // ── Edge crossing ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_right_edge_hit_switches_to_remote() {
        let (mut fc, sink, capture) = controller(topology_with_right_peer(true));

        // Approach, then touch the edge.
        move_to(&mut fc, 1918, 500, 10, 0).await;
        assert_eq!(fc.state(), FocusState::Local);
        move_to(&mut fc, 1920, 500, 2, 0).await;

        assert_eq!(fc.state(), FocusState::Remote);
        assert!(capture.suppressed.load(Ordering::Relaxed));
        // The receiver enters from the mirrored edge at the sender's y.
        assert_eq!(
            sink.sent(),
            vec![Event::SwitchScreen { edge: Edge::Left, position: 500 }]
        );
        // Cursor warped to the screen center, off the edge.
        assert_eq!(capture.warps.lock().unwrap().as_slice(), &[(960, 540)]);
    }

    #[tokio::test]
    async fn test_moves_after_the_switch_are_forwarded_as_deltas() {
        let (mut fc, sink, _) = controller(topology_with_right_peer(true));
        move_to(&mut fc, 1920, 500, 2, 0).await;
        move_to(&mut fc, 965, 540, 5, 0).await;

        assert_eq!(
            sink.sent().last(),
            Some(&Event::MouseMove { x: 965, y: 540, dx: 5, dy: 0 })
        );
    }

    #[tokio::test]
    async fn test_no_neighbor_means_no_switch() {
        let topo = Arc::new(Mutex::new(Topology::new(PeerRecord::local(
            "alpha", 24800, 1920, 1080, true,
        ))));
        let (mut fc, sink, capture) = controller(topo);

        move_to(&mut fc, 1920, 500, 2, 0).await;

        assert_eq!(fc.state(), FocusState::Local);
        assert!(sink.sent().is_empty());
        assert!(!capture.suppressed.load(Ordering::Relaxed));
        assert!(capture.warps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_neighbor_means_no_switch() {
        let (mut fc, sink, _) = controller(topology_with_right_peer(false));
        move_to(&mut fc, 1920, 500, 2, 0).await;
        assert_eq!(fc.state(), FocusState::Local);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_closed_session_means_no_switch() {
        let (mut fc, sink, _) = controller(topology_with_right_peer(true));
        sink.open.store(false, Ordering::Relaxed);

        move_to(&mut fc, 1920, 500, 2, 0).await;
        assert_eq!(fc.state(), FocusState::Local);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_neighbor_lookup_uses_the_perpendicular_coordinate() {
        let topo = topology_with_right_peer(true);
        // Shift the peer down; only y >= 600 is adjacent.
        topo.lock().unwrap().set_layout("bravo", 1920, 600);
        let (mut fc, sink, _) = controller(topo);

        move_to(&mut fc, 1920, 500, 2, 0).await;
        assert_eq!(fc.state(), FocusState::Local);

        move_to(&mut fc, 1920, 700, 2, 0).await;
        assert_eq!(fc.state(), FocusState::Remote);
        assert_eq!(
            sink.sent(),
            vec![Event::SwitchScreen { edge: Edge::Left, position: 700 }]
        );
    }

    // ── Forwarding while remote ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_buttons_scrolls_and_keys_forward_only_while_remote() {
        let (mut fc, sink, _) = controller(topology_with_right_peer(true));

        // Local: nothing goes over the wire.
        fc.handle_event(CapturedEvent::MouseButton { button: MouseButton::Left, pressed: true })
            .await;
        fc.handle_event(CapturedEvent::MouseScroll { dx: 0, dy: -1 }).await;
        fc.handle_event(CapturedEvent::Key { vk: 0x41, scan: 0x1E, flags: 0, pressed: true })
            .await;
        assert!(sink.sent().is_empty());

        move_to(&mut fc, 1920, 500, 2, 0).await;
        fc.handle_event(CapturedEvent::MouseButton { button: MouseButton::Left, pressed: true })
            .await;
        fc.handle_event(CapturedEvent::MouseScroll { dx: 0, dy: -1 }).await;
        fc.handle_event(CapturedEvent::Key { vk: 0x41, scan: 0x1E, flags: 0, pressed: true })
            .await;

        let sent = sink.sent();
        assert_eq!(sent.len(), 4); // switch + three forwarded events
        assert!(matches!(sent[1], Event::MouseButton { .. }));
        assert!(matches!(sent[2], Event::MouseScroll { .. }));
        assert!(matches!(sent[3], Event::Key { .. }));
    }

    // ── Panic and manual toggles ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_scroll_lock_forces_local_and_releases_suppress() {
        let (mut fc, sink, capture) = controller(topology_with_right_peer(true));
        move_to(&mut fc, 1920, 500, 2, 0).await;
        assert_eq!(fc.state(), FocusState::Remote);

        fc.handle_event(CapturedEvent::Key {
            vk: SCROLL_LOCK,
            scan: 0x46,
            flags: 0,
            pressed: true,
        })
        .await;

        assert_eq!(fc.state(), FocusState::Local);
        assert!(!capture.suppressed.load(Ordering::Relaxed));
        // The toggle key itself is never forwarded.
        assert!(!sink.sent().iter().any(|e| matches!(e, Event::Key { vk, .. } if *vk == SCROLL_LOCK)));
    }

    #[tokio::test]
    async fn test_scroll_lock_release_event_is_inert_while_local() {
        let (mut fc, sink, _) = controller(topology_with_right_peer(true));
        fc.handle_event(CapturedEvent::Key {
            vk: SCROLL_LOCK,
            scan: 0x46,
            flags: 0,
            pressed: false,
        })
        .await;
        assert_eq!(fc.state(), FocusState::Local);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_manual_toggle_enters_remote_via_default_edge_midpoint() {
        let (mut fc, sink, capture) = controller(topology_with_right_peer(true));

        fc.handle_event(CapturedEvent::Key { vk: F8, scan: 0, flags: 0, pressed: true }).await;

        assert_eq!(fc.state(), FocusState::Remote);
        assert!(capture.suppressed.load(Ordering::Relaxed));
        assert_eq!(
            sink.sent(),
            vec![Event::SwitchScreen { edge: Edge::Left, position: 540 }]
        );
    }

    #[tokio::test]
    async fn test_manual_toggle_flips_back_to_local() {
        let (mut fc, _, capture) = controller(topology_with_right_peer(true));
        fc.handle_event(CapturedEvent::Key { vk: F8, scan: 0, flags: 0, pressed: true }).await;
        fc.handle_event(CapturedEvent::Key { vk: F8, scan: 0, flags: 0, pressed: true }).await;

        assert_eq!(fc.state(), FocusState::Local);
        assert!(!capture.suppressed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_manual_toggle_refused_without_open_session() {
        let (mut fc, sink, capture) = controller(topology_with_right_peer(true));
        sink.open.store(false, Ordering::Relaxed);

        fc.handle_event(CapturedEvent::Key { vk: F8, scan: 0, flags: 0, pressed: true }).await;

        assert_eq!(fc.state(), FocusState::Local);
        assert!(!capture.suppressed.load(Ordering::Relaxed));
        assert!(sink.sent().is_empty());
    }

    // ── Failure recovery ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_send_failure_while_remote_reverts_and_releases_suppress() {
        let (mut fc, sink, capture) = controller(topology_with_right_peer(true));
        move_to(&mut fc, 1920, 500, 2, 0).await;
        assert_eq!(fc.state(), FocusState::Remote);

        sink.fail_sends.store(true, Ordering::Relaxed);
        move_to(&mut fc, 965, 540, 5, 0).await;

        assert_eq!(fc.state(), FocusState::Local);
        assert!(!capture.suppressed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_failed_switch_announcement_stays_local() {
        let (mut fc, sink, capture) = controller(topology_with_right_peer(true));
        sink.fail_sends.store(true, Ordering::Relaxed);

        move_to(&mut fc, 1920, 500, 2, 0).await;

        assert_eq!(fc.state(), FocusState::Local);
        assert!(!capture.suppressed.load(Ordering::Relaxed));
        // No warp: the switch never happened.
        assert!(capture.warps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_close_while_remote_restores_local_and_warps() {
        let (mut fc, _, capture) = controller(topology_with_right_peer(true));
        move_to(&mut fc, 1920, 500, 2, 0).await;
        assert_eq!(fc.state(), FocusState::Remote);

        fc.on_session_closed();

        assert_eq!(fc.state(), FocusState::Local);
        assert!(!capture.suppressed.load(Ordering::Relaxed));
        assert_eq!(capture.warps.lock().unwrap().last(), Some(&(960, 540)));
    }

    #[tokio::test]
    async fn test_state_cell_tracks_transitions() {
        let (mut fc, _, _) = controller(topology_with_right_peer(true));
        let cell = fc.state_cell();
        assert_eq!(FocusController::read_state(&cell), FocusState::Local);

        move_to(&mut fc, 1920, 500, 2, 0).await;
        assert_eq!(FocusController::read_state(&cell), FocusState::Remote);
    }

    // ── Invariant: suppress implies remote ────────────────────────────────────

    #[tokio::test]
    async fn test_suppress_never_observed_while_local() {
        let (mut fc, sink, capture) = controller(topology_with_right_peer(true));

        let events = [
            CapturedEvent::MouseMove { x: 1920, y: 500, dx: 2, dy: 0 },
            CapturedEvent::Key { vk: 0x41, scan: 0x1E, flags: 0, pressed: true },
            CapturedEvent::Key { vk: SCROLL_LOCK, scan: 0x46, flags: 0, pressed: true },
            CapturedEvent::MouseMove { x: 1920, y: 200, dx: 2, dy: 0 },
            CapturedEvent::Key { vk: F8, scan: 0, flags: 0, pressed: true },
        ];
        for event in events {
            fc.handle_event(event).await;
            if capture.suppressed.load(Ordering::Relaxed) {
                assert_eq!(fc.state(), FocusState::Remote, "suppress while local");
            }
        }

        // And a dying session cannot leave suppress behind either.
        sink.fail_sends.store(true, Ordering::Relaxed);
        move_to(&mut fc, 960, 540, 1, 1).await;
        if capture.suppressed.load(Ordering::Relaxed) {
            assert_eq!(fc.state(), FocusState::Remote);
        }
    }
}
