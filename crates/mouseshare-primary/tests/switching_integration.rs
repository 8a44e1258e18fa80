//! Integration tests wiring the mock interception back end to the focus
//! controller exactly the way `main` does: injected events flow through the
//! bounded channel, delta tracking, and the edge state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mouseshare_core::domain::keys;
use mouseshare_core::protocol::event::{Edge, Event};
use mouseshare_core::{PeerRecord, Topology};

use mouseshare_primary::application::share_input::{
    CaptureControl, EventSink, FocusController, FocusState,
};
use mouseshare_primary::infrastructure::input_capture::mock::MockInputCapture;
use mouseshare_primary::infrastructure::input_capture::{spawn_safety_release, InputCapture};

// ── Shared test double ────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    open: AtomicBool,
    sent: Mutex<Vec<Event>>,
}

impl RecordingSink {
    fn open() -> Arc<Self> {
        let sink = Arc::new(Self::default());
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
        self.sent.lock().unwrap().push(event);
        Ok(())
    }
}

struct Rig {
    capture: Arc<MockInputCapture>,
    sink: Arc<RecordingSink>,
    controller: FocusController,
    rx: tokio::sync::mpsc::Receiver<
        mouseshare_primary::infrastructure::input_capture::CapturedEvent,
    >,
}

fn rig_with_connected_right_peer() -> Rig {
    let capture = Arc::new(MockInputCapture::new(1920, 1080));
    let rx = capture.start().expect("mock capture starts");

    let mut topo = Topology::new(PeerRecord::local("alpha", 24800, 1920, 1080, true));
    topo.observe("bravo", "192.168.1.20".parse().unwrap(), 24800, 1920, 1080, false, 0);
    topo.set_connected("bravo", true);

    let sink = RecordingSink::open();
    let controller = FocusController::new(
        1920,
        1080,
        Arc::new(Mutex::new(topo)),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::clone(&capture) as Arc<dyn CaptureControl>,
        keys::VK_SCROLL,
        keys::VK_F8,
        Edge::Right,
    );

    Rig { capture, sink, controller, rx }
}

impl Rig {
    /// Drains everything currently in the capture channel through the
    /// controller, like one spin of the focus task.
    async fn pump(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.controller.handle_event(event).await;
        }
    }
}

// ── Scenario: edge crossing to the right ──────────────────────────────────────

#[tokio::test]
async fn edge_crossing_to_the_right_switches_and_streams_deltas() {
    let mut rig = rig_with_connected_right_peer();

    // The user slides the cursor into the right edge.
    rig.capture.inject_move(1918, 500);
    rig.capture.inject_move(1920, 500);
    rig.pump().await;

    assert_eq!(rig.controller.state(), FocusState::Remote);
    assert!(rig.capture.is_suppressed());
    assert_eq!(
        rig.sink.sent(),
        vec![Event::SwitchScreen { edge: Edge::Left, position: 500 }]
    );
    // The physical pointer was pulled off the edge.
    assert_eq!(rig.capture.warps(), vec![(960, 540)]);

    // The next physical move is suppressed, so its delta is measured from
    // the warp anchor and forwarded over the wire.
    rig.capture.inject_move(965, 540);
    rig.pump().await;

    assert_eq!(
        rig.sink.sent().last(),
        Some(&Event::MouseMove { x: 965, y: 540, dx: 5, dy: 0 })
    );
}

#[tokio::test]
async fn empty_topology_means_the_edge_is_just_an_edge() {
    let capture = Arc::new(MockInputCapture::new(1920, 1080));
    let mut rx = capture.start().unwrap();
    let sink = RecordingSink::open();
    let mut controller = FocusController::new(
        1920,
        1080,
        Arc::new(Mutex::new(Topology::new(PeerRecord::local(
            "alpha", 24800, 1920, 1080, true,
        )))),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::clone(&capture) as Arc<dyn CaptureControl>,
        keys::VK_SCROLL,
        keys::VK_F8,
        Edge::Right,
    );

    capture.inject_move(1920, 500);
    while let Ok(event) = rx.try_recv() {
        controller.handle_event(event).await;
    }

    assert_eq!(controller.state(), FocusState::Local);
    assert!(sink.sent().is_empty());
    assert!(!capture.is_suppressed());
    assert!(capture.warps().is_empty());
}

// ── Scenario: clicks and keys while remote ────────────────────────────────────

#[tokio::test]
async fn buttons_and_keys_stream_while_remote_and_stop_after_release() {
    let mut rig = rig_with_connected_right_peer();

    rig.capture.inject_move(1920, 500);
    rig.pump().await;
    rig.capture.inject_button(mouseshare_core::MouseButton::Left, true);
    rig.capture.inject_button(mouseshare_core::MouseButton::Left, false);
    rig.capture.inject_key(0x41, 0x1E, 0, true);
    rig.pump().await;

    let streamed = rig.sink.sent().len();
    assert_eq!(streamed, 4); // switch + two button events + key

    // Scroll Lock releases; later input stays local.
    rig.capture.inject_key(keys::VK_SCROLL, 0x46, 0, true);
    rig.capture.inject_key(0x42, 0x30, 0, true);
    rig.pump().await;

    assert_eq!(rig.controller.state(), FocusState::Local);
    assert!(!rig.capture.is_suppressed());
    assert_eq!(rig.sink.sent().len(), streamed, "nothing streamed after release");
}

// ── Safety release through the real watchdog ──────────────────────────────────

#[tokio::test]
async fn stale_suppress_is_released_by_the_watchdog() {
    let mut rig = rig_with_connected_right_peer();

    rig.capture.inject_move(1920, 500);
    rig.pump().await;
    assert!(rig.capture.is_suppressed());

    let running = Arc::new(AtomicBool::new(true));
    let watchdog = spawn_safety_release(
        rig.capture.suppress_flag(),
        rig.capture.activity_stamp(),
        100,
        Arc::clone(&running),
    );

    // No further input arrives at all.
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert!(!rig.capture.is_suppressed(), "watchdog must release a dead capture");

    running.store(false, Ordering::Relaxed);
    let _ = tokio::task::spawn_blocking(move || watchdog.join()).await;
}
