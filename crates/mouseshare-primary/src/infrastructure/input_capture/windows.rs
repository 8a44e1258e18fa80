//! Windows low-level keyboard and mouse hook back end.
//!
//! Installs WH_KEYBOARD_LL and WH_MOUSE_LL on a dedicated Win32
//! message-loop thread. The hook procedures are globally addressable with
//! no user-data pointer, so all interception state lives in process-wide
//! statics; [`WindowsInputCapture`] is a thin handle over them and only one
//! may run per process.
//!
//! # Safety
//!
//! `unsafe` is confined to Windows API FFI calls, each annotated with a
//! `// SAFETY:` comment.

#![cfg(target_os = "windows")]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, warn};

use windows::Win32::Foundation::{LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_CONTROL, VK_MENU};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetCursorPos, GetMessageW, GetSystemMetrics,
    PostThreadMessageW, SetCursorPos, SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, HHOOK,
    KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, SM_CXSCREEN, SM_CYSCREEN, WH_KEYBOARD_LL, WH_MOUSE_LL,
    WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP,
    WM_MOUSEHWHEEL, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP,
    WM_SYSKEYDOWN, WM_SYSKEYUP, WM_XBUTTONDOWN, WM_XBUTTONUP, XBUTTON1,
};

use mouseshare_core::clock;
use mouseshare_core::domain::keys;
use mouseshare_core::protocol::event::MouseButton;

use super::{
    safety_release_due, CaptureError, CapturedEvent, DeltaTracker, InputCapture,
    EVENT_CHANNEL_CAPACITY,
};
use crate::application::share_input::CaptureControl;

const WHEEL_DELTA: i32 = 120;

/// When set, captured events are consumed instead of reaching local apps.
static SUPPRESS: AtomicBool = AtomicBool::new(false);

/// Monotonic ms of the last hook callback; feeds the safety release.
static LAST_ACTIVITY_MS: AtomicU64 = AtomicU64::new(0);

/// The configured user toggle key, exempt from suppression.
static USER_TOGGLE_VK: AtomicU32 = AtomicU32::new(keys::VK_F8);

/// Win32 thread id of the hook message loop, for posting WM_QUIT.
static HOOK_THREAD_ID: AtomicU32 = AtomicU32::new(0);

/// Sender the hook procedures push captured events through.
static EVENT_SENDER: OnceLock<mpsc::Sender<CapturedEvent>> = OnceLock::new();

/// Suppress-aware delta tracking; touched by the hook thread and by warps.
static TRACKER: Mutex<Option<DeltaTracker>> = Mutex::new(None);

/// Windows implementation of [`InputCapture`].
pub struct WindowsInputCapture {
    screen_width: i32,
    screen_height: i32,
    safety_release_ms: u64,
}

impl WindowsInputCapture {
    /// Reads screen metrics and the initial cursor position.
    pub fn new(user_toggle_vk: u32, safety_release_ms: u64) -> Self {
        USER_TOGGLE_VK.store(user_toggle_vk, Ordering::Relaxed);
        // SAFETY: GetSystemMetrics has no preconditions.
        let (width, height) = unsafe {
            (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN))
        };
        Self {
            screen_width: width,
            screen_height: height,
            safety_release_ms,
        }
    }
}

impl InputCapture for WindowsInputCapture {
    fn start(&self) -> Result<mpsc::Receiver<CapturedEvent>, CaptureError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        EVENT_SENDER
            .set(tx)
            .map_err(|_| CaptureError::AlreadyRunning)?;

        let (x, y) = self.cursor_pos();
        *TRACKER.lock().expect("tracker lock poisoned") = Some(DeltaTracker::new(x, y));
        LAST_ACTIVITY_MS.store(clock::now_ms(), Ordering::Relaxed);

        thread::Builder::new()
            .name("ms-hook-loop".to_string())
            .spawn(run_hook_message_loop)
            .map_err(|e| CaptureError::HookInstall(e.to_string()))?;

        let release_after = self.safety_release_ms;
        thread::Builder::new()
            .name("ms-safety-release".to_string())
            .spawn(move || safety_watchdog(release_after))
            .map_err(|e| CaptureError::HookInstall(e.to_string()))?;

        Ok(rx)
    }

    fn stop(&self) {
        SUPPRESS.store(false, Ordering::SeqCst);
        let thread_id = HOOK_THREAD_ID.load(Ordering::SeqCst);
        if thread_id != 0 {
            // SAFETY: posting WM_QUIT to a thread id we recorded ourselves.
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }
    }

    fn set_suppress(&self, suppress: bool) {
        if suppress {
            LAST_ACTIVITY_MS.store(clock::now_ms(), Ordering::Relaxed);
        }
        SUPPRESS.store(suppress, Ordering::SeqCst);
    }

    fn is_suppressed(&self) -> bool {
        SUPPRESS.load(Ordering::SeqCst)
    }

    fn warp_cursor(&self, x: i32, y: i32) {
        // SAFETY: SetCursorPos takes plain coordinates.
        unsafe {
            let _ = SetCursorPos(x, y);
        }
        if let Some(tracker) = TRACKER.lock().expect("tracker lock poisoned").as_mut() {
            tracker.warp_to(x, y);
        }
    }

    fn cursor_pos(&self) -> (i32, i32) {
        let mut pt = POINT::default();
        // SAFETY: pt is a valid out-pointer.
        unsafe {
            let _ = GetCursorPos(&mut pt);
        }
        (pt.x, pt.y)
    }

    fn screen_size(&self) -> (i32, i32) {
        (self.screen_width, self.screen_height)
    }
}

impl CaptureControl for WindowsInputCapture {
    fn set_suppress(&self, suppress: bool) {
        InputCapture::set_suppress(self, suppress);
    }

    fn warp_cursor(&self, x: i32, y: i32) {
        InputCapture::warp_cursor(self, x, y);
    }
}

/// Releases a suppress that has seen no hook activity at all for the
/// configured window; the remote side is almost certainly gone.
fn safety_watchdog(release_after_ms: u64) {
    let poll = Duration::from_millis((release_after_ms / 8).clamp(10, 1000));
    while EVENT_SENDER.get().is_some_and(|tx| !tx.is_closed()) {
        thread::sleep(poll);
        if safety_release_due(
            SUPPRESS.load(Ordering::Relaxed),
            clock::now_ms(),
            LAST_ACTIVITY_MS.load(Ordering::Relaxed),
            release_after_ms,
        ) {
            warn!("no input for {release_after_ms} ms while suppressed; releasing capture");
            SUPPRESS.store(false, Ordering::SeqCst);
        }
    }
}

/// Entry point of the dedicated hook thread: install both hooks, pump
/// messages until WM_QUIT, then unhook.
fn run_hook_message_loop() {
    // SAFETY: recording our own thread id for the shutdown path.
    HOOK_THREAD_ID.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

    // SAFETY: low-level hooks require a message loop on the calling thread,
    // which this function provides below.
    let keyboard_hook: HHOOK = match unsafe {
        SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
    } {
        Ok(hook) => hook,
        Err(e) => {
            error!("WH_KEYBOARD_LL install failed: {e}");
            return;
        }
    };
    // SAFETY: as above.
    let mouse_hook: HHOOK = match unsafe {
        SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0)
    } {
        Ok(hook) => hook,
        Err(e) => {
            error!("WH_MOUSE_LL install failed: {e}");
            // SAFETY: keyboard_hook came from a successful install.
            unsafe {
                let _ = UnhookWindowsHookEx(keyboard_hook);
            }
            return;
        }
    };

    // SAFETY: standard GetMessage/DispatchMessage pump; exits on WM_QUIT.
    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
        let _ = UnhookWindowsHookEx(keyboard_hook);
        let _ = UnhookWindowsHookEx(mouse_hook);
    }
}

fn deliver(event: CapturedEvent) {
    LAST_ACTIVITY_MS.store(clock::now_ms(), Ordering::Relaxed);
    if let Some(sender) = EVENT_SENDER.get() {
        // Bounded, non-blocking: when the consumer stalls, dropping the
        // event beats stalling the hook thread.
        let _ = sender.try_send(event);
    }
}

fn modifier_down(vk: windows::Win32::UI::Input::KeyboardAndMouse::VIRTUAL_KEY) -> bool {
    // SAFETY: GetAsyncKeyState is safe for any virtual-key value.
    (unsafe { GetAsyncKeyState(vk.0 as i32) } as u16 & 0x8000) != 0
}

/// Low-level keyboard hook. Must return quickly; Windows drops hooks that
/// stall its input queue.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: for HC_ACTION, l_param points to a KBDLLHOOKSTRUCT.
    let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
    let pressed = matches!(w_param.0 as u32, WM_KEYDOWN | WM_SYSKEYDOWN);
    if !pressed && !matches!(w_param.0 as u32, WM_KEYUP | WM_SYSKEYUP) {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    let vk = kbs.vkCode;
    let ctrl_down = modifier_down(VK_CONTROL);
    let alt_down = modifier_down(VK_MENU);

    if pressed && keys::is_panic_release(vk, ctrl_down, alt_down) {
        warn!("panic release chord; forcing suppress off");
        SUPPRESS.store(false, Ordering::SeqCst);
    }

    // The callback fires before the propagate decision, emergency or not.
    deliver(CapturedEvent::Key {
        vk,
        scan: kbs.scanCode,
        flags: kbs.flags.0,
        pressed,
    });

    let emergency =
        keys::is_emergency_key(vk, ctrl_down, alt_down, USER_TOGGLE_VK.load(Ordering::Relaxed));
    if SUPPRESS.load(Ordering::SeqCst) && !emergency {
        return LRESULT(1);
    }
    CallNextHookEx(None, n_code, w_param, l_param)
}

/// Low-level mouse hook; same latency constraints as the keyboard hook.
unsafe extern "system" fn mouse_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(None, n_code, w_param, l_param);
    }

    // SAFETY: for HC_ACTION, l_param points to a MSLLHOOKSTRUCT.
    let mhs = &*(l_param.0 as *const MSLLHOOKSTRUCT);
    let (x, y) = (mhs.pt.x, mhs.pt.y);
    let suppressed = SUPPRESS.load(Ordering::SeqCst);

    match w_param.0 as u32 {
        WM_MOUSEMOVE => {
            let delta = TRACKER
                .lock()
                .ok()
                .and_then(|mut guard| guard.as_mut().map(|t| t.track(x, y, suppressed)));
            if let Some((dx, dy)) = delta {
                if dx != 0 || dy != 0 {
                    deliver(CapturedEvent::MouseMove { x, y, dx, dy });
                }
            }
        }
        WM_LBUTTONDOWN => deliver(CapturedEvent::MouseButton { button: MouseButton::Left, pressed: true }),
        WM_LBUTTONUP => deliver(CapturedEvent::MouseButton { button: MouseButton::Left, pressed: false }),
        WM_RBUTTONDOWN => deliver(CapturedEvent::MouseButton { button: MouseButton::Right, pressed: true }),
        WM_RBUTTONUP => deliver(CapturedEvent::MouseButton { button: MouseButton::Right, pressed: false }),
        WM_MBUTTONDOWN => deliver(CapturedEvent::MouseButton { button: MouseButton::Middle, pressed: true }),
        WM_MBUTTONUP => deliver(CapturedEvent::MouseButton { button: MouseButton::Middle, pressed: false }),
        WM_XBUTTONDOWN | WM_XBUTTONUP => {
            let button = if (mhs.mouseData >> 16) as u16 == XBUTTON1 as u16 {
                MouseButton::X1
            } else {
                MouseButton::X2
            };
            deliver(CapturedEvent::MouseButton {
                button,
                pressed: w_param.0 as u32 == WM_XBUTTONDOWN,
            });
        }
        WM_MOUSEWHEEL => {
            let notches = i32::from((mhs.mouseData >> 16) as i16) / WHEEL_DELTA;
            deliver(CapturedEvent::MouseScroll { dx: 0, dy: notches });
        }
        WM_MOUSEHWHEEL => {
            let notches = i32::from((mhs.mouseData >> 16) as i16) / WHEEL_DELTA;
            deliver(CapturedEvent::MouseScroll { dx: notches, dy: 0 });
        }
        _ => return CallNextHookEx(None, n_code, w_param, l_param),
    }

    if suppressed {
        return LRESULT(1);
    }
    CallNextHookEx(None, n_code, w_param, l_param)
}
