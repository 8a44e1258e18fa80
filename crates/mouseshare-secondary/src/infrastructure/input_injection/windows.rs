//! Windows injection back end using the SendInput API.
//!
//! Absolute moves are normalised into the [0, 65535] coordinate space with
//! MOUSEEVENTF_ABSOLUTE, which bypasses pointer acceleration. Key events
//! forward the interceptor's extended-key bit so arrow keys and the numpad
//! keep their meaning.
//!
//! # Safety
//!
//! `unsafe` is confined to Windows API FFI calls, each annotated with a
//! `// SAFETY:` comment.

#![cfg(target_os = "windows")]

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY,
    KEYEVENTF_KEYUP, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEEVENTF_XDOWN,
    MOUSEEVENTF_XUP, MOUSEINPUT, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN, XBUTTON1, XBUTTON2,
};

use mouseshare_core::domain::geometry::clamp_to_screen;
use mouseshare_core::protocol::event::MouseButton;

use super::{InjectionError, InputInjector, FLAG_EXTENDED};

const WHEEL_DELTA: i32 = 120;

/// Windows implementation of [`InputInjector`].
pub struct WindowsInjector {
    screen_width: i32,
    screen_height: i32,
}

impl WindowsInjector {
    /// Reads screen metrics.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError::Init`] when the metrics come back
    /// non-positive, which means there is no usable desktop session.
    pub fn new() -> Result<Self, InjectionError> {
        // SAFETY: GetSystemMetrics has no preconditions.
        let (width, height) = unsafe {
            (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN))
        };
        if width <= 0 || height <= 0 {
            return Err(InjectionError::Init(format!(
                "screen metrics unavailable ({width}x{height})"
            )));
        }
        Ok(Self { screen_width: width, screen_height: height })
    }

    fn send(&self, input: INPUT) -> Result<(), InjectionError> {
        // SAFETY: input is a fully initialised INPUT on the stack.
        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent == 1 {
            Ok(())
        } else {
            Err(InjectionError::Inject(format!(
                "SendInput injected {sent} of 1 events"
            )))
        }
    }

    fn mouse_input(flags: windows::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS, dx: i32, dy: i32, data: i32) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    mouseData: data as u32,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }
}

impl InputInjector for WindowsInjector {
    fn screen_size(&self) -> (i32, i32) {
        (self.screen_width, self.screen_height)
    }

    fn move_absolute(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        let (x, y) = clamp_to_screen(x, y, self.screen_width, self.screen_height);
        // Normalise into the 16-bit absolute coordinate space.
        let norm_x = (x * 65_535) / (self.screen_width - 1).max(1);
        let norm_y = (y * 65_535) / (self.screen_height - 1).max(1);
        self.send(Self::mouse_input(
            MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
            norm_x,
            norm_y,
            0,
        ))
    }

    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        self.send(Self::mouse_input(MOUSEEVENTF_MOVE, dx, dy, 0))
    }

    fn button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError> {
        let (flags, data) = match (button, pressed) {
            (MouseButton::Left, true) => (MOUSEEVENTF_LEFTDOWN, 0),
            (MouseButton::Left, false) => (MOUSEEVENTF_LEFTUP, 0),
            (MouseButton::Right, true) => (MOUSEEVENTF_RIGHTDOWN, 0),
            (MouseButton::Right, false) => (MOUSEEVENTF_RIGHTUP, 0),
            (MouseButton::Middle, true) => (MOUSEEVENTF_MIDDLEDOWN, 0),
            (MouseButton::Middle, false) => (MOUSEEVENTF_MIDDLEUP, 0),
            (MouseButton::X1, true) => (MOUSEEVENTF_XDOWN, XBUTTON1 as i32),
            (MouseButton::X1, false) => (MOUSEEVENTF_XUP, XBUTTON1 as i32),
            (MouseButton::X2, true) => (MOUSEEVENTF_XDOWN, XBUTTON2 as i32),
            (MouseButton::X2, false) => (MOUSEEVENTF_XUP, XBUTTON2 as i32),
        };
        self.send(Self::mouse_input(flags, 0, 0, data))
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        if dy != 0 {
            self.send(Self::mouse_input(MOUSEEVENTF_WHEEL, 0, 0, dy * WHEEL_DELTA))?;
        }
        if dx != 0 {
            self.send(Self::mouse_input(MOUSEEVENTF_HWHEEL, 0, 0, dx * WHEEL_DELTA))?;
        }
        Ok(())
    }

    fn key(&self, vk: u32, scan: u32, flags: u32, pressed: bool) -> Result<(), InjectionError> {
        let mut dw_flags = windows::Win32::UI::Input::KeyboardAndMouse::KEYBD_EVENT_FLAGS(0);
        if flags & FLAG_EXTENDED != 0 {
            dw_flags |= KEYEVENTF_EXTENDEDKEY;
        }
        if !pressed {
            dw_flags |= KEYEVENTF_KEYUP;
        }

        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk as u16),
                    wScan: scan as u16,
                    dwFlags: dw_flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        self.send(input)
    }
}
