//! Recording injector for tests and non-Windows builds.

use std::sync::Mutex;

use mouseshare_core::domain::geometry::clamp_to_screen;
use mouseshare_core::protocol::event::MouseButton;

use super::{InjectionError, InputInjector};

/// An [`InputInjector`] that records every call instead of touching the OS.
pub struct MockInjector {
    screen_width: i32,
    screen_height: i32,
    moves: Mutex<Vec<(i32, i32)>>,
    buttons: Mutex<Vec<(MouseButton, bool)>>,
    scrolls: Mutex<Vec<(i32, i32)>>,
    keys: Mutex<Vec<(u32, u32, u32, bool)>>,
}

impl MockInjector {
    pub fn new(screen_width: i32, screen_height: i32) -> Self {
        Self {
            screen_width,
            screen_height,
            moves: Mutex::new(Vec::new()),
            buttons: Mutex::new(Vec::new()),
            scrolls: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn moves(&self) -> Vec<(i32, i32)> {
        self.moves.lock().unwrap().clone()
    }

    pub fn buttons(&self) -> Vec<(MouseButton, bool)> {
        self.buttons.lock().unwrap().clone()
    }

    pub fn scrolls(&self) -> Vec<(i32, i32)> {
        self.scrolls.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<(u32, u32, u32, bool)> {
        self.keys.lock().unwrap().clone()
    }
}

impl InputInjector for MockInjector {
    fn screen_size(&self) -> (i32, i32) {
        (self.screen_width, self.screen_height)
    }

    fn move_absolute(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        let clamped = clamp_to_screen(x, y, self.screen_width, self.screen_height);
        self.moves.lock().unwrap().push(clamped);
        Ok(())
    }

    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        let last = self.moves.lock().unwrap().last().copied().unwrap_or((
            self.screen_width / 2,
            self.screen_height / 2,
        ));
        self.move_absolute(last.0 + dx, last.1 + dy)
    }

    fn button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError> {
        self.buttons.lock().unwrap().push((button, pressed));
        Ok(())
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), InjectionError> {
        self.scrolls.lock().unwrap().push((dx, dy));
        Ok(())
    }

    fn key(&self, vk: u32, scan: u32, flags: u32, pressed: bool) -> Result<(), InjectionError> {
        self.keys.lock().unwrap().push((vk, scan, flags, pressed));
        Ok(())
    }
}
