//! Synthetic input injection.
//!
//! Each call produces exactly one OS input event, indistinguishable from
//! hardware as far as applications are concerned. Platform back ends live
//! behind the [`InputInjector`] trait; tests and non-Windows builds use
//! [`mock::MockInjector`].

use thiserror::Error;

use mouseshare_core::protocol::event::MouseButton;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Keyboard flags bit marking an extended key (right-side modifiers, arrow
/// cluster, numpad Enter). Must survive the trip from interceptor to
/// injector verbatim.
pub const FLAG_EXTENDED: u32 = 0x01;

/// Error type for injection operations.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// The injector could not determine the screen metrics it needs.
    /// Fatal at startup.
    #[error("injector initialisation failed: {0}")]
    Init(String),
    /// The OS rejected a synthetic event.
    #[error("synthetic event rejected: {0}")]
    Inject(String),
}

/// Platform-agnostic injection surface.
pub trait InputInjector: Send + Sync {
    /// Local screen dimensions in pixels.
    fn screen_size(&self) -> (i32, i32);

    /// Moves the cursor to an absolute position, clamped to the screen.
    /// Uses absolute-coordinate injection where the OS offers it, so
    /// pointer-acceleration curves do not distort replayed motion.
    fn move_absolute(&self, x: i32, y: i32) -> Result<(), InjectionError>;

    /// Moves the cursor by a relative delta.
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectionError>;

    fn button(&self, button: MouseButton, pressed: bool) -> Result<(), InjectionError>;

    /// Scrolls by whole wheel notches; negative is down/left.
    fn scroll(&self, dx: i32, dy: i32) -> Result<(), InjectionError>;

    /// Injects a key event, preserving the extended-key bit in `flags`.
    fn key(&self, vk: u32, scan: u32, flags: u32, pressed: bool) -> Result<(), InjectionError>;
}
