//! User-visible status reporting.
//!
//! The shell (tray UI, console banner) polls this instead of reaching into
//! controller internals. Writers push one-line status strings; the latest
//! one is kept alongside the observable focus and session flags.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::application::share_input::{FocusController, FocusState};

/// Shared status cell.
pub struct AppStatus {
    focus: Arc<AtomicU8>,
    session_open: AtomicBool,
    line: Mutex<String>,
}

/// Point-in-time view for the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub focus: FocusState,
    pub session_open: bool,
    pub line: String,
}

impl AppStatus {
    /// `focus` is the cell published by the focus controller.
    pub fn new(focus: Arc<AtomicU8>) -> Self {
        Self {
            focus,
            session_open: AtomicBool::new(false),
            line: Mutex::new("starting".to_string()),
        }
    }

    pub fn set_session_open(&self, open: bool) {
        self.session_open.store(open, Ordering::Relaxed);
    }

    /// Stores and logs a status line.
    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        info!("{line}");
        *self.line.lock().expect("status lock poisoned") = line;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            focus: FocusController::read_state(&self.focus),
            session_open: self.session_open.load(Ordering::Relaxed),
            line: self.line.lock().expect("status lock poisoned").clone(),
        }
    }
}
