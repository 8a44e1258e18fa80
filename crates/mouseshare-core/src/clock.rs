//! Process-monotonic millisecond clock.
//!
//! Frame timestamps are diagnostic, not authoritative, so all that matters
//! is that they come from a monotonic source local to the sender. The epoch
//! is the first call in the process.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds elapsed since the first call in this process.
pub fn now_ms() -> u64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// The `u32` wire form of [`now_ms`]; wraps after ~49.7 days.
pub fn wire_timestamp() -> u32 {
    now_ms() as u32
}
