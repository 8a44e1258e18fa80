//! MouseShare primary host library.
//!
//! The binary in `main.rs` wires these layers together; everything here is
//! also reachable from integration tests.

pub mod application;
pub mod infrastructure;
