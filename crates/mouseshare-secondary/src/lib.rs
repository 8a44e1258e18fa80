//! MouseShare secondary host library.

pub mod application;
pub mod infrastructure;
