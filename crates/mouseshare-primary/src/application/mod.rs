//! Application layer: the primary-side focus state machine.

pub mod share_input;
