//! Feed-level tests
//!
//! `state_machine_test` drives the feed against scripted transports on a
//! paused clock. `end_to_end_test` runs it against the real dev server.

mod common;
mod state_machine_test;
