//! Connection/reconnection state machine
//!
//! [`Connection`] owns at most one transport connection. It resolves the
//! target on every attempt, follows redirects, feeds body chunks through the
//! [`StreamBuffer`](crate::sse_streaming::StreamBuffer), and tells its driver
//! when to reconnect. There is no terminal failure state: every error maps to
//! [`Next::Reconnect`].

pub mod machine;
pub mod state;
pub mod target;

pub use machine::Connection;
pub use state::{ConnectionState, Next, Outcome, ReconnectReason};
pub use target::ResolvedTarget;

#[cfg(test)]
#[path = "../tests/state_machine_tests.rs"]
mod state_machine_tests;
