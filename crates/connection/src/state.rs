use crate::sse_types::Event;
use std::fmt;

/// SSE connection state machine states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport connection is owned.
    #[default]
    Disconnected,
    /// Request issued, waiting for the response status.
    Connecting,
    /// Streaming the response body.
    Connected,
    /// Redirect status seen, waiting for its `location` header.
    Redirecting,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// True whenever a transport connection is owned.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Redirecting => "redirecting",
        };
        f.write_str(s)
    }
}

/// Why the current connection is being replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconnectReason {
    /// The server finished the response.
    StreamEnded,
    /// The transport reported an error.
    TransportError(String),
    /// Status was neither success nor redirect.
    UnexpectedStatus(u16),
    /// A redirect response ended without a `location` header.
    MissingLocation,
    /// A `location` header could not be turned into a URL.
    InvalidLocation(String),
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
    /// Requested by the caller.
    Refresh,
    /// The previous connection attempt did not get a request out.
    ConnectFailed,
}

impl fmt::Display for ReconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamEnded => f.write_str("stream ended"),
            Self::TransportError(e) => write!(f, "transport error: {e}"),
            Self::UnexpectedStatus(s) => write!(f, "unexpected status {s}"),
            Self::MissingLocation => f.write_str("redirect without location"),
            Self::InvalidLocation(l) => write!(f, "invalid redirect location '{l}'"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::Refresh => f.write_str("refresh requested"),
            Self::ConnectFailed => f.write_str("retrying failed connect"),
        }
    }
}

/// What the driver must do after a signal has been handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Next {
    Stay,
    Reconnect(ReconnectReason),
    /// Replace the connection with one to this absolute URL.
    Redirect(String),
}

/// Result of feeding one transport signal to the state machine.
#[derive(Debug, PartialEq, Eq)]
pub struct Outcome {
    /// False for signals from superseded requests; those must not re-arm the
    /// idle deadline.
    pub accepted: bool,
    /// Parsed events, in stream order.
    pub events: Vec<Event>,
    pub next: Next,
}

impl Outcome {
    pub(crate) fn stale() -> Self {
        Self {
            accepted: false,
            events: Vec::new(),
            next: Next::Stay,
        }
    }

    pub(crate) fn stay(events: Vec<Event>) -> Self {
        Self {
            accepted: true,
            events,
            next: Next::Stay,
        }
    }

    pub(crate) fn then(next: Next) -> Self {
        Self {
            accepted: true,
            events: Vec::new(),
            next,
        }
    }
}
