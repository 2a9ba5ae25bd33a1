//! Shared value types for the SSE client
//!
//! These types cross component boundaries: the parser creates [`Event`]s, the
//! connection resolves [`Target`]s into [`Endpoint`]s, and transports tag
//! every signal with a [`RequestId`].

use std::fmt;
use std::sync::Arc;

/// Boxed error returned by deferred target resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Event name used when a block carries no `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One fully parsed Server-Sent Event.
///
/// `data` holds every `data:` line of the block, each followed by `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    event_name: String,
    data: String,
}

impl Event {
    pub(crate) fn new(event_name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            data: data.into(),
        }
    }

    /// The `event:` name, `"message"` when absent.
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Accumulated `data:` payload including the trailing newline.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Payload without the trailing newline added by the last `data:` line.
    pub fn data_trimmed(&self) -> &str {
        self.data.strip_suffix('\n').unwrap_or(&self.data)
    }

    /// Consume the event, returning `(event_name, data)`.
    pub fn into_parts(self) -> (String, String) {
        (self.event_name, self.data)
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_NAME, String::new())
    }
}

/// Where to connect.
///
/// A resolver is evaluated on every connection attempt, so the destination
/// may change between reconnects (for example after a service discovery
/// lookup).
#[derive(Clone)]
pub enum Target {
    Literal(String),
    Resolver(Arc<dyn Fn() -> Result<String, BoxError> + Send + Sync>),
}

impl Target {
    pub fn literal(url: impl Into<String>) -> Self {
        Target::Literal(url.into())
    }

    /// Build a deferred target; any arguments are captured by the closure.
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn() -> Result<String, BoxError> + Send + Sync + 'static,
    {
        Target::Resolver(Arc::new(f))
    }

    /// Produce the URL to use for the next connection attempt.
    pub fn resolve(&self) -> Result<String, BoxError> {
        match self {
            Target::Literal(url) => Ok(url.clone()),
            Target::Resolver(f) => f(),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Literal(url) => f.debug_tuple("Literal").field(url).finish(),
            Target::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl From<&str> for Target {
    fn from(url: &str) -> Self {
        Target::literal(url)
    }
}

impl From<String> for Target {
    fn from(url: String) -> Self {
        Target::Literal(url)
    }
}

/// Correlates transport signals with the request that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("http") {
            Some(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Some(Scheme::Https)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network destination handed to [`Transport::connect`](crate::sse_core::transport::Transport::connect).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Value for the `Host` request header; the port is omitted when it is the
    /// scheme default.
    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
