use crate::sse_core::error::SdkError;
use crate::sse_types::Target;
use std::time::Duration;

/// Configuration for one SSE client instance.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Where to connect; required.
    pub target: Option<Target>,
    /// Extra request headers, sent after `Accept: text/event-stream`.
    pub headers: Vec<(String, String)>,
    /// Maximum silence between transport signals before a forced reconnect.
    pub idle_timeout: Option<Duration>,
    /// Capacity of the parsed event channel towards the consumer
    pub event_channel_capacity: usize,
    /// Capacity of the raw transport signal channel
    pub signal_channel_capacity: usize,
    /// Capacity of the demand/refresh/close command channel
    pub command_channel_capacity: usize,
    /// Pause before retrying after a failed connection attempt (zero = none)
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target: None,
            headers: Vec::new(),
            idle_timeout: None,
            event_channel_capacity: 64,
            signal_channel_capacity: 64,
            command_channel_capacity: 16,
            reconnect_delay: Duration::ZERO,
        }
    }
}

impl ClientConfig {
    pub fn new(target: impl Into<Target>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn signal_channel_capacity(mut self, capacity: usize) -> Self {
        self.signal_channel_capacity = capacity;
        self
    }

    pub fn command_channel_capacity(mut self, capacity: usize) -> Self {
        self.command_channel_capacity = capacity;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Check construction-time requirements.
    pub fn validate(&self) -> Result<(), SdkError> {
        if self.target.is_none() {
            return Err(SdkError::invalid_argument("target is required"));
        }
        if let Some(Target::Literal(url)) = &self.target {
            if url.trim().is_empty() {
                return Err(SdkError::invalid_argument("target url must not be empty"));
            }
        }
        if matches!(self.idle_timeout, Some(t) if t.is_zero()) {
            return Err(SdkError::invalid_argument("idle timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(SdkError::invalid_argument(
                "event channel capacity must be > 0",
            ));
        }
        if self.signal_channel_capacity == 0 {
            return Err(SdkError::invalid_argument(
                "signal channel capacity must be > 0",
            ));
        }
        if self.command_channel_capacity == 0 {
            return Err(SdkError::invalid_argument(
                "command channel capacity must be > 0",
            ));
        }
        for (name, _) in &self.headers {
            if http::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(SdkError::invalid_argument(format!(
                    "invalid header name '{name}'"
                )));
            }
        }
        Ok(())
    }
}
