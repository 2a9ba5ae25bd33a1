//! Demand-gated event producer
//!
//! [`EventProducer::start`] spawns one driver task per client. Nothing
//! connects until the consumer signals demand: polling the returned
//! [`EventStream`] or calling [`ProducerHandle::demand`]. From then on the
//! driver keeps a stream open indefinitely and forwards parsed events in
//! order through a bounded channel, so a slow consumer holds back the HTTP
//! body instead of growing a buffer.

mod driver;
pub mod handle;

pub use handle::{EventStream, ProducerCommand, ProducerHandle, ProducerStatus};

use crate::sse_connection::Connection;
use crate::sse_core::error::SdkError;
use crate::sse_core::transport::Transport;
use crate::sse_core::ClientConfig;
use crate::sse_types::Target;
use driver::Driver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};

/// Entry point for SSE producers.
pub struct EventProducer;

impl EventProducer {
    /// Validate `config` and spawn the driver task on the current Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidArgument`] when the configuration is
    /// invalid (no target, zero capacities) or no runtime is available.
    pub fn start<T: Transport>(
        config: ClientConfig,
        transport: T,
    ) -> Result<(ProducerHandle, EventStream), SdkError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SdkError::invalid_argument("EventProducer::start must be called within a Tokio runtime")
        })?;

        let (signal_tx, signal_rx) = mpsc::channel(config.signal_channel_capacity);
        let conn = Connection::new(transport, &config, signal_tx)?;
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_channel_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (status_tx, status_rx) = watch::channel(ProducerStatus::default());
        let demand = Arc::new(Notify::new());

        runtime.spawn(
            Driver {
                conn,
                signal_rx,
                cmd_rx,
                event_tx,
                demand: Arc::clone(&demand),
                status_tx,
                reconnect_delay: config.reconnect_delay,
            }
            .run(),
        );

        let handle = ProducerHandle {
            cmd_tx,
            demand: Arc::clone(&demand),
            status_rx,
        };
        let stream = EventStream {
            rx: event_rx,
            demand,
        };
        Ok((handle, stream))
    }

    pub fn builder() -> ProducerBuilder {
        ProducerBuilder::new()
    }
}

/// Chainable front end over [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProducerBuilder {
    config: ClientConfig,
}

impl ProducerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.config = self.config.target(target);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.header(name, value);
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config = self.config.headers(headers);
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.idle_timeout(timeout);
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.reconnect_delay(delay);
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.event_channel_capacity(capacity);
        self
    }

    pub fn signal_channel_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.signal_channel_capacity(capacity);
        self
    }

    pub fn command_channel_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.command_channel_capacity(capacity);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn start<T: Transport>(self, transport: T) -> Result<(ProducerHandle, EventStream), SdkError> {
        EventProducer::start(self.config, transport)
    }
}

#[cfg(test)]
#[path = "../tests/producer_tests.rs"]
mod producer_tests;
