use crate::sse_connection::ConnectionState;
use crate::sse_core::error::SdkError;
use crate::sse_types::Event;
use futures_core::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch, Notify};

/// Control commands sent from [`ProducerHandle`] to the driver task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerCommand {
    /// Drop the current connection and connect again.
    Refresh,
    /// Stop the producer and release the transport.
    Close,
}

/// Snapshot of the driver, published after every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerStatus {
    pub state: ConnectionState,
    /// Last URL that answered with a 2xx status.
    pub connected_url: Option<String>,
    /// Connection attempts made after the first one.
    pub reconnects: u64,
    /// Set once the driver has stopped.
    pub stopped: bool,
}

/// Clone-able handle for controlling a running producer.
#[derive(Clone)]
pub struct ProducerHandle {
    pub(crate) cmd_tx: mpsc::Sender<ProducerCommand>,
    pub(crate) demand: Arc<Notify>,
    pub(crate) status_rx: watch::Receiver<ProducerStatus>,
}

impl ProducerHandle {
    /// Signal that the consumer is ready for events. Starts the connection
    /// when none exists yet; otherwise a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Closed`] if the producer has stopped.
    pub fn demand(&self) -> Result<(), SdkError> {
        if self.cmd_tx.is_closed() {
            return Err(SdkError::Closed);
        }
        self.demand.notify_one();
        Ok(())
    }

    /// Force a fresh connection, e.g. when the server went quiet without
    /// closing the socket.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Closed`] if the producer has stopped.
    pub async fn refresh(&self) -> Result<(), SdkError> {
        self.cmd_tx
            .send(ProducerCommand::Refresh)
            .await
            .map_err(|_| SdkError::Closed)
    }

    /// Stop the producer. The event stream ends once buffered events are
    /// drained.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Closed`] if the producer has already stopped.
    pub async fn close(&self) -> Result<(), SdkError> {
        self.cmd_tx
            .send(ProducerCommand::Close)
            .await
            .map_err(|_| SdkError::Closed)
    }

    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    pub fn state(&self) -> ConnectionState {
        self.status_rx.borrow().state
    }

    pub fn connected_url(&self) -> Option<String> {
        self.status_rx.borrow().connected_url.clone()
    }

    pub fn status(&self) -> ProducerStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch every published [`ProducerStatus`].
    pub fn subscribe_state(&self) -> watch::Receiver<ProducerStatus> {
        self.status_rx.clone()
    }
}

/// Ordered stream of parsed events.
///
/// Polling an empty stream signals demand, so the first `next_event` call
/// starts the connection.
pub struct EventStream {
    pub(crate) rx: mpsc::Receiver<Event>,
    pub(crate) demand: Arc<Notify>,
}

impl EventStream {
    /// Receive the next event, waiting until one is available. Returns `None`
    /// once the producer has stopped.
    pub async fn next_event(&mut self) -> Option<Event> {
        std::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    /// Signal demand without waiting for an event.
    pub fn demand(&self) {
        self.demand.notify_one();
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        match self.rx.poll_recv(cx) {
            Poll::Pending => {
                self.demand.notify_one();
                Poll::Pending
            }
            ready => ready,
        }
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_event(cx)
    }
}
