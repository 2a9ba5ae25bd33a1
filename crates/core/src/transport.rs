use crate::sse_core::error::TransportError;
use crate::sse_types::{Endpoint, RequestId};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// TCP (and TLS) connect timeout
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// What happened on a request, in the order it happened.
#[derive(Debug)]
pub enum SignalKind {
    Status(u16),
    Headers(Vec<(String, String)>),
    Data(Bytes),
    /// The server finished the response body.
    Done,
    Error(TransportError),
}

/// A transport event tagged with the request it belongs to.
#[derive(Debug)]
pub struct TransportSignal {
    pub request_id: RequestId,
    pub kind: SignalKind,
}

impl TransportSignal {
    pub fn new(request_id: RequestId, kind: SignalKind) -> Self {
        Self { request_id, kind }
    }
}

pub type SignalSender = mpsc::Sender<TransportSignal>;
pub type SignalReceiver = mpsc::Receiver<TransportSignal>;

/// Monotonic request id allocator shared by transport implementations.
#[derive(Debug, Default)]
pub struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Connection-level HTTP transport.
///
/// `request` returns as soon as the request is issued; status, headers, body
/// chunks and completion are then pushed to `signals` in arrival order, each
/// tagged with the returned [`RequestId`]. A sender that is full must make the
/// transport stop reading the body until capacity frees up.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Exclusively owned connection handle.
    type Handle: Send + 'static;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Handle, TransportError>;

    async fn request(
        &self,
        handle: &mut Self::Handle,
        method: &http::Method,
        path: &str,
        headers: &[(String, String)],
        signals: SignalSender,
    ) -> Result<RequestId, TransportError>;

    /// Release the connection. No signal for its requests is delivered after
    /// this returns, except ones already queued in the channel.
    fn close(&self, handle: Self::Handle);

    fn is_open_for_read(&self, handle: &Self::Handle) -> bool;
}

#[async_trait]
impl<T: Transport> Transport for Arc<T> {
    type Handle = T::Handle;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Handle, TransportError> {
        (**self).connect(endpoint).await
    }

    async fn request(
        &self,
        handle: &mut Self::Handle,
        method: &http::Method,
        path: &str,
        headers: &[(String, String)],
        signals: SignalSender,
    ) -> Result<RequestId, TransportError> {
        (**self)
            .request(handle, method, path, headers, signals)
            .await
    }

    fn close(&self, handle: Self::Handle) {
        (**self).close(handle)
    }

    fn is_open_for_read(&self, handle: &Self::Handle) -> bool {
        (**self).is_open_for_read(handle)
    }
}
