//! Async Stream support for SSE parsing

use crate::sse_types::Event;
use crate::sse_streaming::StreamBuffer;
use bytes::Bytes;
use futures_core::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Adapter that turns a byte stream into an SSE event stream
///
/// A partial block left over when the inner stream ends is dropped, the same
/// way a live connection discards it on reconnect.
pub struct SseStream<S> {
    inner: S,
    buffer: StreamBuffer,
    pending_events: VecDeque<Event>,
}

impl<S> SseStream<S> {
    /// Create a new SSE stream from a byte stream
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: StreamBuffer::new(),
            pending_events: VecDeque::new(),
        }
    }

    /// Bytes buffered for a block that has not completed yet.
    pub fn remainder(&self) -> &[u8] {
        self.buffer.remainder()
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Event, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // First, yield any pending events from previous chunks
            if let Some(event) = self.pending_events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    let events = self.buffer.push_events(&chunk);
                    self.pending_events.extend(events);
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extension trait for byte streams to easily convert to SSE streams
pub trait SseStreamExt: Stream {
    /// Convert this byte stream into an SSE event stream
    fn into_sse_stream(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}
