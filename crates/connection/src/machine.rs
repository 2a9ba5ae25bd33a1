use crate::sse_connection::state::{ConnectionState, Next, Outcome, ReconnectReason};
use crate::sse_connection::target::ResolvedTarget;
use crate::sse_core::error::SdkError;
use crate::sse_core::transport::{SignalKind, SignalSender, Transport, TransportSignal};
use crate::sse_core::ClientConfig;
use crate::sse_streaming::StreamBuffer;
use crate::sse_types::{RequestId, Target};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const LOG_TARGET: &str = "sse_stream::connection";

/// Handle and request id always travel together.
struct Active<H> {
    handle: H,
    request_id: RequestId,
}

/// Owns one transport connection at a time and turns its signals into
/// events.
///
/// Signal handling is synchronous; only [`connect`](Self::connect),
/// [`redirect`](Self::redirect) and [`follow`](Self::follow) touch the
/// network.
pub struct Connection<T: Transport> {
    transport: T,
    target: Target,
    extra_headers: Vec<(String, String)>,
    idle_timeout: Option<Duration>,
    signals: SignalSender,
    active: Option<Active<T::Handle>>,
    state: ConnectionState,
    current: Option<ResolvedTarget>,
    connected_url: Option<String>,
    buffer: StreamBuffer,
    generation: u64,
}

impl<T: Transport> Connection<T> {
    /// `signals` is handed to the transport with every request; the caller
    /// keeps the receiving end and feeds it back through
    /// [`handle_signal`](Self::handle_signal).
    pub fn new(transport: T, config: &ClientConfig, signals: SignalSender) -> Result<Self, SdkError> {
        let target = config
            .target
            .clone()
            .ok_or_else(|| SdkError::invalid_argument("target is required"))?;
        Ok(Self {
            transport,
            target,
            extra_headers: config.headers.clone(),
            idle_timeout: config.idle_timeout,
            signals,
            active: None,
            state: ConnectionState::Disconnected,
            current: None,
            connected_url: None,
            buffer: StreamBuffer::new(),
            generation: 0,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn redirecting(&self) -> bool {
        self.state == ConnectionState::Redirecting
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.active.as_ref().map(|a| a.request_id)
    }

    /// Last URL that answered with a 2xx status.
    pub fn connected_url(&self) -> Option<&str> {
        self.connected_url.as_deref()
    }

    /// URL of the request in flight, if any.
    pub fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.url.as_str())
    }

    /// Bytes held for an incomplete block.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Changes every time the connection is opened or torn down; tags idle
    /// deadlines so a late one can be recognised.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Idle timeout to arm, if one is configured and a connection is owned.
    pub fn idle_deadline(&self) -> Option<Duration> {
        self.idle_timeout.filter(|_| self.active.is_some())
    }

    pub fn is_open_for_read(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| self.transport.is_open_for_read(&a.handle))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve the configured target afresh and open a connection to it.
    pub async fn connect(&mut self) -> Result<(), SdkError> {
        self.disconnect();
        let raw = self
            .target
            .resolve()
            .map_err(|e| SdkError::Resolve(e.to_string()))?;
        let resolved = ResolvedTarget::parse(&raw)?;
        self.open(resolved).await
    }

    /// Open a connection to an absolute redirect location.
    pub async fn redirect(&mut self, location: &str) -> Result<(), SdkError> {
        self.disconnect();
        let resolved = ResolvedTarget::parse(location)?;
        self.open(resolved).await
    }

    /// Carry out the step returned by a handler.
    pub async fn follow(&mut self, next: Next) -> Result<(), SdkError> {
        match next {
            Next::Stay => Ok(()),
            Next::Reconnect(reason) => {
                debug!(target: LOG_TARGET, %reason, "SSE reconnecting");
                self.connect().await
            }
            Next::Redirect(location) => {
                debug!(target: LOG_TARGET, %location, "SSE following redirect");
                self.redirect(&location).await
            }
        }
    }

    async fn open(&mut self, resolved: ResolvedTarget) -> Result<(), SdkError> {
        let mut headers = Vec::with_capacity(self.extra_headers.len() + 1);
        headers.push(("Accept".to_string(), "text/event-stream".to_string()));
        headers.extend(self.extra_headers.iter().cloned());

        info!(target: LOG_TARGET, url = %resolved.url, "SSE connecting");
        let mut handle = self.transport.connect(&resolved.endpoint).await?;
        let request_id = match self
            .transport
            .request(
                &mut handle,
                &http::Method::GET,
                &resolved.path,
                &headers,
                self.signals.clone(),
            )
            .await
        {
            Ok(id) => id,
            Err(err) => {
                self.transport.close(handle);
                return Err(err.into());
            }
        };

        self.generation = self.generation.wrapping_add(1);
        self.active = Some(Active { handle, request_id });
        self.state = ConnectionState::Connecting;
        self.current = Some(resolved);
        Ok(())
    }

    /// Release the transport and reset per-connection state. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            trace!(target: LOG_TARGET, request_id = %active.request_id, "closing transport");
            self.transport.close(active.handle);
            self.generation = self.generation.wrapping_add(1);
        }
        self.buffer.clear();
        self.current = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Feed one transport signal through the state machine.
    pub fn handle_signal(&mut self, signal: TransportSignal) -> Outcome {
        if self.request_id() != Some(signal.request_id) {
            trace!(
                target: LOG_TARGET,
                request_id = %signal.request_id,
                "dropping signal from superseded request"
            );
            return Outcome::stale();
        }

        match (self.state, signal.kind) {
            (_, SignalKind::Error(err)) => {
                error!(target: LOG_TARGET, error = %err, url = ?self.current_url(), "SSE transport error");
                self.disconnect();
                Outcome::then(Next::Reconnect(ReconnectReason::TransportError(
                    err.sanitized_message(),
                )))
            }
            (ConnectionState::Connecting, SignalKind::Status(status)) => self.on_status(status),
            (state, SignalKind::Status(status)) => {
                debug!(target: LOG_TARGET, %state, status, "ignoring repeated status");
                Outcome::stay(Vec::new())
            }
            (ConnectionState::Redirecting, SignalKind::Headers(headers)) => {
                self.on_redirect_headers(&headers)
            }
            (_, SignalKind::Headers(_)) => Outcome::stay(Vec::new()),
            (ConnectionState::Connected, SignalKind::Data(chunk)) => {
                let events = self.buffer.push_events(&chunk);
                if !events.is_empty() {
                    debug!(target: LOG_TARGET, count = events.len(), "parsed SSE blocks");
                }
                Outcome::stay(events)
            }
            (state, SignalKind::Data(chunk)) => {
                debug!(target: LOG_TARGET, %state, bytes = chunk.len(), "discarding body data");
                Outcome::stay(Vec::new())
            }
            (ConnectionState::Redirecting, SignalKind::Done) => {
                warn!(target: LOG_TARGET, url = ?self.current_url(), "redirect response ended without location");
                self.disconnect();
                Outcome::then(Next::Reconnect(ReconnectReason::MissingLocation))
            }
            (_, SignalKind::Done) => {
                warn!(target: LOG_TARGET, url = ?self.current_url(), "SSE stream ended");
                self.disconnect();
                Outcome::then(Next::Reconnect(ReconnectReason::StreamEnded))
            }
        }
    }

    fn on_status(&mut self, status: u16) -> Outcome {
        if (200..300).contains(&status) {
            self.connected_url = self.current_url().map(str::to_string);
            info!(target: LOG_TARGET, url = ?self.connected_url, status, "SSE connection established");
            self.state = ConnectionState::Connected;
            Outcome::stay(Vec::new())
        } else if is_redirect(status) {
            debug!(target: LOG_TARGET, status, "SSE redirect status");
            self.state = ConnectionState::Redirecting;
            Outcome::stay(Vec::new())
        } else {
            warn!(target: LOG_TARGET, url = ?self.current_url(), status, "unexpected SSE response status");
            self.disconnect();
            Outcome::then(Next::Reconnect(ReconnectReason::UnexpectedStatus(status)))
        }
    }

    fn on_redirect_headers(&mut self, headers: &[(String, String)]) -> Outcome {
        let Some((_, location)) = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("location"))
        else {
            return Outcome::stay(Vec::new());
        };

        let joined = match &self.current {
            Some(current) => current.join(location),
            None => ResolvedTarget::parse(location),
        };
        self.disconnect();
        match joined {
            Ok(next) => Outcome::then(Next::Redirect(next.url.to_string())),
            Err(err) => {
                warn!(target: LOG_TARGET, error = %err, "invalid redirect location");
                Outcome::then(Next::Reconnect(ReconnectReason::InvalidLocation(
                    location.clone(),
                )))
            }
        }
    }

    /// React to an idle deadline armed for `generation`. A deadline from an
    /// earlier generation is ignored.
    pub fn on_idle_timeout(&mut self, generation: u64) -> Next {
        if self.active.is_none() || generation != self.generation {
            trace!(target: LOG_TARGET, generation, "ignoring stale idle deadline");
            return Next::Stay;
        }
        warn!(target: LOG_TARGET, url = ?self.current_url(), "SSE idle timeout");
        self.disconnect();
        Next::Reconnect(ReconnectReason::IdleTimeout)
    }

    /// Drop the current connection on request.
    pub fn refresh(&mut self) -> Next {
        warn!(target: LOG_TARGET, url = ?self.current_url(), "SSE refresh requested");
        self.disconnect();
        Next::Reconnect(ReconnectReason::Refresh)
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}
