//! HTTP/1.1 transport on top of `hyper`'s connection API.
//!
//! One [`HyperHandle`] wraps one TCP (or TLS) connection. A request spawns a
//! reader task that forwards status, headers, body frames and completion as
//! [`TransportSignal`]s; awaiting each send on the bounded channel is what
//! stops the body from being read while the consumer is behind.

use crate::sse_core::error::TransportError;
use crate::sse_core::transport::{
    RequestIds, SignalKind, SignalSender, Transport, TransportConfig, TransportSignal,
};
use crate::sse_types::{Endpoint, RequestId};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, HOST};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use tokio::task::JoinHandle;
use tower_service::Service;
use tracing::{debug, trace};

const LOG_TARGET: &str = "sse_stream::transport::hyper";

pub struct HyperTransport {
    connector: HttpsConnector<HttpConnector>,
    cfg: TransportConfig,
    ids: RequestIds,
}

/// An open HTTP/1.1 connection and the request running on it, if any.
pub struct HyperHandle {
    endpoint: Endpoint,
    sender: http1::SendRequest<Empty<Bytes>>,
    connection: JoinHandle<()>,
    reader: Option<JoinHandle<()>>,
}

impl HyperHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl HyperTransport {
    /// Build a transport that trusts the platform's native root
    /// certificates.
    pub fn try_new(cfg: &TransportConfig) -> Result<Self, TransportError> {
        let connector = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|err| TransportError::Other(format!("native root store: {err}")))?
            .https_or_http()
            .enable_http1()
            .build();
        Ok(Self::with_connector(cfg, connector))
    }

    /// Like [`try_new`](Self::try_new), but falls back to an empty root store
    /// when the native certificates cannot be loaded. Plain `http` endpoints
    /// keep working; `https` ones fail their handshake.
    pub fn new(cfg: &TransportConfig) -> Self {
        match Self::try_new(cfg) {
            Ok(transport) => transport,
            Err(err) => {
                debug!(
                    target: LOG_TARGET,
                    error = %err,
                    "falling back to an empty root store after transport init failure"
                );
                Self::with_connector(cfg, Self::fallback_connector())
            }
        }
    }

    pub fn with_connector(cfg: &TransportConfig, connector: HttpsConnector<HttpConnector>) -> Self {
        Self {
            connector,
            cfg: cfg.clone(),
            ids: RequestIds::new(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.cfg
    }

    fn fallback_connector() -> HttpsConnector<HttpConnector> {
        let tls = rustls::ClientConfig::builder()
            .with_root_certificates(rustls::RootCertStore::empty())
            .with_no_client_auth();
        HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build()
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<HyperHandle, TransportError> {
        let uri: http::Uri = format!("{}://{}:{}", endpoint.scheme, endpoint.host, endpoint.port)
            .parse()
            .map_err(|err| TransportError::invalid_url(endpoint.to_string(), err))?;

        let mut connector = self.connector.clone();
        std::future::poll_fn(|cx| connector.poll_ready(cx))
            .await
            .map_err(|err| TransportError::Network(format!("connector not ready: {err}")))?;
        let io = connector
            .call(uri)
            .await
            .map_err(|err| TransportError::Network(format!("connect {endpoint}: {err}")))?;

        let (sender, conn) = http1::handshake(io)
            .await
            .map_err(|err| TransportError::Network(format!("handshake {endpoint}: {err}")))?;
        let peer = endpoint.to_string();
        let connection = tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!(target: LOG_TARGET, peer = %peer, error = %err, "connection ended with error");
            }
        });

        Ok(HyperHandle {
            endpoint: endpoint.clone(),
            sender,
            connection,
            reader: None,
        })
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

#[async_trait]
impl Transport for HyperTransport {
    type Handle = HyperHandle;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Handle, TransportError> {
        let timeout = self.cfg.connect_timeout;
        match tokio::time::timeout(timeout, self.open(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout(timeout)),
        }
    }

    async fn request(
        &self,
        handle: &mut Self::Handle,
        method: &http::Method,
        path: &str,
        headers: &[(String, String)],
        signals: SignalSender,
    ) -> Result<RequestId, TransportError> {
        let mut req = http::Request::builder()
            .method(method.clone())
            .uri(path)
            .body(Empty::<Bytes>::new())
            .map_err(|err| TransportError::invalid_url(path, err))?;
        let authority = HeaderValue::from_str(&handle.endpoint.authority())
            .map_err(|err| TransportError::invalid_url(handle.endpoint.to_string(), err))?;
        req.headers_mut().insert(HOST, authority);
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::Other(format!("invalid header name '{name}': {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::Other(format!("invalid value for header '{name}': {err}")))?;
            req.headers_mut().append(name, value);
        }

        handle
            .sender
            .ready()
            .await
            .map_err(|err| TransportError::Network(format!("connection not ready: {err}")))?;

        let request_id = self.ids.next_id();
        trace!(
            target: LOG_TARGET,
            request_id = %request_id,
            method = %method,
            endpoint = %handle.endpoint,
            path,
            "issuing request"
        );
        let response = handle.sender.send_request(req);
        let reader = tokio::spawn(async move {
            let response = match response.await {
                Ok(response) => response,
                Err(err) => {
                    let err = TransportError::Network(err.to_string());
                    emit(&signals, request_id, SignalKind::Error(err)).await;
                    return;
                }
            };

            let status = response.status().as_u16();
            if !emit(&signals, request_id, SignalKind::Status(status)).await {
                return;
            }
            let pairs = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
                .collect::<Vec<_>>();
            if !emit(&signals, request_id, SignalKind::Headers(pairs)).await {
                return;
            }

            let mut body = response.into_body();
            loop {
                let kind = match body.frame().await {
                    None => SignalKind::Done,
                    Some(Err(err)) => SignalKind::Error(TransportError::BodyRead(err.to_string())),
                    Some(Ok(frame)) => match frame.into_data() {
                        Ok(chunk) if !chunk.is_empty() => SignalKind::Data(chunk),
                        // Trailers and empty frames carry nothing for the parser.
                        _ => continue,
                    },
                };
                let last = matches!(kind, SignalKind::Done | SignalKind::Error(_));
                if !emit(&signals, request_id, kind).await || last {
                    return;
                }
            }
        });

        if let Some(previous) = handle.reader.replace(reader) {
            previous.abort();
        }
        Ok(request_id)
    }

    fn close(&self, handle: Self::Handle) {
        if let Some(reader) = &handle.reader {
            reader.abort();
        }
        handle.connection.abort();
        trace!(target: LOG_TARGET, endpoint = %handle.endpoint, "connection closed");
    }

    fn is_open_for_read(&self, handle: &Self::Handle) -> bool {
        match &handle.reader {
            Some(reader) => !reader.is_finished(),
            None => !handle.connection.is_finished(),
        }
    }
}

/// Forward one signal; false once the receiving side is gone.
async fn emit(signals: &SignalSender, request_id: RequestId, kind: SignalKind) -> bool {
    signals
        .send(TransportSignal::new(request_id, kind))
        .await
        .is_ok()
}

#[cfg(test)]
#[path = "../tests/end_to_end_tests.rs"]
mod end_to_end_tests;
