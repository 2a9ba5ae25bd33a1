use crate::sse_core::error::TransportError;
use crate::sse_types::{Endpoint, Scheme};
use url::Url;

/// A URL broken down into what the transport needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub url: Url,
    pub endpoint: Endpoint,
    /// Path plus `?query` when present, `/` when the URL has no path.
    pub path: String,
}

impl ResolvedTarget {
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let url = Url::parse(raw.trim()).map_err(|e| TransportError::invalid_url(raw, e))?;
        Self::from_url(url)
    }

    pub fn from_url(url: Url) -> Result<Self, TransportError> {
        let scheme = Scheme::parse(url.scheme()).ok_or_else(|| {
            TransportError::invalid_url(url.as_str(), format!("unsupported scheme '{}'", url.scheme()))
        })?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TransportError::invalid_url(url.as_str(), "missing host"))?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        let path = request_path(&url);

        Ok(Self {
            endpoint: Endpoint { scheme, host, port },
            path,
            url,
        })
    }

    /// Resolve a `location` header value against this URL.
    pub fn join(&self, location: &str) -> Result<Self, TransportError> {
        let next = self
            .url
            .join(location.trim())
            .map_err(|e| TransportError::invalid_url(location, e))?;
        Self::from_url(next)
    }
}

fn request_path(url: &Url) -> String {
    let path = if url.path().is_empty() { "/" } else { url.path() };
    match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}
