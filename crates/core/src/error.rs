use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("target resolution failed: {0}")]
    Resolve(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("unexpected http status {status}")]
    UnexpectedStatus { status: u16 },
    #[error("producer closed")]
    Closed,
}

impl SdkError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SdkError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Format error details for log lines
    pub fn format_details(&self) -> String {
        match self {
            SdkError::Transport(te) => format!("transport error: {}", te.sanitized_message()),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network: {0}")]
    Network(String),
    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("body read error: {0}")]
    BodyRead(String),
    #[error("stream closed")]
    StreamClosed,
    #[error("other: {0}")]
    Other(String),
}

impl TransportError {
    pub fn invalid_url(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        TransportError::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Message safe for logs; URL errors keep only the reason.
    pub fn sanitized_message(&self) -> String {
        match self {
            TransportError::InvalidUrl { reason, .. } => format!("invalid url: {reason}"),
            _ => self.to_string(),
        }
    }

    /// Whether the failure happened before any response byte was read.
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            TransportError::Network(_)
                | TransportError::ConnectTimeout(_)
                | TransportError::InvalidUrl { .. }
        )
    }
}
