pub mod config;
pub mod error;
pub mod transport;

pub use config::ClientConfig;
pub use error::{SdkError, TransportError};
pub use transport::{
    SignalKind, SignalReceiver, SignalSender, Transport, TransportConfig, TransportSignal,
};

// Convenience re-exports of common types
pub use crate::sse_types::{Endpoint, Event, RequestId, Scheme, Target};

#[cfg(test)]
#[path = "../tests/config_tests.rs"]
mod config_tests;

#[cfg(test)]
#[path = "../tests/mock_transport.rs"]
pub(crate) mod mock_transport;
