#[path = "../crates/sse-types/src/lib.rs"]
pub mod types;
#[path = "../crates/core/src/lib.rs"]
pub mod core;
#[path = "../crates/streaming-sse/src/lib.rs"]
pub mod streaming_sse;
#[path = "../crates/connection/src/lib.rs"]
pub mod connection;
#[path = "../crates/producer/src/lib.rs"]
pub mod producer;
#[path = "../crates/transports/hyper/src/lib.rs"]
pub mod transport_hyper;

pub mod transports {
    pub use crate::transport_hyper as hyper;
}

pub use crate::connection::{ConnectionState, ReconnectReason};
pub use crate::core::{ClientConfig, Event, SdkError, Target, TransportConfig, TransportError};
pub use crate::producer::{
    EventProducer, EventStream, ProducerBuilder, ProducerHandle, ProducerStatus,
};
pub use crate::transport_hyper::HyperTransport;

pub(crate) use crate::connection as sse_connection;
pub(crate) use crate::core as sse_core;
pub(crate) use crate::producer as sse_producer;
pub(crate) use crate::streaming_sse as sse_streaming;
pub(crate) use crate::transport_hyper as hyper_transport;
pub(crate) use crate::types as sse_types;
