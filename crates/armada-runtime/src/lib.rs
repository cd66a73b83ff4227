//! Endpoint client contract for Armada fleets.
//!
//! An endpoint is one remote container engine. This crate defines the
//! `EndpointClient` trait every engine implementation satisfies, the
//! container/image descriptors it returns, the `OutputSink` shared by
//! concurrent build output, and an in-memory `MockClient` with latency,
//! failure, and panic injection for tests and stress runs.

pub mod client;
pub mod mock;
pub mod output;

pub use client::{
    connect_endpoint, ContainerInfo, ContainerState, EndpointClient, ImageInfo, Operation,
};
pub use mock::{MockClient, RecordedCall};
pub use output::{CapturedOutput, OutputSink};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no client available for endpoint '{0}'")]
    UnsupportedEndpoint(String),
    #[error("failed to connect to endpoint '{endpoint}': {reason}")]
    ConnectionFailed { endpoint: String, reason: String },
    #[error("image not found: {0}")]
    ImageNotFound(String),
    /// Error reported by the engine itself; the message is passed through as-is.
    #[error("{0}")]
    Engine(String),
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: Operation, secs: u64 },
    #[error("client panicked during {operation}: {message}")]
    ClientPanicked {
        operation: Operation,
        message: String,
    },
}
