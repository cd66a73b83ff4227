//! Fleet-wide orchestration for Armada.
//!
//! This crate fans one logical operation (deploy, clean, build, run, list)
//! out to every endpoint of an `EndpointGroup` concurrently and folds the
//! per-endpoint outcomes into a single answer: the failures, and for list
//! operations the flattened values. A failing endpoint never aborts its
//! siblings; the caller decides what a partial failure means.

pub mod dispatch;
pub mod group;
pub mod outcome;

pub use dispatch::dispatch;
pub use group::EndpointGroup;
pub use outcome::{
    collect_failures, collect_listing, failed_endpoints, DispatchResult, EndpointFailure,
    GroupListing,
};

use armada_runtime::RuntimeError;
use armada_schema::{EndpointId, SchemaError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Schema(#[from] SchemaError),
    #[error("failed to initialize client for endpoint '{endpoint}': {source}")]
    Connect {
        endpoint: EndpointId,
        source: RuntimeError,
    },
    #[error("duplicate endpoint in group: {0}")]
    DuplicateEndpoint(EndpointId),
}
