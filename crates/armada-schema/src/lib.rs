//! Shared vocabulary for Armada fleet operations.
//!
//! This crate defines the identifiers (`EndpointId`, `Revision`), the project
//! and build artifact descriptors handed to every endpoint, and the
//! `Environment` configuration document listing the fleet's engine endpoints.

pub mod environment;
pub mod project;
pub mod types;

pub use environment::{parse_environment_file, parse_environment_str, Environment, CONFIG_VERSION};
pub use project::{Dockerfile, Project};
pub use types::{ContainerId, EndpointId, ImageId, Revision};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse environment: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to serialize environment: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    #[error("unsupported config_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("endpoint must not be empty")]
    EmptyEndpoint,
    #[error("duplicate endpoint: {0}")]
    DuplicateEndpoint(String),
    #[error("invalid project name: '{0}'")]
    InvalidProjectName(String),
    #[error("invalid revision: '{0}'")]
    InvalidRevision(String),
    #[error("Dockerfile is empty: {}", .0.display())]
    EmptyDockerfile(PathBuf),
}
