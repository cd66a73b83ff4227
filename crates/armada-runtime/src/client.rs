use crate::mock::MockClient;
use crate::output::OutputSink;
use crate::RuntimeError;
use armada_schema::{ContainerId, Dockerfile, EndpointId, Environment, ImageId, Project, Revision};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The operations a fleet can run against each of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Deploy,
    Clean,
    BuildImage,
    Run,
    ListContainers,
    ListImages,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Deploy,
        Operation::Clean,
        Operation::BuildImage,
        Operation::Run,
        Operation::ListContainers,
        Operation::ListImages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Deploy => "deploy",
            Operation::Clean => "clean",
            Operation::BuildImage => "build-image",
            Operation::Run => "run",
            Operation::ListContainers => "list-containers",
            Operation::ListImages => "list-images",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Exited,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerState::Created => f.write_str("created"),
            ContainerState::Running => f.write_str("running"),
            ContainerState::Exited => f.write_str("exited"),
        }
    }
}

/// A container belonging to a project on one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub project: String,
    pub state: ContainerState,
    /// Endpoint the container lives on. Flattened fleet listings rely on
    /// this to stay attributable.
    pub endpoint: EndpointId,
    pub created_at: String,
}

/// An image belonging to a project on one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: ImageId,
    pub tag: String,
    pub project: String,
    pub endpoint: EndpointId,
    pub created_at: String,
}

/// Client for one remote container engine.
///
/// Implementations must be shareable across threads: a group invokes the
/// same client from a fresh thread on every call, and separate group calls
/// may overlap. Timeouts, if any, are enforced here; nothing above a client
/// can interrupt it.
pub trait EndpointClient: Send + Sync {
    fn endpoint(&self) -> &EndpointId;

    /// Bring `project` at `revision` up on this endpoint. `force` rebuilds
    /// the image even when one with the same tag exists.
    fn deploy(
        &self,
        project: &Project,
        revision: &Revision,
        dockerfile: &Dockerfile,
        output: &OutputSink,
        force: bool,
    ) -> Result<(), RuntimeError>;

    /// Remove every container of `project`.
    fn clean(&self, project: &Project) -> Result<(), RuntimeError>;

    fn build_image(
        &self,
        project: &Project,
        revision: &Revision,
        dockerfile: &Dockerfile,
        output: &OutputSink,
    ) -> Result<(), RuntimeError>;

    /// Start a container from an already-built image.
    fn run(&self, project: &Project, revision: &Revision) -> Result<(), RuntimeError>;

    fn list_containers(&self, project: &Project) -> Result<Vec<ContainerInfo>, RuntimeError>;

    fn list_images(&self, project: &Project) -> Result<Vec<ImageInfo>, RuntimeError>;
}

/// Construct the client for `endpoint`, chosen by URL scheme.
///
/// Only the in-memory `mock://` engine ships with this crate. Real engine
/// clients are supplied by the caller through a custom connector.
pub fn connect_endpoint(
    endpoint: &EndpointId,
    env: &Environment,
) -> Result<Box<dyn EndpointClient>, RuntimeError> {
    tracing::debug!("connecting to endpoint {endpoint}");
    match endpoint.scheme() {
        Some("mock") => Ok(Box::new(
            MockClient::new(endpoint.clone()).with_timeout(env.timeout()),
        )),
        _ => Err(RuntimeError::UnsupportedEndpoint(endpoint.to_string())),
    }
}
