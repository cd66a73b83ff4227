use crate::dispatch::dispatch;
use crate::outcome::{collect_failures, collect_listing, DispatchResult, EndpointFailure, GroupListing};
use crate::CoreError;
use armada_runtime::{
    connect_endpoint, ContainerInfo, EndpointClient, ImageInfo, Operation, OutputSink, RuntimeError,
};
use armada_schema::{parse_environment_file, Dockerfile, EndpointId, Environment, Project, Revision};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, info, warn};

/// A fixed fleet of endpoint clients, keyed by endpoint identity.
///
/// Every operation runs on all endpoints at once and returns when the last
/// one finishes. A failing endpoint never stops its siblings; failures come
/// back as a list next to whatever the healthy endpoints produced. The group
/// is immutable after construction and may be shared across threads, and
/// overlapping calls are independent of one another.
pub struct EndpointGroup {
    clients: BTreeMap<EndpointId, Box<dyn EndpointClient>>,
}

impl EndpointGroup {
    /// Connect to every endpoint in `env` with the built-in client selection.
    pub fn connect(env: &Environment) -> Result<Self, CoreError> {
        Self::with_connector(env, connect_endpoint)
    }

    /// Load an environment file and connect to every endpoint it lists.
    pub fn from_config_file(path: &Path) -> Result<Self, CoreError> {
        let env = parse_environment_file(path)?;
        Self::connect(&env)
    }

    /// Build one client per endpoint with `connector`, in configuration order.
    ///
    /// The first connector error aborts construction; clients created before
    /// it are dropped and no group is returned.
    pub fn with_connector<F>(env: &Environment, mut connector: F) -> Result<Self, CoreError>
    where
        F: FnMut(&EndpointId, &Environment) -> Result<Box<dyn EndpointClient>, RuntimeError>,
    {
        let mut clients = BTreeMap::new();
        for endpoint in &env.endpoints {
            let client = connector(endpoint, env).map_err(|source| CoreError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;
            if clients.insert(endpoint.clone(), client).is_some() {
                return Err(CoreError::DuplicateEndpoint(endpoint.clone()));
            }
        }
        info!(
            "connected to {} endpoints for environment '{}'",
            clients.len(),
            env.name
        );
        Ok(Self { clients })
    }

    /// Build a group from clients that are already connected.
    pub fn from_clients<I>(clients: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = Box<dyn EndpointClient>>,
    {
        let mut map = BTreeMap::new();
        for client in clients {
            let endpoint = client.endpoint().clone();
            if map.insert(endpoint.clone(), client).is_some() {
                return Err(CoreError::DuplicateEndpoint(endpoint));
            }
        }
        Ok(Self { clients: map })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Endpoint identities in sorted order.
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointId> {
        self.clients.keys()
    }

    pub fn client(&self, endpoint: &EndpointId) -> Option<&dyn EndpointClient> {
        self.clients.get(endpoint).map(|client| client.as_ref())
    }

    /// Deploy `project` at `revision` on every endpoint. `output` is shared by
    /// all endpoints; see [`OutputSink`] for its interleaving rules.
    pub fn deploy(
        &self,
        project: &Project,
        revision: &Revision,
        dockerfile: &Dockerfile,
        output: &OutputSink,
        force: bool,
    ) -> Vec<EndpointFailure> {
        info!(
            "deploying {project} at {} to {} endpoints (force: {force})",
            revision.short(),
            self.len()
        );
        self.for_each_endpoint(Operation::Deploy, |client| {
            client.deploy(project, revision, dockerfile, output, force)
        })
    }

    pub fn clean(&self, project: &Project) -> Vec<EndpointFailure> {
        info!("cleaning containers of {project} on {} endpoints", self.len());
        self.for_each_endpoint(Operation::Clean, |client| client.clean(project))
    }

    pub fn build_image(
        &self,
        project: &Project,
        revision: &Revision,
        dockerfile: &Dockerfile,
        output: &OutputSink,
    ) -> Vec<EndpointFailure> {
        info!(
            "building image {} on {} endpoints",
            project.image_ref(revision),
            self.len()
        );
        self.for_each_endpoint(Operation::BuildImage, |client| {
            client.build_image(project, revision, dockerfile, output)
        })
    }

    pub fn run(&self, project: &Project, revision: &Revision) -> Vec<EndpointFailure> {
        info!(
            "running {project} at {} on {} endpoints",
            revision.short(),
            self.len()
        );
        self.for_each_endpoint(Operation::Run, |client| client.run(project, revision))
    }

    pub fn list_containers(&self, project: &Project) -> GroupListing<ContainerInfo> {
        debug!("listing containers of {project} on {} endpoints", self.len());
        self.collect_from_endpoints(Operation::ListContainers, |client| {
            client.list_containers(project)
        })
    }

    pub fn list_images(&self, project: &Project) -> GroupListing<ImageInfo> {
        debug!("listing images of {project} on {} endpoints", self.len());
        self.collect_from_endpoints(Operation::ListImages, |client| client.list_images(project))
    }

    fn for_each_endpoint<F>(&self, operation: Operation, call: F) -> Vec<EndpointFailure>
    where
        F: Fn(&dyn EndpointClient) -> Result<(), RuntimeError> + Sync,
    {
        let results = dispatch(&self.clients, |endpoint, client| {
            DispatchResult::<()>::completed(endpoint, guarded(operation, || call(client.as_ref())))
        });
        let failures = collect_failures(results);
        log_failures(operation, &failures);
        failures
    }

    fn collect_from_endpoints<T, F>(&self, operation: Operation, call: F) -> GroupListing<T>
    where
        T: Send,
        F: Fn(&dyn EndpointClient) -> Result<Vec<T>, RuntimeError> + Sync,
    {
        let results = dispatch(&self.clients, |endpoint, client| {
            DispatchResult::listed(endpoint, guarded(operation, || call(client.as_ref())))
        });
        let listing = collect_listing(results);
        log_failures(operation, &listing.failures);
        listing
    }
}

impl fmt::Debug for EndpointGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointGroup")
            .field("endpoints", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Run one client call, turning a panic into an error for that endpoint so
/// the round still yields one result per endpoint.
fn guarded<R>(
    operation: Operation,
    call: impl FnOnce() -> Result<R, RuntimeError>,
) -> Result<R, RuntimeError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(RuntimeError::ClientPanicked {
            operation,
            message: panic_message(&*payload),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn log_failures(operation: Operation, failures: &[EndpointFailure]) {
    for failure in failures {
        warn!("{operation} failed on {failure}");
    }
}
