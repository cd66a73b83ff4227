use crate::client::{ContainerInfo, ContainerState, EndpointClient, ImageInfo, Operation};
use crate::output::OutputSink;
use crate::RuntimeError;
use armada_schema::{ContainerId, Dockerfile, EndpointId, ImageId, Project, Revision};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One call observed by a [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub project: String,
    pub force: bool,
}

#[derive(Debug, Clone)]
enum Fault {
    Error(String),
    Panic,
}

#[derive(Default)]
struct MockState {
    delay: Duration,
    timeout: Option<Duration>,
    faults: HashMap<Operation, Fault>,
    images: Vec<ImageInfo>,
    containers: Vec<ContainerInfo>,
    calls: Vec<RecordedCall>,
    next_id: u64,
}

/// In-memory container engine.
///
/// Clones share state, so a test can keep one handle for inspection and
/// fault injection while a group owns another.
#[derive(Clone)]
pub struct MockClient {
    endpoint: EndpointId,
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    pub fn new(endpoint: impl Into<EndpointId>) -> Self {
        Self {
            endpoint: endpoint.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Sleep for `delay` at the start of every operation.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.delay = delay;
        }
        self
    }

    /// Fail any operation whose delay exceeds `timeout`, after waiting
    /// `timeout`.
    #[must_use]
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.timeout = timeout;
        }
        self
    }

    /// Seed an existing image, as if built earlier.
    #[must_use]
    pub fn with_image(self, project: &Project, tag: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            let id = state.allocate_id();
            state.images.push(ImageInfo {
                id: ImageId::new(format!("sha256:{id}")),
                tag: tag.to_owned(),
                project: project.name().to_owned(),
                endpoint: self.endpoint.clone(),
                created_at: now(),
            });
        }
        self
    }

    /// Make every later `operation` fail with an engine error carrying `message`.
    pub fn fail_on(&self, operation: Operation, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state
                .faults
                .insert(operation, Fault::Error(message.to_owned()));
        }
    }

    /// Make every later `operation` panic inside the client.
    pub fn panic_on(&self, operation: Operation) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.insert(operation, Fault::Panic);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.clear();
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::Engine(format!("mutex poisoned: {e}")))
    }

    /// Record the call, then apply the configured latency and faults.
    /// The lock is released before sleeping so sibling calls overlap.
    fn begin(&self, operation: Operation, project: &Project, force: bool) -> Result<(), RuntimeError> {
        tracing::debug!("mock {operation} for {project} on {}", self.endpoint);
        let (delay, timeout, fault) = {
            let mut state = self.lock()?;
            state.calls.push(RecordedCall {
                operation,
                project: project.name().to_owned(),
                force,
            });
            (
                state.delay,
                state.timeout,
                state.faults.get(&operation).cloned(),
            )
        };

        if let Some(limit) = timeout.filter(|limit| delay > *limit) {
            std::thread::sleep(limit);
            return Err(RuntimeError::Timeout {
                operation,
                secs: limit.as_secs(),
            });
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        match fault {
            None => Ok(()),
            Some(Fault::Error(message)) => Err(RuntimeError::Engine(message)),
            Some(Fault::Panic) => panic!("injected panic in {operation} on {}", self.endpoint),
        }
    }

    fn build(
        &self,
        project: &Project,
        revision: &Revision,
        dockerfile: &Dockerfile,
        output: &OutputSink,
    ) -> Result<(), RuntimeError> {
        let tag = project.image_ref(revision);
        output.write_line(&format!("[{}] building {tag}", self.endpoint))?;

        let steps: Vec<&str> = dockerfile
            .content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        for (i, step) in steps.iter().enumerate() {
            output.write_line(&format!(
                "[{}] step {}/{}: {step}",
                self.endpoint,
                i + 1,
                steps.len()
            ))?;
        }

        let digest = dockerfile.digest();
        let mut state = self.lock()?;
        state.images.retain(|img| img.tag != tag);
        state.images.push(ImageInfo {
            id: ImageId::new(format!("sha256:{}", &digest[..12])),
            tag: tag.clone(),
            project: project.name().to_owned(),
            endpoint: self.endpoint.clone(),
            created_at: now(),
        });
        drop(state);

        output.write_line(&format!("[{}] successfully tagged {tag}", self.endpoint))?;
        Ok(())
    }

    fn start(&self, project: &Project, revision: &Revision) -> Result<(), RuntimeError> {
        let image = project.image_ref(revision);
        let name = project.container_name(revision);

        let mut state = self.lock()?;
        if !state.images.iter().any(|img| img.tag == image) {
            return Err(RuntimeError::ImageNotFound(image));
        }
        state.containers.retain(|c| c.name != name);
        let id = state.allocate_id();
        state.containers.push(ContainerInfo {
            id: ContainerId::new(id),
            name,
            image,
            project: project.name().to_owned(),
            state: ContainerState::Running,
            endpoint: self.endpoint.clone(),
            created_at: now(),
        });
        Ok(())
    }

    fn remove_containers(&self, project: &Project) -> Result<usize, RuntimeError> {
        let mut state = self.lock()?;
        let before = state.containers.len();
        state.containers.retain(|c| c.project != project.name());
        Ok(before - state.containers.len())
    }

    fn has_image(&self, tag: &str) -> Result<bool, RuntimeError> {
        Ok(self.lock()?.images.iter().any(|img| img.tag == tag))
    }
}

impl MockState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:012x}", self.next_id)
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl EndpointClient for MockClient {
    fn endpoint(&self) -> &EndpointId {
        &self.endpoint
    }

    fn deploy(
        &self,
        project: &Project,
        revision: &Revision,
        dockerfile: &Dockerfile,
        output: &OutputSink,
        force: bool,
    ) -> Result<(), RuntimeError> {
        self.begin(Operation::Deploy, project, force)?;
        if force || !self.has_image(&project.image_ref(revision))? {
            self.build(project, revision, dockerfile, output)?;
        } else {
            output.write_line(&format!(
                "[{}] reusing image {}",
                self.endpoint,
                project.image_ref(revision)
            ))?;
        }
        self.remove_containers(project)?;
        self.start(project, revision)
    }

    fn clean(&self, project: &Project) -> Result<(), RuntimeError> {
        self.begin(Operation::Clean, project, false)?;
        self.remove_containers(project)?;
        Ok(())
    }

    fn build_image(
        &self,
        project: &Project,
        revision: &Revision,
        dockerfile: &Dockerfile,
        output: &OutputSink,
    ) -> Result<(), RuntimeError> {
        self.begin(Operation::BuildImage, project, false)?;
        self.build(project, revision, dockerfile, output)
    }

    fn run(&self, project: &Project, revision: &Revision) -> Result<(), RuntimeError> {
        self.begin(Operation::Run, project, false)?;
        self.start(project, revision)
    }

    fn list_containers(&self, project: &Project) -> Result<Vec<ContainerInfo>, RuntimeError> {
        self.begin(Operation::ListContainers, project, false)?;
        let state = self.lock()?;
        Ok(state
            .containers
            .iter()
            .filter(|c| c.project == project.name())
            .cloned()
            .collect())
    }

    fn list_images(&self, project: &Project) -> Result<Vec<ImageInfo>, RuntimeError> {
        self.begin(Operation::ListImages, project, false)?;
        let state = self.lock()?;
        Ok(state
            .images
            .iter()
            .filter(|img| img.project == project.name())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn fixture() -> (MockClient, Project, Revision, Dockerfile) {
        (
            MockClient::new("mock://a"),
            Project::new("web").unwrap(),
            Revision::parse("0123456789abcdef").unwrap(),
            Dockerfile::from_content("FROM alpine\n# comment\n\nRUN apk add curl\n"),
        )
    }

    #[test]
    fn build_writes_progress_and_records_image() {
        let (client, project, rev, df) = fixture();
        let (sink, captured) = OutputSink::capture();

        client.build_image(&project, &rev, &df, &sink).unwrap();

        let lines = captured.lines();
        assert_eq!(lines[0], "[mock://a] building web:0123456789abcdef");
        assert_eq!(lines[1], "[mock://a] step 1/2: FROM alpine");
        assert_eq!(lines[2], "[mock://a] step 2/2: RUN apk add curl");
        assert!(lines[3].contains("successfully tagged"));

        let images = client.list_images(&project).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].tag, "web:0123456789abcdef");
        assert_eq!(images[0].endpoint, "mock://a");
    }

    #[test]
    fn run_requires_image() {
        let (client, project, rev, _) = fixture();
        assert!(matches!(
            client.run(&project, &rev),
            Err(RuntimeError::ImageNotFound(ref tag)) if tag == "web:0123456789abcdef"
        ));
    }

    #[test]
    fn mock_lifecycle() {
        let (client, project, rev, df) = fixture();
        let sink = OutputSink::discard();

        client.build_image(&project, &rev, &df, &sink).unwrap();
        client.run(&project, &rev).unwrap();
        let containers = client.list_containers(&project).unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "web-0123456789ab");
        assert_eq!(containers[0].state, ContainerState::Running);

        client.clean(&project).unwrap();
        assert!(client.list_containers(&project).unwrap().is_empty());
        assert_eq!(client.list_images(&project).unwrap().len(), 1);
    }

    #[test]
    fn deploy_reuses_image_unless_forced() {
        let (client, project, rev, df) = fixture();

        let (sink, captured) = OutputSink::capture();
        client.deploy(&project, &rev, &df, &sink, false).unwrap();
        client.deploy(&project, &rev, &df, &sink, false).unwrap();
        assert_eq!(
            captured
                .lines()
                .iter()
                .filter(|l| l.contains("building"))
                .count(),
            1
        );
        assert!(captured.contents().contains("reusing image"));

        client.deploy(&project, &rev, &df, &sink, true).unwrap();
        assert_eq!(
            captured
                .lines()
                .iter()
                .filter(|l| l.contains("building"))
                .count(),
            2
        );
        assert_eq!(client.list_containers(&project).unwrap().len(), 1);
    }

    #[test]
    fn list_is_scoped_to_project() {
        let (client, project, rev, df) = fixture();
        let other = Project::new("worker").unwrap();
        let sink = OutputSink::discard();

        client.deploy(&project, &rev, &df, &sink, false).unwrap();
        client.deploy(&other, &rev, &df, &sink, false).unwrap();

        assert_eq!(client.list_containers(&project).unwrap().len(), 1);
        client.clean(&other).unwrap();
        assert_eq!(client.list_containers(&project).unwrap().len(), 1);
        assert!(client.list_containers(&other).unwrap().is_empty());
    }

    #[test]
    fn injected_failure_uses_message_verbatim() {
        let (client, project, _, _) = fixture();
        client.fail_on(Operation::Clean, "disk full");

        let err = client.clean(&project).unwrap_err();
        assert_eq!(err.to_string(), "disk full");

        client.clear_faults();
        assert!(client.clean(&project).is_ok());
    }

    #[test]
    fn clones_share_state() {
        let (client, project, _, _) = fixture();
        let handle = client.clone();
        client.clean(&project).unwrap();

        let calls = handle.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, Operation::Clean);
        assert_eq!(calls[0].project, "web");
        assert!(!calls[0].force);
    }

    #[test]
    fn seeded_images_are_listed() {
        let project = Project::new("web").unwrap();
        let client = MockClient::new("mock://a")
            .with_image(&project, "img1")
            .with_image(&project, "img2");
        let tags: Vec<String> = client
            .list_images(&project)
            .unwrap()
            .into_iter()
            .map(|i| i.tag)
            .collect();
        assert_eq!(tags, ["img1", "img2"]);
    }

    #[test]
    fn delay_beyond_timeout_fails() {
        let (client, project, _, _) = fixture();
        let client = client
            .with_delay(Duration::from_millis(200))
            .with_timeout(Some(Duration::from_millis(20)));

        let start = Instant::now();
        let err = client.list_images(&project).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Timeout {
                operation: Operation::ListImages,
                ..
            }
        ));
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    #[should_panic(expected = "injected panic in run")]
    fn panic_injection() {
        let (client, project, rev, _) = fixture();
        client.panic_on(Operation::Run);
        let _ = client.run(&project, &rev);
    }
}
