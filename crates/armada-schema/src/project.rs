use crate::types::Revision;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Longest project name accepted; image repository names share this limit.
pub const MAX_PROJECT_NAME_LEN: usize = 128;

/// A named deployable unit. Every endpoint in a group builds and runs the
/// same project under the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    name: String,
}

impl Project {
    pub fn new(name: &str) -> Result<Self, SchemaError> {
        validate_project_name(name)?;
        Ok(Self {
            name: name.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image reference every endpoint tags its build with: `<name>:<revision>`.
    pub fn image_ref(&self, revision: &Revision) -> String {
        format!("{}:{}", self.name, revision)
    }

    /// Container name for one revision of this project.
    pub fn container_name(&self, revision: &Revision) -> String {
        format!("{}-{}", self.name, revision.short())
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn validate_project_name(name: &str) -> Result<(), SchemaError> {
    let invalid = || SchemaError::InvalidProjectName(name.to_owned());

    if name.is_empty() || name.len() > MAX_PROJECT_NAME_LEN {
        return Err(invalid());
    }
    let mut chars = name.chars();
    if !chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid());
    }
    Ok(())
}

/// Build artifact descriptor handed to every endpoint: the Dockerfile text
/// and the directory used as build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dockerfile {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<PathBuf>,
}

impl Dockerfile {
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            context_dir: None,
        }
    }

    /// Read a Dockerfile from disk. The build context defaults to the
    /// directory containing it.
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Err(SchemaError::EmptyDockerfile(path.to_path_buf()));
        }
        Ok(Self {
            content,
            context_dir: path.parent().map(Path::to_path_buf),
        })
    }

    #[must_use]
    pub fn with_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = Some(dir.into());
        self
    }

    /// Blake3 hex digest of the Dockerfile text. Clients use it as a cache
    /// key for images built from identical instructions.
    pub fn digest(&self) -> String {
        blake3::hash(self.content.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_registry_style_names() {
        for name in ["web", "api-gateway", "svc_2", "a.b-c_d", "0day"] {
            assert!(Project::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        let too_long = "a".repeat(MAX_PROJECT_NAME_LEN + 1);
        for name in ["", "Web", "-web", ".web", "web app", "web/app", too_long.as_str()] {
            assert!(
                matches!(Project::new(name), Err(SchemaError::InvalidProjectName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn image_ref_and_container_name() {
        let p = Project::new("web").unwrap();
        let rev = Revision::parse("abcdef0123456789").unwrap();
        assert_eq!(p.image_ref(&rev), "web:abcdef0123456789");
        assert_eq!(p.container_name(&rev), "web-abcdef012345");
    }

    #[test]
    fn dockerfile_digest_is_content_addressed() {
        let a = Dockerfile::from_content("FROM alpine\n");
        let b = Dockerfile::from_content("FROM alpine\n").with_context_dir("/srv/app");
        let c = Dockerfile::from_content("FROM debian\n");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn dockerfile_from_file_sets_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        fs::write(&path, "FROM alpine\nRUN true\n").unwrap();

        let df = Dockerfile::from_file(&path).unwrap();
        assert!(df.content.starts_with("FROM alpine"));
        assert_eq!(df.context_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn dockerfile_from_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        fs::write(&path, "  \n").unwrap();
        assert!(matches!(
            Dockerfile::from_file(&path),
            Err(SchemaError::EmptyDockerfile(_))
        ));
    }

    #[test]
    fn dockerfile_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Dockerfile::from_file(&dir.path().join("nope")),
            Err(SchemaError::Io(_))
        ));
    }
}
