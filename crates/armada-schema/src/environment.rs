use crate::types::EndpointId;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// Shared settings for one fleet: the ordered list of engine endpoints plus
/// options every endpoint client receives at construction.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    pub config_version: u32,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointId>,
    /// Per-request timeout for endpoint clients. The group itself never
    /// times out; clients are expected to honor this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_name() -> String {
    "default".to_owned()
}

impl Environment {
    /// Build a validated environment from raw endpoint strings.
    pub fn new<I, S>(name: &str, endpoints: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = endpoints
            .into_iter()
            .map(|e| EndpointId::new(e.as_ref()))
            .collect();
        let mut env = Self {
            config_version: CONFIG_VERSION,
            name: name.to_owned(),
            endpoints,
            timeout_secs: None,
        };
        env.validate()?;
        Ok(env)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Normalize endpoint identities and reject duplicates. The group keys
    /// clients by identity, so a duplicate would silently shrink the fleet.
    fn validate(&mut self) -> Result<(), SchemaError> {
        if self.config_version != CONFIG_VERSION {
            return Err(SchemaError::UnsupportedVersion(self.config_version));
        }

        let mut seen = BTreeSet::new();
        let mut normalized = Vec::with_capacity(self.endpoints.len());
        for raw in &self.endpoints {
            let endpoint = EndpointId::normalized(raw)?;
            if !seen.insert(endpoint.clone()) {
                return Err(SchemaError::DuplicateEndpoint(endpoint.into_inner()));
            }
            normalized.push(endpoint);
        }
        self.endpoints = normalized;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn parse_environment_str(input: &str) -> Result<Environment, SchemaError> {
    let mut env: Environment = toml::from_str(input)?;
    env.validate()?;
    Ok(env)
}

pub fn parse_environment_file(path: impl AsRef<Path>) -> Result<Environment, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_environment_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_environment() {
        let input = r#"
config_version = 1
name = "production"
endpoints = ["tcp://10.0.0.1:2375", "tcp://10.0.0.2:2375/"]
timeout_secs = 30
"#;
        let env = parse_environment_str(input).expect("should parse");
        assert_eq!(env.name, "production");
        assert_eq!(env.endpoints.len(), 2);
        assert_eq!(env.endpoints[1], "tcp://10.0.0.2:2375");
        assert_eq!(env.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn parses_minimal_environment() {
        let env = parse_environment_str("config_version = 1\n").expect("should parse");
        assert_eq!(env.name, "default");
        assert!(env.endpoints.is_empty());
        assert_eq!(env.timeout(), None);
    }

    #[test]
    fn keeps_endpoint_order() {
        let env = Environment::new("t", ["mock://c", "mock://a", "mock://b"]).unwrap();
        let order: Vec<&str> = env.endpoints.iter().map(EndpointId::as_str).collect();
        assert_eq!(order, ["mock://c", "mock://a", "mock://b"]);
    }

    #[test]
    fn rejects_duplicate_after_normalization() {
        let err = Environment::new("t", ["mock://a", "mock://a/"]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateEndpoint(ref e) if e == "mock://a"));
    }

    #[test]
    fn rejects_blank_endpoint() {
        let input = r#"
config_version = 1
endpoints = ["mock://a", "  "]
"#;
        assert!(matches!(
            parse_environment_str(input),
            Err(SchemaError::EmptyEndpoint)
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = r#"
config_version = 1
endpoints = []
registry = "example.com"
"#;
        assert!(matches!(
            parse_environment_str(input),
            Err(SchemaError::ParseToml(_))
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        assert!(matches!(
            parse_environment_str("config_version = 2\n"),
            Err(SchemaError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("armada.toml");

        let env = Environment::new("staging", ["mock://a", "mock://b"])
            .unwrap()
            .with_timeout(Duration::from_secs(5));
        env.save(&path).unwrap();

        let loaded = parse_environment_file(&path).unwrap();
        assert_eq!(loaded, env);
    }
}
