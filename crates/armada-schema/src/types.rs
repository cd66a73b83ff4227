//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings so configuration files
//! and JSON listings stay human-editable.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$name> for String {
            fn eq(&self, other: &$name) -> bool {
                *self == other.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Identity of one remote container engine, usually its URL
    /// (`tcp://10.0.0.5:2375`, `mock://a`).
    EndpointId
);

string_newtype!(
    /// One version of a project, typically a VCS commit hash.
    Revision
);

string_newtype!(
    /// Engine-assigned image identifier.
    ImageId
);

string_newtype!(
    /// Engine-assigned container identifier.
    ContainerId
);

/// Number of characters shown by [`Revision::short`].
pub const SHORT_REVISION_LEN: usize = 12;

impl EndpointId {
    /// Normalize a configured endpoint string: surrounding whitespace and
    /// trailing slashes are not part of the identity.
    pub fn normalized(raw: &str) -> Result<Self, SchemaError> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(SchemaError::EmptyEndpoint);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The scheme part of the endpoint URL, if it has one.
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once("://").map(|(scheme, _)| scheme)
    }
}

impl Revision {
    /// Parse and validate a revision string.
    ///
    /// Revisions end up in image tags, so they must be non-empty and free of
    /// whitespace, `:` and `/`.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        if raw.is_empty()
            || raw
                .chars()
                .any(|c| c.is_whitespace() || c == ':' || c == '/')
        {
            return Err(SchemaError::InvalidRevision(raw.to_owned()));
        }
        Ok(Self(raw.to_owned()))
    }

    /// First [`SHORT_REVISION_LEN`] characters, for container names and logs.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(SHORT_REVISION_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display_and_as_ref() {
        let id = EndpointId::new("tcp://a:2375");
        assert_eq!(id.to_string(), "tcp://a:2375");
        assert_eq!(id.as_str(), "tcp://a:2375");
        assert_eq!(AsRef::<str>::as_ref(&id), "tcp://a:2375");
    }

    #[test]
    fn endpoint_serde_is_plain_string() {
        let id = EndpointId::new("mock://a");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"mock://a\"");
        let back: EndpointId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn endpoint_normalization_strips_trailing_slash() {
        let id = EndpointId::normalized("  tcp://a:2375/ ").unwrap();
        assert_eq!(id, "tcp://a:2375");
        assert_eq!(id.scheme(), Some("tcp"));
    }

    #[test]
    fn endpoint_normalization_rejects_blank() {
        assert!(matches!(
            EndpointId::normalized(" / "),
            Err(SchemaError::EmptyEndpoint)
        ));
    }

    #[test]
    fn endpoint_without_scheme() {
        assert_eq!(EndpointId::new("localhost").scheme(), None);
    }

    #[test]
    fn revision_short_truncates() {
        let rev = Revision::parse("0123456789abcdef0123").unwrap();
        assert_eq!(rev.short(), "0123456789ab");
        let tiny = Revision::parse("v1").unwrap();
        assert_eq!(tiny.short(), "v1");
    }

    #[test]
    fn revision_rejects_tag_breaking_characters() {
        assert!(Revision::parse("").is_err());
        assert!(Revision::parse("a b").is_err());
        assert!(Revision::parse("a:b").is_err());
        assert!(Revision::parse("feature/x").is_err());
    }

    #[test]
    fn container_id_into_inner() {
        let id = ContainerId::new("c0ffee".to_owned());
        assert_eq!(id.into_inner(), "c0ffee");
    }
}
