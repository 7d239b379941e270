//! Error types for schema registration, resolution and evaluation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors resolving schema identifiers, references and anchors.
///
/// During evaluation these never escape: the node that used the reference
/// becomes an invalid leaf carrying the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown schema resource {uri}")]
    UnknownResource { uri: String, dynamic: bool },

    #[error("anchor \"{anchor}\" not found in {base}")]
    UnknownAnchor {
        base: String,
        anchor: String,
        dynamic: bool,
    },

    #[error("no dynamic anchor \"{anchor}\" in scope")]
    UnknownDynamicAnchor { anchor: String },

    #[error("pointer {pointer} not found in {base}")]
    UnknownPointer {
        base: String,
        pointer: String,
        dynamic: bool,
    },

    #[error("invalid reference \"{reference}\" from {base}: {message}")]
    InvalidReference {
        base: String,
        reference: String,
        message: String,
    },

    #[error("duplicate anchor \"{anchor}\" in {base}")]
    DuplicateAnchor { base: String, anchor: String },

    #[error("schema resource {uri} is already registered")]
    DuplicateResource { uri: String },

    #[error("failed to retrieve {uri}: {message}")]
    Retrieval { uri: String, message: String },
}

impl ResolveError {
    /// Whether the failing reference was a dynamic one.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::UnknownResource { dynamic, .. }
            | Self::UnknownAnchor { dynamic, .. }
            | Self::UnknownPointer { dynamic, .. } => *dynamic,
            Self::UnknownDynamicAnchor { .. } => true,
            _ => false,
        }
    }

    /// Mark a not-found error as coming from a dynamic reference.
    pub(crate) fn into_dynamic(self) -> Self {
        match self {
            Self::UnknownResource { uri, .. } => Self::UnknownResource { uri, dynamic: true },
            Self::UnknownAnchor { base, anchor, .. } => Self::UnknownAnchor {
                base,
                anchor,
                dynamic: true,
            },
            Self::UnknownPointer { base, pointer, .. } => Self::UnknownPointer {
                base,
                pointer,
                dynamic: true,
            },
            other => other,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Retrieval { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors in the keyword catalog. These are configuration faults, raised
/// before any instance is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("keyword descriptor has an empty name")]
    EmptyName,

    #[error("keyword \"{name}\" is declared more than once")]
    DuplicateKeyword { name: String },

    #[error("keyword \"{keyword}\" depends on unknown keyword \"{dependency}\"")]
    UnknownDependency { keyword: String, dependency: String },

    #[error("keyword dependencies form a cycle: {}", keywords.join(" -> "))]
    DependencyCycle { keywords: Vec<String> },
}

/// Errors fetching external schema documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("retrieval cancelled")]
    Cancelled,

    #[error("no source for {uri} succeeded: {}", failures.join("; "))]
    Exhausted { uri: String, failures: Vec<String> },
}

/// Errors loading JSON documents from files, strings or URLs.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("remote schemas are not supported in this build: {url}")]
    RemoteDisabled { url: String },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URI \"{uri}\": {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::RemoteDisabled { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors building a [`crate::Validator`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl BuildError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Catalog(_) => 2,
            BuildError::Resolve(e) => e.exit_code(),
            BuildError::Fetch(_) => 3,
            BuildError::Load(e) => e.exit_code(),
        }
    }
}

/// Errors from the one-shot [`crate::validate`] helper.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Build(e) => e.exit_code(),
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid value.
    pub path: String,
    /// Evaluation path of the failing keyword.
    pub schema_path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {} ({})", path, self.message, self.schema_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_exit_codes() {
        let err = ResolveError::UnknownResource {
            uri: "https://example.com/missing.json".into(),
            dynamic: false,
        };
        assert_eq!(err.exit_code(), 2);

        let err = ResolveError::Retrieval {
            uri: "https://example.com/a.json".into(),
            message: "timed out".into(),
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn into_dynamic_marks_not_found_errors() {
        let err = ResolveError::UnknownAnchor {
            base: "https://example.com/a".into(),
            anchor: "node".into(),
            dynamic: false,
        };
        assert!(!err.is_dynamic());
        assert!(err.into_dynamic().is_dynamic());

        let err = ResolveError::DuplicateAnchor {
            base: "https://example.com/a".into(),
            anchor: "dup".into(),
        };
        assert!(!err.into_dynamic().is_dynamic());
    }

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("schema.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(LoadError::InvalidJson { source }.exit_code(), 2);
    }

    #[test]
    fn validate_error_exit_codes() {
        let err = ValidateError::Invalid {
            errors: vec![SchemaError {
                path: "/id".into(),
                schema_path: "/required".into(),
                message: "\"id\" is a required property".into(),
            }],
        };
        assert_eq!(err.exit_code(), 1);

        let err = ValidateError::Build(BuildError::Catalog(CatalogError::EmptyName));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn cycle_message_lists_keywords() {
        let err = CatalogError::DependencyCycle {
            keywords: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "keyword dependencies form a cycle: a -> b -> a");
    }

    #[test]
    fn schema_error_display() {
        let err = SchemaError {
            path: "/buyer/email".into(),
            schema_path: "/properties/buyer/properties/email/type".into(),
            message: "42 is not of type \"string\"".into(),
        };
        assert_eq!(
            err.to_string(),
            "/buyer/email: 42 is not of type \"string\" (/properties/buyer/properties/email/type)"
        );
    }
}
