//! Schema loading from various sources.
//!
//! Handles loading JSON documents from files, strings, and HTTP URLs, and
//! mapping schema URLs onto a local directory.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for mapping schema URLs to local paths.
///
/// When both `local_base` and `remote_base` are set, URLs starting with
/// `remote_base` have that prefix stripped before joining with `local_base`.
///
/// Example:
/// - `remote_base`: `https://example.com/schemas/v1`
/// - `local_base`: `schemas`
/// - URL: `https://example.com/schemas/v1/order.json`
/// - Result: `schemas/order.json`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaBaseConfig {
    /// Local directory containing schema files.
    pub local_base: Option<PathBuf>,
    /// URL prefix to strip when mapping to local paths.
    pub remote_base: Option<String>,
}

impl SchemaBaseConfig {
    pub fn new(local_base: impl Into<PathBuf>) -> Self {
        Self {
            local_base: Some(local_base.into()),
            remote_base: None,
        }
    }

    pub fn remote_base(mut self, remote_base: impl Into<String>) -> Self {
        self.remote_base = Some(remote_base.into());
        self
    }

    /// The local file a schema URL maps to, if any.
    ///
    /// Without `remote_base`, the URL's path is joined onto `local_base`.
    pub fn map_to_local(&self, url: &str) -> Option<PathBuf> {
        let base = self.local_base.as_deref()?;
        let path = match self
            .remote_base
            .as_deref()
            .and_then(|remote| url.strip_prefix(remote))
        {
            Some(remainder) => remainder.to_string(),
            None => url::Url::parse(url).ok()?.path().to_string(),
        };
        Some(base.join(path.trim_start_matches('/')))
    }
}

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_schema_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let response = client.get(url).send().map_err(network)?;

    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(network)?;

    response.json().map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a JSON document from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
/// URL loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_schema_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_schema_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::RemoteDisabled {
                url: source.to_string(),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}
