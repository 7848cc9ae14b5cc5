//! Error types for configuration loading, authorization and dispatch.

use hyper::StatusCode;
use std::path::PathBuf;
use std::time::Duration;

/// Boxed error used at the upstream transport seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while loading or validating the configuration.
///
/// These only occur at startup and are fatal for the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config must define at least one endpoint")]
    NoEndpoints,
    #[error("Endpoint #{index} has an empty url")]
    EmptyUrl { index: usize },
    #[error("Endpoint #{index} has an invalid url '{url}': {reason}")]
    InvalidUrl {
        index: usize,
        url: String,
        reason: String,
    },
    #[error("Invalid listen address '{host}:{port}'")]
    InvalidListenAddr { host: String, port: u16 },
}

/// Rejection reasons of the authorization gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization required")]
    Missing,
    #[error("Authorization failed")]
    Mismatch,
}

/// Why a single upstream attempt did not produce a usable response.
///
/// Every variant is recovered by failing over to another endpoint.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("failed to build upstream request: {0}")]
    Build(#[from] hyper::http::Error),
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("upstream responded with status {0}")]
    Status(StatusCode),
}

/// Terminal outcomes of a failover walk that did not end in a relayable response.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("all {attempts} endpoints failed")]
    Exhausted { attempts: usize },
    #[error("failed to read response body from {url}: {source}")]
    ReadBody {
        url: String,
        #[source]
        source: BoxError,
    },
}
