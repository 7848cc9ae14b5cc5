//! Configuration types for the balancer.
//!
//! The configuration is a JSON document (YAML is accepted for files ending in
//! `.yaml`/`.yml`) describing the endpoint pool and the optional global
//! token that clients must present:
//!
//! ```json
//! {
//!   "token": "client-secret",
//!   "endpoints": [
//!     { "url": "http://10.0.0.5:1188" },
//!     { "url": "https://translate.example.com", "token": "endpoint-secret" }
//!   ]
//! }
//! ```

mod endpoint;
mod listen;
mod protocol;
mod upstream;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::pool::EndpointPool;

pub use endpoint::{Endpoint, TRANSLATE_PATH};
pub use listen::ListenConfig;
pub use protocol::Protocol;
pub use upstream::{ConnectionPoolConfig, UpstreamTlsConfig};

/// Serialization format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Shared secret clients must send as `Authorization: Bearer <token>`.
    /// Empty disables the check.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// Backend translation endpoints, tried in random order on every request.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(default)]
    pub listen: ListenConfig,

    /// Send browser-like headers to upstreams
    #[serde(default = "default_browser_headers")]
    pub browser_headers: bool,

    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,

    #[serde(default)]
    pub tls: UpstreamTlsConfig,
}

fn default_browser_headers() -> bool {
    true
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents, ConfigFormat::from_path(path))?;

        info!(
            "Loaded config with {} endpoints from {}",
            config.endpoints.len(),
            path.display()
        );
        for (index, endpoint) in config.endpoints.iter().enumerate() {
            let protocol = endpoint.validate(index)?;
            info!("Endpoint: {} ({})", endpoint.url, protocol.as_str());
        }

        Ok(config)
    }

    /// Parse and validate a config document.
    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: Config = match format {
            ConfigFormat::Json => serde_json::from_str(contents)?,
            ConfigFormat::Yaml => serde_yaml::from_str(contents)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            endpoint.validate(index)?;
        }

        self.listen.socket_addr()?;

        Ok(())
    }

    /// Whether any endpoint is reached over TLS.
    pub fn uses_tls(&self) -> bool {
        self.endpoints
            .iter()
            .any(|e| e.validate(0).is_ok_and(|p| p == Protocol::Https))
    }

    /// Snapshot of the endpoint pool shared by all requests.
    pub fn pool(&self) -> EndpointPool {
        EndpointPool::new(self.token.clone(), self.endpoints.clone())
    }
}
