//! Backend endpoint definition.

use super::protocol::Protocol;
use crate::error::ConfigError;
use hyper::Uri;
use serde::{Deserialize, Serialize};

/// Path appended to every endpoint base url.
pub const TRANSLATE_PATH: &str = "/translate";

/// One backend translation service.
///
/// Endpoints are plain values: two endpoints are the same endpoint when both
/// the url and the token match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Endpoint {
    /// Base address, e.g. `http://10.0.0.5:1188`
    pub url: String,
    /// Bearer credential sent to this endpoint (empty = none)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: String::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// The bearer credential, if one is configured.
    pub fn bearer_token(&self) -> Option<&str> {
        (!self.token.is_empty()).then_some(self.token.as_str())
    }

    /// Full target of a translation request to this endpoint.
    pub fn translate_url(&self) -> String {
        format!("{}{}", self.url, TRANSLATE_PATH)
    }

    /// Validate the url of the endpoint at `index` in the pool.
    pub fn validate(&self, index: usize) -> Result<Protocol, ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::EmptyUrl { index });
        }

        let invalid = |reason: String| ConfigError::InvalidUrl {
            index,
            url: self.url.clone(),
            reason,
        };

        let uri: Uri = self
            .translate_url()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| invalid(e.to_string()))?;
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| invalid("missing scheme".to_string()))?;
        let protocol = Protocol::from_scheme(scheme).map_err(invalid)?;
        if uri.host().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }

        Ok(protocol)
    }
}
