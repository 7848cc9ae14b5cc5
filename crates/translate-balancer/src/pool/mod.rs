//! Endpoint registry and per-request candidate selection.
//!
//! The [`EndpointPool`] is built once at startup and shared read-only by all
//! requests. Every request takes its own [`EndpointPool::candidates`] copy and
//! shrinks it with [`exclude`] as endpoints fail.

mod selector;

pub use selector::{exclude, pick_random};

use crate::config::Endpoint;
use std::sync::Arc;

/// Immutable snapshot of the configured endpoints and the global token.
///
/// Cloning is cheap; clones share the endpoint list.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    global_token: Arc<str>,
    endpoints: Arc<[Endpoint]>,
}

impl EndpointPool {
    pub fn new(global_token: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            global_token: Arc::from(global_token.into()),
            endpoints: Arc::from(endpoints),
        }
    }

    /// The shared secret clients must present, if access is gated.
    pub fn global_token(&self) -> Option<&str> {
        (!self.global_token.is_empty()).then_some(&*self.global_token)
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Fresh, request-owned copy of the endpoint list.
    pub fn candidates(&self) -> Vec<Endpoint> {
        self.endpoints.to_vec()
    }
}
