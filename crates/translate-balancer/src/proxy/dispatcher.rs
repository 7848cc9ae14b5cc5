//! Failover dispatch across the endpoint pool.
//!
//! Each request walks its own copy of the pool:
//!
//! 1. pick a random remaining candidate
//! 2. send the buffered body to it
//! 3. a 200 response ends the walk; a transport error, timeout or any other
//!    status excludes the candidate and the walk continues
//! 4. an empty candidate set ends the walk as [`DispatchError::Exhausted`]
//!
//! Failed responses are dropped before the next attempt, which hands their
//! connection back to the pool or closes it.

use super::upstream::build_upstream_request;
use crate::config::Endpoint;
use crate::error::{AttemptError, BoxError, DispatchError};
use crate::pool::{exclude, pick_random, EndpointPool};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::http::response::Parts;
use hyper::{Request, Response, StatusCode};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

/// Sends one prepared request to an upstream endpoint.
///
/// Implemented by the pooled [`HttpClient`](super::client::HttpClient); tests
/// substitute spies.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    type Body: Body<Data = Bytes> + Send + 'static;

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<Self::Body>, BoxError>;
}

/// A successful upstream response, fully read.
#[derive(Debug)]
pub struct UpstreamReply {
    pub endpoint: Endpoint,
    pub parts: Parts,
    pub body: Bytes,
    /// Attempts made, including the successful one
    pub attempts: usize,
}

/// Runs the select / attempt / exclude loop for one request.
pub struct FailoverDispatcher<T> {
    transport: T,
    browser_headers: bool,
    attempt_timeout: Option<Duration>,
}

impl<T> FailoverDispatcher<T>
where
    T: UpstreamTransport,
    <T::Body as Body>::Error: Into<BoxError>,
{
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            browser_headers: true,
            attempt_timeout: None,
        }
    }

    pub fn with_browser_headers(mut self, enabled: bool) -> Self {
        self.browser_headers = enabled;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatch `body` to the pool until one endpoint answers 200.
    pub async fn dispatch<R>(
        &self,
        pool: &EndpointPool,
        body: Bytes,
        rng: &mut R,
    ) -> Result<UpstreamReply, DispatchError>
    where
        R: Rng + Send + ?Sized,
    {
        let mut candidates = pool.candidates();
        let mut attempts = 0;

        while let Some(endpoint) = pick_random(&candidates, rng).cloned() {
            attempts += 1;
            debug!(
                "Attempt {} of at most {}: {}",
                attempts,
                pool.len(),
                endpoint.url
            );

            match self.attempt(&endpoint, body.clone()).await {
                Ok(response) => {
                    let (parts, upstream_body) = response.into_parts();
                    let body = upstream_body
                        .collect()
                        .await
                        .map_err(|e| DispatchError::ReadBody {
                            url: endpoint.url.clone(),
                            source: e.into(),
                        })?
                        .to_bytes();

                    debug!(
                        "Endpoint {} succeeded after {} attempts ({} bytes)",
                        endpoint.url,
                        attempts,
                        body.len()
                    );
                    return Ok(UpstreamReply {
                        endpoint,
                        parts,
                        body,
                        attempts,
                    });
                }
                Err(err) => {
                    warn!("Failed to request endpoint {}: {}", endpoint.url, err);
                    candidates = exclude(candidates, &endpoint);
                }
            }
        }

        Err(DispatchError::Exhausted { attempts })
    }

    async fn attempt(
        &self,
        endpoint: &Endpoint,
        body: Bytes,
    ) -> Result<Response<T::Body>, AttemptError> {
        let request = build_upstream_request(endpoint, body, self.browser_headers)?;
        let send = self.transport.send(request);

        let response = match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| AttemptError::Timeout(limit))?,
            None => send.await,
        }
        .map_err(AttemptError::Transport)?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => Err(AttemptError::Status(status)),
        }
    }
}
