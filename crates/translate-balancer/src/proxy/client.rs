//! HTTP client creation and configuration.
//!
//! This module builds the shared, pooled HTTP client used for every upstream
//! attempt and plugs it into the dispatcher's transport seam.

use super::dispatcher::UpstreamTransport;
use super::tls::client_tls_config;
use crate::config::Config;
use crate::error::BoxError;
use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::info;

/// Type alias for the HTTP client used by the balancer.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Create a shared HTTP client with connection pooling.
///
/// The client speaks HTTP/1.1 only, over plain TCP or TLS depending on the
/// endpoint url.
pub fn create_http_client(config: &Config) -> Result<HttpClient, anyhow::Error> {
    let pool = &config.connection_pool;

    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let tls_config = client_tls_config(&config.tls, config.uses_tls())?;
    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .build(https_connector);

    info!(
        "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s, connect_timeout={}s",
        pool.max_idle_per_host,
        pool.idle_timeout_secs,
        pool.keepalive_timeout_secs,
        pool.connect_timeout_secs
    );

    Ok(http_client)
}

#[async_trait]
impl UpstreamTransport for HttpClient {
    type Body = Incoming;

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<Incoming>, BoxError> {
        Ok(self.request(request).await?)
    }
}
