//! Balancer server module.
//!
//! This module provides the HTTP front end and the failover machinery:
//! - Shared-secret authorization of inbound requests
//! - Random endpoint selection with per-request failover
//! - Browser-like upstream headers and per-endpoint bearer tokens
//! - Verbatim relay of the first successful upstream response
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct and main run loop
//! - `handler` - Routing and the `/translate` pipeline
//! - `gate` - Authorization check
//! - `dispatcher` - Failover loop over the upstream transport
//! - `upstream` - Outbound request construction
//! - `relay` - Client-facing responses
//! - `headers` - Header constants and helpers
//! - `client` - HTTP client creation and configuration
//! - `tls` - Upstream TLS client configuration
//! - `network` - Listener setup

mod client;
mod dispatcher;
mod gate;
mod handler;
mod headers;
mod network;
mod relay;
mod server;
mod tls;
mod upstream;


pub use client::{create_http_client, HttpClient};
pub use dispatcher::{FailoverDispatcher, UpstreamReply, UpstreamTransport};
pub use gate::authorize;
pub use handler::{handle_request, identification, RequestHandlerContext};
pub use network::create_listener;
pub use server::ProxyServer;
