//! Inbound request handling.
//!
//! `/translate` runs the full pipeline:
//! - CORS headers on every response
//! - `OPTIONS` pre-flight answered locally, other non-`POST` methods rejected
//! - authorization gate
//! - body buffered once, then failover dispatch and relay
//!
//! Every other path answers with the identification banner.

use super::dispatcher::{FailoverDispatcher, UpstreamTransport};
use super::gate::authorize;
use super::headers::HeaderMapExt;
use super::relay::{plain_error, plain_text, preflight, relay_upstream, service_unavailable};
use crate::config::TRANSLATE_PATH;
use crate::error::{BoxError, DispatchError};
use crate::pool::EndpointPool;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, StatusCode};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::convert::Infallible;
use tracing::{debug, error, info, warn};

/// Banner served on `/`.
pub fn identification() -> String {
    format!("Translate Balancer v{}", env!("CARGO_PKG_VERSION"))
}

/// State borrowed by the handler for one request.
pub struct RequestHandlerContext<'a, T> {
    pub pool: &'a EndpointPool,
    pub dispatcher: &'a FailoverDispatcher<T>,
}

/// Route and handle one inbound request.
pub async fn handle_request<T, B>(
    ctx: &RequestHandlerContext<'_, T>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    T: UpstreamTransport,
    <T::Body as Body>::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send,
    B::Error: std::fmt::Display,
{
    debug!("Received request: {} {}", req.method(), req.uri());

    if req.uri().path() != TRANSLATE_PATH {
        return Ok(plain_text(identification()));
    }

    let mut response = handle_translate(ctx, req).await;
    response.headers_mut().apply_cors();
    Ok(response)
}

async fn handle_translate<T, B>(
    ctx: &RequestHandlerContext<'_, T>,
    req: Request<B>,
) -> Response<Full<Bytes>>
where
    T: UpstreamTransport,
    <T::Body as Body>::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send,
    B::Error: std::fmt::Display,
{
    match *req.method() {
        Method::OPTIONS => return preflight(),
        Method::POST => {}
        _ => return plain_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    }

    if let Err(err) = authorize(req.headers(), ctx.pool.global_token()) {
        debug!("Rejected unauthorized request: {}", err);
        return plain_error(StatusCode::UNAUTHORIZED, &err.to_string());
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read request");
        }
    };

    let mut rng = StdRng::from_entropy();
    match ctx.dispatcher.dispatch(ctx.pool, body, &mut rng).await {
        Ok(reply) => {
            info!(
                "Translated via {} ({} attempt(s))",
                reply.endpoint.url, reply.attempts
            );
            relay_upstream(reply)
        }
        Err(DispatchError::Exhausted { attempts }) => {
            warn!("All endpoints failed after {} attempt(s)", attempts);
            service_unavailable()
        }
        Err(err @ DispatchError::ReadBody { .. }) => {
            error!("{}", err);
            plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read response")
        }
    }
}
