//! Client-facing responses.

use super::dispatcher::UpstreamReply;
use super::headers::{HeaderMapExt, APPLICATION_JSON, NOSNIFF, TEXT_PLAIN_UTF8};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use hyper::{Response, StatusCode};

/// Body sent when every endpoint failed.
pub const SERVICE_UNAVAILABLE_BODY: &str = r#"{"data": "Service unavailable"}"#;

/// Relay a successful upstream response.
///
/// Every upstream header is copied over the response; the status is always
/// 200 because only 200 responses count as success.
pub fn relay_upstream(reply: UpstreamReply) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(reply.body));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().overwrite_from(&reply.parts.headers);
    response
}

/// The fixed 503 answer to an exhausted pool.
pub fn service_unavailable() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(
        SERVICE_UNAVAILABLE_BODY.as_bytes(),
    )));
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, APPLICATION_JSON.clone());
    response
}

/// Plain text error response: `message` followed by a newline.
pub fn plain_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(format!("{message}\n"))));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, TEXT_PLAIN_UTF8.clone());
    headers.insert(X_CONTENT_TYPE_OPTIONS, NOSNIFF.clone());
    response
}

/// Plain text 200 response.
pub fn plain_text(body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, TEXT_PLAIN_UTF8.clone());
    response
}

/// Empty 200 answer to a CORS pre-flight.
pub fn preflight() -> Response<Full<Bytes>> {
    Response::new(Full::new(Bytes::new()))
}
