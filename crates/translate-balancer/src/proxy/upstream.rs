//! Outbound request construction.

use super::headers::{APPLICATION_JSON, BROWSER_HEADERS};
use crate::config::Endpoint;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request};

/// Build the translation request sent to `endpoint`.
///
/// `body` is the client's payload, forwarded byte-for-byte.
pub fn build_upstream_request(
    endpoint: &Endpoint,
    body: Bytes,
    browser_headers: bool,
) -> Result<Request<Full<Bytes>>, hyper::http::Error> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(endpoint.translate_url())
        .header(CONTENT_TYPE, APPLICATION_JSON.clone());

    if browser_headers {
        for (name, value) in BROWSER_HEADERS.iter() {
            builder = builder.header(name.clone(), value.clone());
        }
    }

    if let Some(token) = endpoint.bearer_token() {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    builder.body(Full::new(body))
}
