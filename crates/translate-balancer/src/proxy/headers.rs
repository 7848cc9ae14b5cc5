//! Static header names and values, and header map helpers.
//!
//! Header constants are built with `from_static` so that no call site needs a
//! runtime `.parse().unwrap()`.

use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, PRAGMA, UPGRADE_INSECURE_REQUESTS,
    USER_AGENT,
};

pub static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
pub static TEXT_PLAIN_UTF8: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
pub static NOSNIFF: HeaderValue = HeaderValue::from_static("nosniff");

/// CORS headers attached to every `/translate` response.
pub static CORS_HEADERS: [(HeaderName, HeaderValue); 3] = [
    (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
    (
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS, PUT, DELETE"),
    ),
    (
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    ),
];

/// Browser-like headers sent with every upstream attempt when enabled.
///
/// Some translation backends filter out requests that do not look like they
/// come from a browser.
pub static BROWSER_HEADERS: [(HeaderName, HeaderValue); 10] = [
    (
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
        ),
    ),
    (
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    ),
    (
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    ),
    (
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    ),
    (
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static(
            "\"Chromium\";v=\"94\", \"Microsoft Edge\";v=\"94\", \";Not A Brand\";v=\"99\"",
        ),
    ),
    (
        HeaderName::from_static("sec-ch-ua-mobile"),
        HeaderValue::from_static("?0"),
    ),
    (
        HeaderName::from_static("sec-ch-ua-platform"),
        HeaderValue::from_static("\"macOS\""),
    ),
    (UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1")),
    (
        HeaderName::from_static("authority"),
        HeaderValue::from_static("www.deepl.com"),
    ),
    (PRAGMA, HeaderValue::from_static("no-cache")),
];

/// Extension trait for the header manipulations the relay needs.
pub trait HeaderMapExt {
    /// Add the CORS headers the map does not already carry.
    fn apply_cors(&mut self);

    /// Copy every header of `upstream`, replacing all values of any name
    /// already present.
    fn overwrite_from(&mut self, upstream: &HeaderMap);
}

impl HeaderMapExt for HeaderMap {
    fn apply_cors(&mut self) {
        for (name, value) in CORS_HEADERS.iter() {
            self.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }

    fn overwrite_from(&mut self, upstream: &HeaderMap) {
        for name in upstream.keys() {
            self.remove(name);
            for value in upstream.get_all(name) {
                self.append(name.clone(), value.clone());
            }
        }
    }
}
