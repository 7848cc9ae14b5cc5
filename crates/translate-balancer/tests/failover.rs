//! End-to-end tests for the balancer.
//!
//! Each test starts in-process mock translation backends and a balancer on
//! ephemeral loopback ports, then talks to the balancer over real HTTP.

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use translate_balancer::config::{Config, ConfigFormat};
use translate_balancer::proxy::{create_listener, ProxyServer};

const TRANSLATION: &str = r#"{"code":200,"data":"Hallo Welt"}"#;
const PAYLOAD: &str = r#"{"text":"Hello World","source_lang":"EN","target_lang":"DE"}"#;

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

/// A mock backend answering every request with a fixed status and body.
struct MockBackend {
    url: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl MockBackend {
    async fn start(status: u16, reply: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&seen);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let recorded = Arc::clone(&recorded);
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body.collect().await.unwrap().to_bytes();
                            recorded.lock().unwrap().push(Seen {
                                path: parts.uri.path().to_string(),
                                headers: parts.headers,
                                body,
                            });
                            let response = Response::builder()
                                .status(status)
                                .header("content-type", "application/json")
                                .header("x-backend", addr.port().to_string())
                                .body(Full::new(Bytes::from_static(reply.as_bytes())))
                                .unwrap();
                            Ok::<_, Infallible>(response)
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            url: format!("http://{addr}"),
            seen,
        }
    }

    fn hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

/// An address nothing listens on.
async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

struct Balancer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Balancer {
    async fn start(config: serde_json::Value) -> Self {
        let config = Config::parse(&config.to_string(), ConfigFormat::Json).unwrap();
        let server = ProxyServer::new(&config).unwrap();
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Balancer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Loopback client that ignores any proxy set in the environment.
fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn test_failover_reaches_healthy_backend() {
    let failing = MockBackend::start(500, r#"{"error":"boom"}"#).await;
    let limited = MockBackend::start(429, r#"{"error":"slow down"}"#).await;
    let healthy = MockBackend::start(200, TRANSLATION).await;
    let closed = closed_url().await;

    let balancer = Balancer::start(json!({
        "endpoints": [
            {"url": failing.url},
            {"url": closed},
            {"url": limited.url},
            {"url": healthy.url}
        ]
    }))
    .await;

    let client = client();
    for _ in 0..5 {
        let response = client
            .post(balancer.url("/translate"))
            .header("content-type", "application/json")
            .body(PAYLOAD)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.text().await.unwrap(), TRANSLATION);
    }
    assert_eq!(healthy.hits(), 5);
}

#[tokio::test]
async fn test_all_backends_down_tries_each_once() {
    let first = MockBackend::start(500, "{}").await;
    let second = MockBackend::start(502, "{}").await;
    let closed = closed_url().await;

    let balancer = Balancer::start(json!({
        "endpoints": [{"url": first.url}, {"url": second.url}, {"url": closed}]
    }))
    .await;

    let response = client()
        .post(balancer.url("/translate"))
        .body(PAYLOAD)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"data": "Service unavailable"}"#
    );
    assert_eq!(first.hits(), 1);
    assert_eq!(second.hits(), 1);

    // every attempt carries the client's exact bytes
    for seen in first.requests().iter().chain(second.requests().iter()) {
        assert_eq!(seen.body, Bytes::from_static(PAYLOAD.as_bytes()));
    }
}

#[tokio::test]
async fn test_upstream_request_shape() {
    let backend = MockBackend::start(200, TRANSLATION).await;
    let balancer = Balancer::start(json!({
        "token": "client-secret",
        "endpoints": [{"url": backend.url, "token": "backend-secret"}]
    }))
    .await;

    let response = client()
        .post(balancer.url("/translate"))
        .header("authorization", "Bearer client-secret")
        .body(PAYLOAD)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = backend.requests();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.path, "/translate");
    assert_eq!(request.headers["content-type"], "application/json");
    assert_eq!(request.headers["authorization"], "Bearer backend-secret");
    assert!(request.headers["user-agent"]
        .to_str()
        .unwrap()
        .starts_with("Mozilla/5.0"));
    assert_eq!(request.headers["sec-fetch-mode"], "cors");
}

#[tokio::test]
async fn test_authorization_gate() {
    let backend = MockBackend::start(200, TRANSLATION).await;
    let balancer = Balancer::start(json!({
        "token": "secret",
        "endpoints": [{"url": backend.url}]
    }))
    .await;
    let client = client();

    let missing = client
        .post(balancer.url("/translate"))
        .body(PAYLOAD)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(missing.text().await.unwrap(), "Authorization required\n");

    let wrong = client
        .post(balancer.url("/translate"))
        .header("authorization", "Bearer nope")
        .body(PAYLOAD)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.text().await.unwrap(), "Authorization failed\n");

    assert_eq!(backend.hits(), 0);

    let ok = client
        .post(balancer.url("/translate"))
        .header("authorization", "Bearer secret")
        .body(PAYLOAD)
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_preflight_and_method_checks() {
    let backend = MockBackend::start(200, TRANSLATION).await;
    let balancer = Balancer::start(json!({
        "token": "secret",
        "endpoints": [{"url": backend.url}]
    }))
    .await;
    let client = client();

    let preflight = client
        .request(reqwest::Method::OPTIONS, balancer.url("/translate"))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), StatusCode::OK);
    assert_eq!(
        preflight.headers()["access-control-allow-headers"],
        "Content-Type, Authorization, X-Requested-With"
    );

    let get = client.get(balancer.url("/translate")).send().await.unwrap();
    assert_eq!(get.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(get.text().await.unwrap(), "Method not allowed\n");

    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_root_identifies_the_service() {
    let backend = MockBackend::start(200, TRANSLATION).await;
    let balancer = Balancer::start(json!({"endpoints": [{"url": backend.url}]})).await;

    let response = client().get(balancer.url("/")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.text().await.unwrap(),
        format!("Translate Balancer v{}", env!("CARGO_PKG_VERSION"))
    );
    assert_eq!(backend.hits(), 0);
}
