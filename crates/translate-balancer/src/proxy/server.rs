//! ProxyServer struct and main run loop.
//!
//! The server owns the endpoint pool and the failover dispatcher; both are
//! shared read-only by every connection task.

use super::client::{create_http_client, HttpClient};
use super::dispatcher::{FailoverDispatcher, UpstreamTransport};
use super::handler::{handle_request, RequestHandlerContext};
use super::network::create_listener;
use crate::config::Config;
use crate::error::BoxError;
use crate::pool::EndpointPool;
use async_trait::async_trait;
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound on waiting for open connections after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of inbound connections.
#[async_trait]
pub(crate) trait Acceptor: Send {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn accept(&mut self) -> std::io::Result<(Self::Io, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    type Io = tokio::net::TcpStream;

    async fn accept(&mut self) -> std::io::Result<(Self::Io, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// The balancer server.
pub struct ProxyServer<T = HttpClient> {
    addr: SocketAddr,
    pool: EndpointPool,
    dispatcher: FailoverDispatcher<T>,
}

impl ProxyServer<HttpClient> {
    /// Create a new ProxyServer from configuration.
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        let addr = config.listen.socket_addr()?;
        let http_client = create_http_client(config)?;
        let dispatcher = FailoverDispatcher::new(http_client)
            .with_browser_headers(config.browser_headers)
            .with_attempt_timeout(config.connection_pool.request_timeout());

        Ok(Self::with_transport(addr, config.pool(), dispatcher))
    }
}

impl<T> ProxyServer<T>
where
    T: UpstreamTransport + 'static,
    <T::Body as Body>::Error: Into<BoxError>,
{
    /// Assemble a server around an already built dispatcher.
    pub fn with_transport(
        addr: SocketAddr,
        pool: EndpointPool,
        dispatcher: FailoverDispatcher<T>,
    ) -> Self {
        Self {
            addr,
            pool,
            dispatcher,
        }
    }

    /// Configured listen address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()>,
    {
        let listener = create_listener(self.addr())?;
        self.serve(listener, shutdown).await
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    ///
    /// Failed accepts (for example running out of file descriptors) are
    /// logged and retried. After shutdown, open connections finish their
    /// current request and close; this returns once they are gone, waiting
    /// at most 30 seconds.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()>,
    {
        info!("Listening on http://{}", listener.local_addr()?);
        self.serve_connections(listener, shutdown).await;
        Ok(())
    }

    async fn serve_connections<A, F>(self, mut acceptor: A, shutdown: F)
    where
        A: Acceptor,
        F: Future<Output = ()>,
    {
        if self.pool.is_empty() {
            warn!("No endpoints configured, every translation will be answered with 503");
        } else {
            info!("Balancing across {} endpoints", self.pool.len());
        }
        if self.pool.global_token().is_some() {
            info!("Client authorization enabled");
        }

        let server = Arc::new(self);
        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            let (io, remote_addr) = tokio::select! {
                accepted = acceptor.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        error!("Failed to accept connection: {}", err);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
                () = &mut shutdown => break,
            };
            debug!("Accepted connection from {}", remote_addr);

            let server = Arc::clone(&server);
            let service = service_fn(move |req| {
                let server = Arc::clone(&server);
                async move {
                    let ctx = RequestHandlerContext {
                        pool: &server.pool,
                        dispatcher: &server.dispatcher,
                    };
                    handle_request(&ctx, req).await
                }
            });
            let connection =
                graceful.watch(http1::Builder::new().serve_connection(TokioIo::new(io), service));

            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }

        info!("Shutdown signal received, draining open connections");
        tokio::select! {
            () = graceful.shutdown() => info!("All connections closed"),
            () = tokio::time::sleep(DRAIN_TIMEOUT) => {
                warn!("Gave up waiting for open connections after {:?}", DRAIN_TIMEOUT);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFormat, Endpoint};
    use crate::proxy::tests::{SpyReply, SpyTransport};
    use std::collections::VecDeque;
    use std::io::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::sync::oneshot;
    use tracing_test::traced_test;

    /// Hands out a scripted sequence of accept results, then waits forever.
    struct ScriptedAcceptor {
        script: VecDeque<std::io::Result<DuplexStream>>,
    }

    impl ScriptedAcceptor {
        fn new(script: Vec<std::io::Result<DuplexStream>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    #[async_trait]
    impl Acceptor for ScriptedAcceptor {
        type Io = DuplexStream;

        async fn accept(&mut self) -> std::io::Result<(DuplexStream, SocketAddr)> {
            match self.script.pop_front() {
                Some(next) => next.map(|io| (io, "127.0.0.1:40000".parse().unwrap())),
                None => std::future::pending().await,
            }
        }
    }

    fn spy_server(spy: SpyTransport) -> ProxyServer<SpyTransport> {
        ProxyServer::with_transport(
            "127.0.0.1:0".parse().unwrap(),
            EndpointPool::new("", vec![Endpoint::new("http://a")]),
            FailoverDispatcher::new(spy),
        )
    }

    async fn exchange(client: &mut DuplexStream, request: &str) -> String {
        client.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_new_uses_listen_address() {
        let config = Config::parse(
            r#"{"endpoints": [{"url": "http://127.0.0.1:1189"}],
                "listen": {"host": "127.0.0.1", "port": 9188}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let server = ProxyServer::new(&config).unwrap();
        assert_eq!(server.addr(), "127.0.0.1:9188".parse().unwrap());
    }

    #[tokio::test]
    async fn test_serve_returns_on_shutdown() {
        let config = Config::parse(
            r#"{"endpoints": [{"url": "http://127.0.0.1:1189"}]}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let server = ProxyServer::new(&config).unwrap();
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();

        let result = server.serve(listener, async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_until_binds_configured_address() {
        let server = spy_server(SpyTransport::new());
        assert_eq!(server.addr().port(), 0);
        assert!(server.run_until(async {}).await.is_ok());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_empty_pool_is_reported_at_startup() {
        let server = ProxyServer::with_transport(
            "127.0.0.1:0".parse().unwrap(),
            EndpointPool::new("", Vec::new()),
            FailoverDispatcher::new(SpyTransport::new()),
        );

        server
            .serve_connections(ScriptedAcceptor::new(Vec::new()), async {})
            .await;

        assert!(logs_contain("No endpoints configured"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_accept_errors_do_not_stop_the_server() {
        let (mut client, server_io) = tokio::io::duplex(4096);
        let acceptor = ScriptedAcceptor::new(vec![
            Err(std::io::Error::from_raw_os_error(24)), // EMFILE
            Err(ErrorKind::ConnectionAborted.into()),
            Ok(server_io),
        ]);
        let (stop, stopped) = oneshot::channel::<()>();
        let serving = tokio::spawn(spy_server(SpyTransport::new()).serve_connections(
            acceptor,
            async {
                let _ = stopped.await;
            },
        ));

        let response = exchange(
            &mut client,
            "GET / HTTP/1.1\r\nHost: balancer\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Translate Balancer v"));
        assert!(logs_contain("Failed to accept connection"));

        stop.send(()).unwrap();
        serving.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_requests_finish() {
        let (mut client, server_io) = tokio::io::duplex(4096);
        let spy = SpyTransport::new()
            .reply("http://a", SpyReply::Delayed(Duration::from_millis(300)));
        let (stop, stopped) = oneshot::channel::<()>();
        let serving = tokio::spawn(spy_server(spy).serve_connections(
            ScriptedAcceptor::new(vec![Ok(server_io)]),
            async {
                let _ = stopped.await;
            },
        ));

        client
            .write_all(b"POST /translate HTTP/1.1\r\nHost: balancer\r\nContent-Length: 2\r\n\r\n{}")
            .await
            .unwrap();
        // let the request reach the upstream before shutting down
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.send(()).unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("delayed"));

        serving.await.unwrap();
    }
}
