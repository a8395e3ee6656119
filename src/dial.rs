//! Connecting to the server named by a URL, and checking it end to end.

use crate::{probe, Error};
use futures_util::future::{BoxFuture, FutureExt};
use pin_project::pin_project;
use rustls::ClientConfig;
use rustls_pki_types::ServerName;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tower_service::Service;
use url::{Host, Url};

/// A connection to an HTTP or HTTPS server.
#[pin_project(project = ConnectionProj)]
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Connection {
    /// Plain TCP, for `http` URLs.
    Plain(#[pin] TcpStream),
    /// TLS over TCP, for `https` URLs.
    Tls(#[pin] TlsStream<TcpStream>),
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            ConnectionProj::Plain(s) => s.poll_read(cx, buf),
            ConnectionProj::Tls(s) => s.poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.project() {
            ConnectionProj::Plain(s) => s.poll_write(cx, buf),
            ConnectionProj::Tls(s) => s.poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            ConnectionProj::Plain(s) => s.poll_flush(cx),
            ConnectionProj::Tls(s) => s.poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.project() {
            ConnectionProj::Plain(s) => s.poll_shutdown(cx),
            ConnectionProj::Tls(s) => s.poll_shutdown(cx),
        }
    }
}

/// TLS configuration that verifies servers against the platform's certificate store.
fn default_tls_config() -> Arc<ClientConfig> {
    Arc::new(
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(rustls_platform_verifier::Verifier::new()))
            .with_no_client_auth(),
    )
}

/// Checks servers for HTTP pipelining support.
///
/// A `Checker` is also a [`Service`] from URLs to verdicts, so it can be wrapped in tower
/// middleware like any other service.
///
/// ```no_run
/// # async fn run() -> Result<(), http_pipelining::Error> {
/// use std::time::Duration;
/// use http_pipelining::Checker;
///
/// let checker = Checker::new().timeout(Duration::from_secs(5));
/// if checker.check("http://www.example.com").await? {
///     println!("pipelining works");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Checker {
    connect_timeout: Duration,
    timeout: Duration,
    tls_config: Option<Arc<ClientConfig>>,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .field("custom_tls", &self.tls_config.is_some())
            .finish()
    }
}

impl Checker {
    /// Make a checker with a 30 second connect timeout and a 60 second probe timeout, which
    /// verifies TLS servers using the platform's certificate store.
    pub fn new() -> Self {
        Checker {
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(60),
            tls_config: None,
        }
    }

    /// Limit how long establishing a connection (including the TLS handshake) may take.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Limit how long the probe may take once connected.
    ///
    /// A server that never answers would otherwise stall the check forever.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use the given TLS configuration for `https` URLs.
    pub fn tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Connect to the server named by `url`.
    ///
    /// Returns the connection and the bare host name, for use in the `Host` header.
    pub async fn dial(&self, url: &str) -> Result<(Connection, String), Error> {
        let url = Url::parse(url)?;
        let tls = match url.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(Error::UnsupportedScheme(other.to_string())),
        };

        let host = match url.host() {
            Some(Host::Domain(d)) if !d.is_empty() => d.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            _ => return Err(Error::MissingHost),
        };
        // the url crate fills in 80 and 443 for us
        let port = url.port_or_known_default().unwrap_or(if tls { 443 } else { 80 });

        tracing::debug!(%host, port, tls, "dialing");
        let conn = tokio::time::timeout(self.connect_timeout, self.connect(&host, port, tls)).await??;
        Ok((conn, host))
    }

    async fn connect(&self, host: &str, port: u16, tls: bool) -> Result<Connection, Error> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(Error::Connect)?;
        if !tls {
            return Ok(Connection::Plain(stream));
        }

        let config = self.tls_config.clone().unwrap_or_else(default_tls_config);
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|e| Error::Tls(e.to_string()))?;
        let stream = TlsConnector::from(config)
            .connect(server_name, stream)
            .await
            .map_err(|e| Error::Tls(e.to_string()))?;
        Ok(Connection::Tls(stream))
    }

    /// Check whether the server named by `url` supports HTTP pipelining.
    ///
    /// The connection is closed before this returns, whatever the outcome.
    pub async fn check(&self, url: &str) -> Result<bool, Error> {
        let (mut conn, host) = self.dial(url).await?;

        let available =
            tokio::time::timeout(self.timeout, probe::supported(&mut conn, &host)).await;
        if available.is_ok() {
            let _ = tokio::time::timeout(self.timeout, conn.shutdown()).await;
        }

        let available = available??;
        tracing::debug!(url, available, "pipelining check finished");
        Ok(available)
    }
}

impl Service<String> for Checker {
    type Response = bool;
    type Error = Error;
    type Future = BoxFuture<'static, Result<bool, Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, url: String) -> Self::Future {
        let checker = self.clone();
        async move { checker.check(&url).await }.boxed()
    }
}

/// Connect to the server named by `url` using a default [`Checker`].
///
/// `url` must have scheme `http` or `https`; the port defaults to 80 or 443 respectively.
/// Returns the connection and the bare host name, for use in the `Host` header.
pub async fn dial(url: &str) -> Result<(Connection, String), Error> {
    Checker::new().dial(url).await
}

/// Check whether the server named by `url` supports HTTP pipelining, using a default
/// [`Checker`].
pub async fn available(url: &str) -> Result<bool, Error> {
    Checker::new().check(url).await
}
