use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::{Name, Resolve};
use crate::socket::client::SocketType;
use crate::socket::tls::TlsConfig;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Manages the connection process: DNS -> TCP -> TLS.
///
/// Name resolution goes through the [`Resolve`] hook when one is set, so a
/// `ConnectJob` built around a `ResolutionAdapter` honours overrides and DoH
/// for every host it dials. Without one, tokio's `lookup_host` is used.
#[derive(Clone)]
pub struct ConnectJob {
    resolver: Option<Arc<dyn Resolve>>,
    tls: TlsConfig,
    connect_timeout: Duration,
}

impl ConnectJob {
    pub fn new() -> Self {
        Self {
            resolver: None,
            tls: TlsConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolves the URL host and connects to the first reachable address.
    pub async fn connect(&self, url: &Url) -> Result<SocketType, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(NetError::UnknownUrlScheme),
        };

        // 1. DNS Resolution
        let addrs: Vec<SocketAddr> = match (host.parse::<IpAddr>(), &self.resolver) {
            (Ok(ip), _) => vec![SocketAddr::new(ip, port)],
            (Err(_), Some(resolver)) => resolver
                .resolve(Name::new(host))
                .await?
                .map(|mut addr| {
                    addr.set_port(port);
                    addr
                })
                .collect(),
            (Err(_), None) => tokio::net::lookup_host((host, port))
                .await
                .map_err(|_| NetError::NameNotResolved)?
                .collect(),
        };

        // 2. TCP Connect, first address that answers wins
        let mut last_err = NetError::NameNotResolved;
        for addr in addrs {
            match self.connect_tcp(addr, host).await {
                Ok(stream) => return self.finish(stream, host, tls).await,
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "connect attempt failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Connects to a pre-resolved address. `server_name` is used for SNI and
    /// certificate verification when `tls` is set.
    pub async fn connect_to(
        &self,
        addr: SocketAddr,
        server_name: &str,
        tls: bool,
    ) -> Result<SocketType, NetError> {
        let stream = self.connect_tcp(addr, server_name).await?;
        self.finish(stream, server_name, tls).await
    }

    async fn connect_tcp(&self, addr: SocketAddr, host: &str) -> Result<TcpStream, NetError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| NetError::ConnectionTimedOut)?
            .connection_context(host, addr.port())?;
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    // 3. TLS Handshake (if https)
    async fn finish(
        &self,
        stream: TcpStream,
        host: &str,
        tls: bool,
    ) -> Result<SocketType, NetError> {
        if !tls {
            return Ok(SocketType::Tcp(stream));
        }

        let connector = self.tls.build_connector()?;
        let mut config = connector.configure().map_err(|_| NetError::SslProtocolError)?;
        if !TlsConfig::should_set_sni(host) {
            config.set_use_server_name_indication(false);
            config.set_verify_hostname(false);
        }

        let tls_stream = tokio_boring::connect(config, host, stream).await.map_err(|e| {
            tracing::warn!(host, error = ?e, "TLS handshake failed");
            NetError::SslProtocolError
        })?;

        Ok(SocketType::Ssl(tls_stream))
    }
}

impl Default for ConnectJob {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectJob")
            .field("has_resolver", &self.resolver.is_some())
            .field("tls", &self.tls)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
