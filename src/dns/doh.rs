//! DNS-over-HTTPS client.
//!
//! A query is one HTTP exchange with the configured endpoint. The endpoint
//! host is resolved by the [`BootstrapResolver`] first and the connection is
//! pinned to that address, so DoH never depends on itself.

use super::{
    json, wire, AnswerSet, BootstrapResolver, DohRequest, DohTransport, Name, RecordType,
    ResolveError, ResolveErrorKind, ResolveStage, ResolverEndpoint,
};
use crate::base::neterror::NetError;
use std::{fmt, future::Future, net::SocketAddr, pin::Pin, sync::Arc, time::Duration};

/// Default deadline for one DoH exchange, bootstrap excluded.
pub const DEFAULT_DOH_TIMEOUT: Duration = Duration::from_secs(5);

/// Addresses returned by one DoH query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DohAnswer {
    pub answers: AnswerSet,
    /// Smallest TTL among the returned records, when the endpoint reported one.
    pub ttl: Option<Duration>,
}

impl DohAnswer {
    pub fn new(answers: AnswerSet, ttl: Option<Duration>) -> Self {
        Self { answers, ttl }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

pub type DohQuerying = Pin<Box<dyn Future<Output = Result<DohAnswer, ResolveError>> + Send>>;

/// Something that can answer a single-type DoH query.
pub trait DohLookup: Send + Sync {
    fn query(&self, name: &Name, record_type: RecordType) -> DohQuerying;

    /// The host that must never be resolved through this lookup.
    fn endpoint_host(&self) -> Option<&Name> {
        None
    }
}

impl<D: DohLookup + ?Sized> DohLookup for Arc<D> {
    fn query(&self, name: &Name, record_type: RecordType) -> DohQuerying {
        (**self).query(name, record_type)
    }

    fn endpoint_host(&self) -> Option<&Name> {
        (**self).endpoint_host()
    }
}

struct Inner {
    endpoint: ResolverEndpoint,
    bootstrap: BootstrapResolver,
    transport: Arc<dyn DohTransport>,
    timeout: Duration,
}

/// Queries a DoH endpoint over an injected transport.
#[derive(Clone)]
pub struct DohClient {
    inner: Arc<Inner>,
}

impl DohClient {
    pub fn new(
        endpoint: ResolverEndpoint,
        bootstrap: BootstrapResolver,
        transport: Arc<dyn DohTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                bootstrap,
                transport,
                timeout: DEFAULT_DOH_TIMEOUT,
            }),
        }
    }

    /// Sets the per-exchange deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let inner = Inner {
            endpoint: self.inner.endpoint.clone(),
            bootstrap: self.inner.bootstrap.clone(),
            transport: self.inner.transport.clone(),
            timeout,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn endpoint(&self) -> &ResolverEndpoint {
        &self.inner.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Asks the endpoint for `record_type` records of `name`.
    ///
    /// An answer with no usable records is `Ok` with an empty set; the
    /// caller decides whether to fall back.
    pub async fn lookup(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<DohAnswer, ResolveError> {
        Self::run(self.inner.clone(), name.clone(), record_type).await
    }

    async fn run(
        inner: Arc<Inner>,
        name: Name,
        record_type: RecordType,
    ) -> Result<DohAnswer, ResolveError> {
        let endpoint = &inner.endpoint;
        let ip = inner.bootstrap.resolve_endpoint_host(endpoint.host()).await?;
        let addr = SocketAddr::new(ip, endpoint.port());
        let request = endpoint.build_request(&name, record_type)?;

        tracing::debug!(
            domain = %name,
            %record_type,
            endpoint = %endpoint.host(),
            %addr,
            "sending DoH query"
        );

        let exchange = inner.transport.send(DohRequest {
            addr,
            server_name: endpoint.host().clone(),
            tls: endpoint.is_tls(),
            request,
        });

        let response = match tokio::time::timeout(inner.timeout, exchange).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(transport_error(e, &name)),
            Err(_) => {
                tracing::debug!(domain = %name, timeout = ?inner.timeout, "DoH query timed out");
                return Err(ResolveError::timeout(ResolveStage::Doh, &name));
            }
        };

        let status = response.status.as_u16();
        if !response.status.is_success() {
            return Err(ResolveError::upstream(status, &name)
                .with_detail(format!("HTTP status {}", response.status)));
        }

        let answer = if endpoint.method().is_wire() {
            wire::parse_response(&response.body, &name, record_type, status)?
        } else {
            json::parse_response(&response.body, &name, record_type, status)?
        };

        tracing::debug!(
            domain = %name,
            %record_type,
            count = answer.answers.len(),
            ttl = ?answer.ttl,
            "DoH answer"
        );
        Ok(answer)
    }
}

fn transport_error(err: NetError, name: &Name) -> ResolveError {
    let kind = match err {
        NetError::ConnectionTimedOut => ResolveErrorKind::Timeout,
        _ => ResolveErrorKind::Network,
    };
    ResolveError::new(kind, ResolveStage::Doh, name).with_detail(err.to_string())
}

impl DohLookup for DohClient {
    fn query(&self, name: &Name, record_type: RecordType) -> DohQuerying {
        Box::pin(Self::run(self.inner.clone(), name.clone(), record_type))
    }

    fn endpoint_host(&self) -> Option<&Name> {
        Some(self.inner.endpoint.host())
    }
}

impl fmt::Debug for DohClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DohClient")
            .field("endpoint", &self.inner.endpoint.url().as_str())
            .field("method", &self.inner.endpoint.method())
            .field("bootstrap", &self.inner.bootstrap)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}
