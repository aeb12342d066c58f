//! HTTP exchange with the DoH endpoint.

use super::Name;
use crate::base::neterror::NetError;
use crate::socket::connectjob::ConnectJob;
use bytes::Bytes;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

/// Upper bound on a DoH response body.
pub const MAX_RESPONSE_BODY: usize = 64 * 1024;

/// One DoH HTTP exchange, pinned to an already-resolved address.
#[derive(Debug)]
pub struct DohRequest {
    pub addr: SocketAddr,
    /// Endpoint hostname, for SNI and certificate checks.
    pub server_name: Name,
    pub tls: bool,
    pub request: Request<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DohResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

pub type TransportFuture = Pin<Box<dyn Future<Output = Result<DohResponse, NetError>> + Send>>;

/// Sends a DoH request and returns the raw response.
///
/// The future is driven entirely by the caller; dropping it tears down the
/// connection.
pub trait DohTransport: Send + Sync {
    fn send(&self, request: DohRequest) -> TransportFuture;
}

impl<T: DohTransport + ?Sized> DohTransport for std::sync::Arc<T> {
    fn send(&self, request: DohRequest) -> TransportFuture {
        (**self).send(request)
    }
}

/// HTTP/1.1 over TCP or BoringSSL, one connection per exchange.
#[derive(Debug, Clone, Default)]
pub struct HttpsTransport {
    connect_job: ConnectJob,
}

impl HttpsTransport {
    pub fn new(connect_job: ConnectJob) -> Self {
        Self { connect_job }
    }

    async fn exchange(connect_job: ConnectJob, req: DohRequest) -> Result<DohResponse, NetError> {
        let DohRequest {
            addr,
            server_name,
            tls,
            request,
        } = req;

        let socket = connect_job.connect_to(addr, server_name.as_str(), tls).await?;
        let io = TokioIo::new(socket);
        let (mut sender, conn) = http1::handshake::<_, Full<Bytes>>(io)
            .await
            .map_err(|_| NetError::ConnectionFailed)?;

        let request = request.map(Full::new);
        let response = async move {
            let response = sender.send_request(request).await.map_err(|e| {
                tracing::debug!(error = %e, "DoH request failed");
                NetError::ConnectionClosed
            })?;
            let status = response.status();
            let body = Limited::new(response.into_body(), MAX_RESPONSE_BODY)
                .collect()
                .await
                .map_err(|e| {
                    if e.downcast_ref::<LengthLimitError>().is_some() {
                        NetError::ResponseBodyTooBigToDrain
                    } else {
                        NetError::InvalidHttpResponse
                    }
                })?
                .to_bytes();
            Ok::<_, NetError>(DohResponse { status, body })
        };
        tokio::pin!(response);
        tokio::pin!(conn);

        // The connection is driven here rather than on a spawned task, so a
        // cancelled lookup leaves nothing running.
        let finished = tokio::select! {
            res = &mut response => Some(res),
            res = &mut conn => {
                if let Err(e) = res {
                    tracing::debug!(error = %e, "DoH connection failed");
                    return Err(NetError::ConnectionReset);
                }
                None
            }
        };

        match finished {
            Some(res) => res,
            // Server closed after writing the response; it is already buffered.
            None => response.await,
        }
    }
}

impl DohTransport for HttpsTransport {
    fn send(&self, request: DohRequest) -> TransportFuture {
        Box::pin(Self::exchange(self.connect_job.clone(), request))
    }
}
