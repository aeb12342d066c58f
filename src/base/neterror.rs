use crate::dns::ResolveError;
use std::{io, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Address invalid")]
    AddressInvalid,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Name resolution failed")]
    NameResolutionFailed,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Response body too big to drain")]
    ResponseBodyTooBigToDrain,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,

    // Context-rich variants
    #[error("Connection to {host}:{port} failed: {source}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        #[source]
        source: Arc<io::Error>,
    },
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    /// Creates a [`NetError::ConnectionFailedTo`] from an IO error.
    pub fn connection_failed_to(host: &str, port: u16, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            _ => NetError::ConnectionFailedTo {
                host: host.to_string(),
                port,
                source: Arc::new(source),
            },
        }
    }

    /// Returns true if the error happened while resolving the host name.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            NetError::NameNotResolved | NetError::NameResolutionFailed | NetError::Resolution(_)
        )
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::SslProtocolError => -107,
            NetError::AddressInvalid => -108,
            NetError::AddressUnreachable => -109,
            NetError::ConnectionTimedOut => -118,
            NetError::NameResolutionFailed => -137,

            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidResponse => -320,
            NetError::EmptyResponse => -324,
            NetError::ResponseBodyTooBigToDrain => -345,
            NetError::InvalidHttpResponse => -370,

            NetError::ConnectionFailedTo { .. } => -104,
            NetError::Resolution(_) => -105,
            NetError::Unknown(code) => *code,
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -108 => NetError::AddressInvalid,
            -109 => NetError::AddressUnreachable,
            -118 => NetError::ConnectionTimedOut,
            -137 => NetError::NameResolutionFailed,

            -300 => NetError::InvalidUrl,
            -302 => NetError::UnknownUrlScheme,
            -320 => NetError::InvalidResponse,
            -324 => NetError::EmptyResponse,
            -345 => NetError::ResponseBodyTooBigToDrain,
            -370 => NetError::InvalidHttpResponse,
            _ => NetError::Unknown(code),
        }
    }
}
