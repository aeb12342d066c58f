//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into context-rich `NetError` and `ResolveError` values.

use crate::base::neterror::NetError;
use crate::dns::{Name, ResolveError, ResolveErrorKind, ResolveStage};
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add connection context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use dohnet::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("example.com", 443)?;
    /// // Error: "Connection to example.com:443 failed: connection refused"
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// Add DNS resolution context to an IO error.
    fn dns_context(self, name: &Name, stage: ResolveStage) -> Result<T, ResolveError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| NetError::connection_failed_to(host, port, e))
    }

    fn dns_context(self, name: &Name, stage: ResolveStage) -> Result<T, ResolveError> {
        self.map_err(|e| {
            ResolveError::new(classify_lookup_error(&e), stage, name).with_detail(e.to_string())
        })
    }
}

/// Maps a platform lookup failure onto the resolution error taxonomy.
///
/// `getaddrinfo` failures surface as uncategorized IO errors, so the
/// message is inspected for the "host does not exist" family of codes.
fn classify_lookup_error(err: &io::Error) -> ResolveErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ResolveErrorKind::NotFound,
        io::ErrorKind::TimedOut => ResolveErrorKind::Timeout,
        io::ErrorKind::InvalidInput => ResolveErrorKind::InvalidInput,
        _ => {
            let msg = err.to_string().to_ascii_lowercase();
            if msg.contains("not known")
                || msg.contains("no address associated")
                || msg.contains("nodename nor servname")
                || msg.contains("no such host")
            {
                ResolveErrorKind::NotFound
            } else {
                ResolveErrorKind::Network
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_connection_context() {
        let result: Result<(), io::Error> =
            Err(Error::new(ErrorKind::ConnectionRefused, "refused"));
        let err = result.connection_context("example.com", 443).unwrap_err();

        match err {
            NetError::ConnectionFailedTo { host, port, .. } => {
                assert_eq!(host, "example.com");
                assert_eq!(port, 443);
            }
            _ => panic!("Expected ConnectionFailedTo"),
        }
    }

    #[test]
    fn test_connection_context_timeout() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::TimedOut, "slow"));
        let err = result.connection_context("example.com", 443).unwrap_err();
        assert!(matches!(err, NetError::ConnectionTimedOut));
    }

    #[test]
    fn test_dns_context() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::NotFound, "no such host"));
        let err = result
            .dns_context(&Name::new("unknown.example.com"), ResolveStage::System)
            .unwrap_err();

        assert_eq!(err.kind(), &ResolveErrorKind::NotFound);
        assert_eq!(err.stage(), ResolveStage::System);
        assert_eq!(err.host(), "unknown.example.com");
    }

    #[test]
    fn test_dns_context_gai_message() {
        let result: Result<(), io::Error> = Err(Error::new(
            ErrorKind::Other,
            "failed to lookup address information: Name or service not known",
        ));
        let err = result
            .dns_context(&Name::new("nonexistent.invalid"), ResolveStage::System)
            .unwrap_err();
        assert_eq!(err.kind(), &ResolveErrorKind::NotFound);

        let result: Result<(), io::Error> =
            Err(Error::new(ErrorKind::Other, "Temporary failure in name resolution"));
        let err = result
            .dns_context(&Name::new("example.com"), ResolveStage::System)
            .unwrap_err();
        assert_eq!(err.kind(), &ResolveErrorKind::Network);
    }
}
