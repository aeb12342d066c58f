//! Core DNS resolution types and traits.
//!
//! This module defines the `Resolve` trait and supporting types that form
//! the foundation of the DNS abstraction layer.

use super::ResolveError;
use std::{fmt, future::Future, net::SocketAddr, pin::Pin, sync::Arc};

/// A domain name to resolve into IP addresses.
///
/// Host names are case-insensitive; the name is lowercased on construction
/// so equality and hashing ignore case. No other normalization is applied.
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    /// Creates a new [`Name`] from any string-like type.
    #[inline]
    pub fn new(host: impl AsRef<str>) -> Self {
        Self {
            host: host.as_ref().to_ascii_lowercase().into_boxed_str(),
        }
    }

    /// Validates caller input and builds a [`Name`].
    ///
    /// Empty, blank or whitespace-containing hosts are rejected with
    /// `InvalidInput`.
    pub fn parse(host: &str) -> Result<Self, ResolveError> {
        if host.trim().is_empty() {
            return Err(ResolveError::invalid_input(host, "empty hostname"));
        }
        if host.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ResolveError::invalid_input(host, "hostname contains whitespace"));
        }
        Ok(Self::new(host))
    }

    /// View the hostname as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Alias for an `Iterator` trait object over `SocketAddr`.
pub type Addrs = Box<dyn Iterator<Item = SocketAddr> + Send>;

/// Alias for the `Future` type returned by a DNS resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, ResolveError>> + Send>>;

/// Trait for DNS resolution.
///
/// This is the hook a connection attempt calls before dialing, equivalent
/// to Chromium's `HostResolver`. Implementations must be thread-safe.
///
/// # Design Notes
///
/// - Uses `&self` for concurrent resolution without mutable access.
/// - Returns boxed futures for trait object compatibility.
/// - Dropping the future cancels the resolution.
pub trait Resolve: Send + Sync {
    /// Resolves a domain name to IP addresses.
    ///
    /// The returned addresses will have port 0; callers should set the
    /// appropriate port based on the target service.
    fn resolve(&self, name: Name) -> Resolving;
}

/// Blanket implementation for Arc-wrapped resolvers.
impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, name: Name) -> Resolving {
        (**self).resolve(name)
    }
}
