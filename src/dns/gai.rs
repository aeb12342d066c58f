//! System DNS resolver using getaddrinfo.
//!
//! This resolver uses the operating system's native DNS resolution via
//! `getaddrinfo`, executed in a thread pool to avoid blocking the async runtime.
//!
//! # When to Use
//!
//! - When you need to respect system DNS configuration (/etc/resolv.conf, etc.)
//! - As the last-resort fallback behind DoH
//! - To bootstrap the DoH endpoint's own hostname

use super::{AnswerSet, Family, Name, ResolveError, ResolveStage, SystemLookup, SystemResolve};
use crate::base::context::IoResultExt;
use std::net::ToSocketAddrs;

/// System DNS resolver using `getaddrinfo` in a thread pool.
///
/// This resolver wraps the standard library's `ToSocketAddrs` trait and
/// executes resolution in `tokio::task::spawn_blocking` to avoid blocking
/// the async runtime.
///
/// # Cancellation
///
/// `getaddrinfo` itself cannot be interrupted. Dropping the lookup future
/// (or hitting the caller's deadline) abandons the result, but the blocking
/// thread finishes the call on its own.
#[derive(Clone, Debug, Default)]
pub struct GaiResolver;

impl GaiResolver {
    /// Creates a new `GaiResolver`.
    pub fn new() -> Self {
        Self
    }
}

impl SystemResolve for GaiResolver {
    fn lookup(&self, name: Name, family: Option<Family>) -> SystemLookup {
        Box::pin(async move {
            let host = name.as_str().to_string();

            let result = tokio::task::spawn_blocking(move || {
                tracing::debug!(host = %host, "resolving via getaddrinfo");
                (host.as_str(), 0u16)
                    .to_socket_addrs()
                    .map(|iter| iter.collect::<Vec<_>>())
            })
            .await;

            // Handle task join error (cancellation, panic)
            let addrs = result
                .map_err(|e| {
                    tracing::error!(error = %e, "DNS resolution task failed");
                    ResolveError::network(ResolveStage::System, &name, e)
                })?
                .dns_context(&name, ResolveStage::System)
                .inspect_err(|e| {
                    tracing::debug!(domain = %name, error = %e, "DNS resolution failed");
                })?;

            let mut answers: AnswerSet = addrs.into_iter().map(|a| a.ip()).collect();
            if let Some(family) = family {
                answers = answers.filter_family(family);
            }

            if answers.is_empty() {
                return Err(ResolveError::not_found(ResolveStage::System, &name)
                    .with_detail("no addresses returned by getaddrinfo"));
            }

            tracing::debug!(domain = %name, count = answers.len(), "DNS resolution complete");
            Ok(answers)
        })
    }
}
