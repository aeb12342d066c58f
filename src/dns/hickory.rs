//! Async DNS resolver using hickory-dns.
//!
//! An alternative system resolver: it reads the platform's resolver
//! configuration (`/etc/resolv.conf` or the OS equivalent) but performs the
//! lookups itself, fully async.
//!
//! # Performance
//!
//! Unlike `GaiResolver`, this resolver is fully async and doesn't require
//! spawning blocking tasks, so dropping a lookup really cancels it. It
//! maintains connection pools to DNS servers for better performance under
//! load.

use super::{AnswerSet, Family, Name, ResolveError, ResolveStage, SystemLookup, SystemResolve};
use hickory_resolver::{
    config::{LookupIpStrategy, ResolverConfig},
    name_server::TokioConnectionProvider,
    TokioResolver,
};
use std::sync::LazyLock;

/// Async DNS resolver backed by hickory-dns.
///
/// This resolver is lazily initialized on first use and shared across
/// all instances via a static `LazyLock`. It automatically configures
/// itself based on the system's DNS settings.
///
/// # Example
///
/// ```rust,ignore
/// use dohnet::dns::{HickoryResolver, Name, SystemResolve};
///
/// let resolver = HickoryResolver::new();
/// let answers = resolver.lookup(Name::new("example.com"), None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HickoryResolver {
    resolver: &'static LazyLock<TokioResolver>,
}

impl HickoryResolver {
    /// Creates a new `HickoryResolver`.
    ///
    /// The underlying resolver is lazily initialized on first DNS query.
    /// It will attempt to read system DNS configuration; if that fails,
    /// it falls back to sensible defaults.
    pub fn new() -> Self {
        static RESOLVER: LazyLock<TokioResolver> = LazyLock::new(|| {
            let mut builder = match TokioResolver::builder_tokio() {
                Ok(builder) => {
                    tracing::debug!("Using system DNS configuration");
                    builder
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to read system DNS config, using defaults"
                    );
                    TokioResolver::builder_with_config(
                        ResolverConfig::default(),
                        TokioConnectionProvider::default(),
                    )
                }
            };

            builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

            builder.build()
        });

        Self {
            resolver: &RESOLVER,
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemResolve for HickoryResolver {
    fn lookup(&self, name: Name, family: Option<Family>) -> SystemLookup {
        let resolver = self.clone();
        Box::pin(async move {
            tracing::debug!(domain = %name, "resolving via hickory-dns");

            let lookup = resolver.resolver.lookup_ip(name.as_str()).await.map_err(|e| {
                tracing::debug!(domain = %name, error = %e, "hickory-dns lookup failed");
                if e.is_no_records_found() {
                    ResolveError::not_found(ResolveStage::System, &name).with_detail(e.to_string())
                } else {
                    ResolveError::network(ResolveStage::System, &name, e)
                }
            })?;

            let mut answers: AnswerSet = lookup.iter().collect();
            if let Some(family) = family {
                answers = answers.filter_family(family);
            }

            if answers.is_empty() {
                return Err(ResolveError::not_found(ResolveStage::System, &name)
                    .with_detail("no addresses returned"));
            }

            tracing::debug!(domain = %name, count = answers.len(), "hickory-dns resolution complete");
            Ok(answers)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hickory_resolver_invalid_domain() {
        let resolver = HickoryResolver::new();
        let result = resolver
            .lookup(Name::new("this-domain-definitely-does-not-exist.invalid"), None)
            .await;

        let err = result.expect_err("Should have error");
        assert_eq!(err.host(), "this-domain-definitely-does-not-exist.invalid");
        assert_eq!(err.stage(), ResolveStage::System);
    }

    #[test]
    fn test_hickory_resolver_is_clone() {
        let r1 = HickoryResolver::new();
        let r2 = r1.clone();
        // Both should point to the same static resolver
        assert!(std::ptr::eq(r1.resolver, r2.resolver));
    }
}
