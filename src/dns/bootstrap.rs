//! Bootstrap resolution for the DoH endpoint's own hostname.
//!
//! Reaching a DoH server by name needs a resolver, and that resolver must not
//! be the DoH server. This module is the only path allowed to resolve the
//! endpoint host: it consults the override table, then the system resolver
//! under a short deadline, and never calls into DoH.

use super::{
    lookup_with_timeout, AddressPreference, AddressRecord, Name, OverrideTable, ResolveError,
    ResolveErrorKind, ResolveStage, SystemResolve,
};
use std::{fmt, net::IpAddr, sync::Arc, time::Duration};

/// Default deadline for the system lookup of the endpoint host.
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(3);

/// Resolves the DoH endpoint host without DoH.
#[derive(Clone)]
pub struct BootstrapResolver {
    overrides: Arc<OverrideTable>,
    system: Arc<dyn SystemResolve>,
    timeout: Duration,
    preference: AddressPreference,
}

impl BootstrapResolver {
    pub fn new(overrides: Arc<OverrideTable>, system: Arc<dyn SystemResolve>) -> Self {
        Self {
            overrides,
            system,
            timeout: DEFAULT_BOOTSTRAP_TIMEOUT,
            preference: AddressPreference::default(),
        }
    }

    /// Sets the deadline for the system lookup.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets which family to pick when the system returns both.
    pub fn with_preference(mut self, preference: AddressPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves `name` to the single address DoH queries will be pinned to.
    ///
    /// Order: IP literal, override table, system resolver. Any failure is
    /// reported as `BootstrapFailure` with the underlying cause as detail.
    pub async fn resolve_endpoint_host(&self, name: &Name) -> Result<IpAddr, ResolveError> {
        if let Some(record) = AddressRecord::from_literal(name.as_str()) {
            return Ok(record.address());
        }

        if let Some(ip) = self.overrides.lookup(name) {
            tracing::debug!(domain = %name, %ip, "bootstrap via override table");
            return Ok(ip);
        }

        let answers = lookup_with_timeout(
            self.system.as_ref(),
            name,
            self.preference.only_family(),
            self.timeout,
            ResolveStage::Bootstrap,
        )
        .await
        .map_err(|e| {
            tracing::warn!(domain = %name, error = %e, "bootstrap resolution failed");
            ResolveError::new(ResolveErrorKind::BootstrapFailure, ResolveStage::Bootstrap, name)
                .with_detail(e.to_string())
        })?;

        let answers = answers.prefer_family(self.preference.preferred_family());
        let record = answers.first().copied().ok_or_else(|| {
            ResolveError::new(ResolveErrorKind::BootstrapFailure, ResolveStage::Bootstrap, name)
        })?;

        tracing::debug!(domain = %name, ip = %record.address(), "bootstrap via system resolver");
        Ok(record.address())
    }
}

impl fmt::Debug for BootstrapResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapResolver")
            .field("overrides", &self.overrides)
            .field("timeout", &self.timeout)
            .field("preference", &self.preference)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{AnswerSet, Family, SystemLookup};
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSystem {
        answers: Result<AnswerSet, ResolveError>,
        calls: AtomicUsize,
    }

    impl SystemResolve for CountingSystem {
        fn lookup(&self, _name: Name, family: Option<Family>) -> SystemLookup {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let answers = self.answers.clone().map(|a| match family {
                Some(f) => a.filter_family(f),
                None => a,
            });
            Box::pin(async move { answers })
        }
    }

    fn system(answers: Result<AnswerSet, ResolveError>) -> Arc<CountingSystem> {
        Arc::new(CountingSystem {
            answers,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_override_wins_without_system_call() {
        let overrides =
            Arc::new(OverrideTable::from_pairs([("doh.example.net", "104.21.9.230")]).unwrap());
        let sys = system(Ok(AnswerSet::empty()));
        let bootstrap = BootstrapResolver::new(overrides, sys.clone());

        let ip = bootstrap
            .resolve_endpoint_host(&Name::new("DOH.example.net"))
            .await
            .unwrap();

        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(104, 21, 9, 230)));
        assert_eq!(sys.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_literal_endpoint() {
        let sys = system(Ok(AnswerSet::empty()));
        let bootstrap = BootstrapResolver::new(Arc::new(OverrideTable::new()), sys.clone());

        let ip = bootstrap
            .resolve_endpoint_host(&Name::new("1.1.1.1"))
            .await
            .unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)));
        assert_eq!(sys.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_system_fallback_prefers_family() {
        let answers: AnswerSet = vec![
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        ]
        .into_iter()
        .collect();
        let sys = system(Ok(answers));
        let bootstrap = BootstrapResolver::new(Arc::new(OverrideTable::new()), sys.clone());

        let ip = bootstrap
            .resolve_endpoint_host(&Name::new("dns.google"))
            .await
            .unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
        assert_eq!(sys.calls.load(Ordering::SeqCst), 1);

        let v6_first = bootstrap.with_preference(AddressPreference::Ipv6First);
        let ip = v6_first
            .resolve_endpoint_host(&Name::new("dns.google"))
            .await
            .unwrap();
        assert_eq!(ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_failure_is_bootstrap_failure() {
        let name = Name::new("doh.unreachable.test");
        let sys = system(Err(ResolveError::network(ResolveStage::System, &name, "down")));
        let bootstrap = BootstrapResolver::new(Arc::new(OverrideTable::new()), sys);

        let err = bootstrap.resolve_endpoint_host(&name).await.unwrap_err();
        assert_eq!(err.kind(), &ResolveErrorKind::BootstrapFailure);
        assert_eq!(err.stage(), ResolveStage::Bootstrap);
        assert!(err.detail().unwrap().contains("down"));
    }
}
