//! The resolution pipeline handed to connection establishment.
//!
//! For a hostname the adapter tries, in order: IP literal, override table,
//! (bootstrap for the DoH endpoint's own host), address cache, DoH, and the
//! system resolver. The first stage with an answer wins.

use super::{
    lookup_with_timeout, AddressCache, AddressPreference, AddressRecord, Addrs, AnswerSet,
    BootstrapResolver, ConfigError, DohClient, DohLookup, Family, GaiResolver, HickoryResolver,
    HttpsTransport, Name, OverrideTable, RecordType, Resolve, ResolveError, ResolveStage,
    ResolverSettings, Resolving, SystemResolve, SystemResolverKind,
};
use crate::dns::cache::DEFAULT_TTL;
use std::{fmt, net::IpAddr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

/// Default deadline for the system fallback.
pub const DEFAULT_SYSTEM_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-call resolution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Return every address instead of one picked at random.
    pub all: bool,
    /// Restrict the answer to one family.
    pub family: Option<Family>,
}

impl ResolveOptions {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            all: true,
            family: None,
        }
    }

    pub fn with_family(mut self, family: Family) -> Self {
        self.family = Some(family);
        self
    }
}

/// Outcome of a resolution: one address, or all of them in answer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    One(AddressRecord),
    All(AnswerSet),
}

impl Resolution {
    /// The chosen address, or the first one of a full set.
    pub fn address(&self) -> Option<IpAddr> {
        match self {
            Resolution::One(record) => Some(record.address()),
            Resolution::All(answers) => answers.first().map(|r| r.address()),
        }
    }

    pub fn into_answer_set(self) -> AnswerSet {
        match self {
            Resolution::One(record) => AnswerSet::single(record),
            Resolution::All(answers) => answers,
        }
    }
}

/// Resolves hostnames through overrides, cache, DoH and the system resolver.
///
/// Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct ResolutionAdapter {
    overrides: Arc<OverrideTable>,
    cache: AddressCache,
    doh: Option<Arc<dyn DohLookup>>,
    bootstrap: BootstrapResolver,
    system: Arc<dyn SystemResolve>,
    preference: AddressPreference,
    default_ttl: Duration,
    respect_upstream_ttl: bool,
    system_timeout: Duration,
}

impl ResolutionAdapter {
    /// An adapter without DoH: overrides, cache and the system resolver.
    ///
    /// The bootstrap resolver shares `overrides` and `system`.
    pub fn new(overrides: OverrideTable, system: Arc<dyn SystemResolve>) -> Self {
        let overrides = Arc::new(overrides);
        let bootstrap = BootstrapResolver::new(overrides.clone(), system.clone());
        Self {
            overrides,
            cache: AddressCache::new(),
            doh: None,
            bootstrap,
            system,
            preference: AddressPreference::default(),
            default_ttl: DEFAULT_TTL,
            respect_upstream_ttl: true,
            system_timeout: DEFAULT_SYSTEM_TIMEOUT,
        }
    }

    /// Builds the full pipeline described by `settings`.
    pub fn from_settings(settings: &ResolverSettings) -> Result<Self, ConfigError> {
        let overrides = Arc::new(settings.override_table()?);
        let endpoint = settings.endpoint()?;

        let system: Arc<dyn SystemResolve> = match settings.system_resolver {
            SystemResolverKind::Gai => Arc::new(GaiResolver::new()),
            SystemResolverKind::Hickory => Arc::new(HickoryResolver::new()),
        };

        let bootstrap = BootstrapResolver::new(overrides.clone(), system.clone())
            .with_timeout(settings.bootstrap_timeout())
            .with_preference(settings.address_preference);

        let doh = DohClient::new(endpoint, bootstrap.clone(), Arc::new(HttpsTransport::default()))
            .with_timeout(settings.doh_timeout());

        let cache = settings
            .cache_capacity
            .map_or_else(AddressCache::new, AddressCache::with_capacity);

        tracing::debug!(?settings, "resolution adapter configured");

        Ok(Self {
            overrides,
            cache,
            doh: Some(Arc::new(doh)),
            bootstrap,
            system,
            preference: settings.address_preference,
            default_ttl: settings.default_ttl(),
            respect_upstream_ttl: settings.respect_upstream_ttl,
            system_timeout: settings.system_timeout(),
        })
    }

    /// Routes lookups through `doh` before the system resolver.
    pub fn with_doh(mut self, doh: Arc<dyn DohLookup>) -> Self {
        self.doh = Some(doh);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: BootstrapResolver) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_cache(mut self, cache: AddressCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_preference(mut self, preference: AddressPreference) -> Self {
        self.preference = preference;
        self
    }

    /// Cache lifetime for answers without an upstream TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// When false, every DoH answer is cached for the default TTL.
    pub fn with_upstream_ttl(mut self, respect: bool) -> Self {
        self.respect_upstream_ttl = respect;
        self
    }

    pub fn with_system_timeout(mut self, timeout: Duration) -> Self {
        self.system_timeout = timeout;
        self
    }

    /// A view of this adapter with `extra` layered over its overrides.
    ///
    /// Entries in `extra` win. The cache and DoH client are shared.
    pub fn with_extra_overrides(&self, extra: &OverrideTable) -> Self {
        let mut adapter = self.clone();
        adapter.overrides = Arc::new(self.overrides.merged(extra));
        adapter
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    pub fn cache(&self) -> &AddressCache {
        &self.cache
    }

    pub fn preference(&self) -> AddressPreference {
        self.preference
    }

    /// Resolves `host` and selects per `opts`.
    ///
    /// A single answer is picked uniformly at random among the records of
    /// the preferred family; `all` returns the ordered set unchanged.
    pub async fn resolve(
        &self,
        host: &str,
        opts: ResolveOptions,
    ) -> Result<Resolution, ResolveError> {
        let answers = self.lookup(host, opts.family).await?;

        if opts.all {
            return Ok(Resolution::All(answers));
        }

        let preferred = match answers.first() {
            Some(first) => answers.filter_family(first.family()),
            None => return Err(ResolveError::not_found(ResolveStage::Input, &Name::new(host))),
        };
        preferred
            .choose_random(&mut rand::thread_rng())
            .map(Resolution::One)
            .ok_or_else(|| ResolveError::not_found(ResolveStage::Input, &Name::new(host)))
    }

    /// Runs the resolution pipeline, returning every address found.
    pub async fn lookup(
        &self,
        host: &str,
        family: Option<Family>,
    ) -> Result<AnswerSet, ResolveError> {
        if let Some(record) = AddressRecord::from_literal(host.trim()) {
            return Ok(AnswerSet::single(record));
        }

        let name = Name::parse(host)?;

        if let Some(ip) = self.overrides.lookup(&name) {
            tracing::debug!(domain = %name, %ip, "resolved via override table");
            return Ok(AnswerSet::single(AddressRecord::new(ip)));
        }

        if self.is_endpoint_host(&name) {
            let ip = self.bootstrap.resolve_endpoint_host(&name).await?;
            return Ok(AnswerSet::single(AddressRecord::new(ip)));
        }

        let record_types = self.preference.record_types(family);

        for &record_type in record_types {
            if let Some(answers) = self.cache.get(&name, record_type) {
                tracing::debug!(domain = %name, %record_type, "cache hit");
                return Ok(answers);
            }
        }

        if let Some(doh) = &self.doh {
            match self.query_doh(doh.as_ref(), &name, record_types).await {
                Ok(Some(answers)) => return Ok(answers),
                Ok(None) => {
                    tracing::debug!(domain = %name, "DoH returned no addresses, using system resolver")
                }
                Err(e) => {
                    tracing::warn!(domain = %name, error = %e, "DoH failed, using system resolver")
                }
            }
        }

        let answers = lookup_with_timeout(
            self.system.as_ref(),
            &name,
            family.or(self.preference.only_family()),
            self.system_timeout,
            ResolveStage::System,
        )
        .await
        .inspect_err(|e| tracing::warn!(domain = %name, error = %e, "all resolvers failed"))?;

        tracing::debug!(domain = %name, count = answers.len(), "resolved via system resolver");
        Ok(answers.prefer_family(family.unwrap_or(self.preference.preferred_family())))
    }

    fn is_endpoint_host(&self, name: &Name) -> bool {
        self.doh
            .as_ref()
            .and_then(|doh| doh.endpoint_host())
            .is_some_and(|host| host == name)
    }

    /// Queries each record type in turn; the first non-empty answer is
    /// cached and returned.
    async fn query_doh(
        &self,
        doh: &dyn DohLookup,
        name: &Name,
        record_types: &[RecordType],
    ) -> Result<Option<AnswerSet>, ResolveError> {
        for &record_type in record_types {
            let answer = doh.query(name, record_type).await?;
            if answer.answers.is_empty() {
                continue;
            }

            let ttl = match answer.ttl {
                Some(ttl) if self.respect_upstream_ttl => ttl,
                _ => self.default_ttl,
            };
            self.cache.put(name.clone(), record_type, answer.answers.clone(), ttl);

            tracing::debug!(
                domain = %name,
                %record_type,
                count = answer.answers.len(),
                ?ttl,
                "resolved via DoH"
            );
            return Ok(Some(answer.answers));
        }
        Ok(None)
    }

    /// Resolves on a spawned task and hands the result to `callback`.
    ///
    /// The callback runs exactly once: with the result, or with a
    /// `Cancelled` error if the handle is cancelled or the task is dropped
    /// before finishing.
    pub fn resolve_with_callback<F>(
        &self,
        host: impl Into<String>,
        opts: ResolveOptions,
        callback: F,
    ) -> ResolveHandle
    where
        F: FnOnce(Result<Resolution, ResolveError>) + Send + 'static,
    {
        let adapter = self.clone();
        let host = host.into();
        let completion = Completion {
            host: host.clone(),
            callback: Some(callback),
        };

        let task = tokio::spawn(async move {
            let mut completion = completion;
            let result = adapter.resolve(&host, opts).await;
            completion.complete(result);
        });

        ResolveHandle { task }
    }
}

impl Resolve for ResolutionAdapter {
    fn resolve(&self, name: Name) -> Resolving {
        let adapter = self.clone();
        Box::pin(async move {
            let resolution = adapter.resolve(name.as_str(), ResolveOptions::single()).await?;
            let addrs: Addrs = Box::new(resolution.into_answer_set().to_socket_addrs().into_iter());
            Ok(addrs)
        })
    }
}

impl fmt::Debug for ResolutionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionAdapter")
            .field("overrides", &self.overrides)
            .field("cache", &self.cache)
            .field("doh_endpoint", &self.doh.as_ref().and_then(|d| d.endpoint_host()))
            .field("preference", &self.preference)
            .field("default_ttl", &self.default_ttl)
            .field("respect_upstream_ttl", &self.respect_upstream_ttl)
            .field("system_timeout", &self.system_timeout)
            .finish_non_exhaustive()
    }
}

/// Delivers the result to a callback once, or `Cancelled` on drop.
struct Completion<F>
where
    F: FnOnce(Result<Resolution, ResolveError>),
{
    host: String,
    callback: Option<F>,
}

impl<F> Completion<F>
where
    F: FnOnce(Result<Resolution, ResolveError>),
{
    fn complete(&mut self, result: Result<Resolution, ResolveError>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl<F> Drop for Completion<F>
where
    F: FnOnce(Result<Resolution, ResolveError>),
{
    fn drop(&mut self) {
        if self.callback.is_some() {
            tracing::debug!(host = %self.host, "resolution cancelled");
            let err = ResolveError::cancelled(&Name::new(&self.host));
            self.complete(Err(err));
        }
    }
}

/// Handle to a resolution started by
/// [`ResolutionAdapter::resolve_with_callback`].
#[derive(Debug)]
pub struct ResolveHandle {
    task: JoinHandle<()>,
}

impl ResolveHandle {
    /// Stops the resolution. The callback receives `Cancelled` unless it
    /// already ran.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the callback has run.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DohAnswer, DohQuerying, SystemLookup};
    use std::net::{Ipv4Addr, Ipv6Addr};

    struct StaticSystem(Vec<IpAddr>);

    impl SystemResolve for StaticSystem {
        fn lookup(&self, name: Name, family: Option<Family>) -> SystemLookup {
            let answers: AnswerSet = self
                .0
                .iter()
                .copied()
                .filter(|ip| family.map_or(true, |f| Family::of(ip) == f))
                .collect();
            Box::pin(async move {
                if answers.is_empty() {
                    Err(ResolveError::not_found(ResolveStage::System, &name))
                } else {
                    Ok(answers)
                }
            })
        }
    }

    struct EmptyDoh;

    impl DohLookup for EmptyDoh {
        fn query(&self, _name: &Name, _record_type: RecordType) -> DohQuerying {
            Box::pin(async { Ok(DohAnswer::empty()) })
        }
    }

    fn v4(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, last))
    }

    #[tokio::test]
    async fn test_literal_bypasses_everything() {
        let adapter = ResolutionAdapter::new(OverrideTable::new(), Arc::new(StaticSystem(vec![])));

        let one = adapter.resolve("::1", ResolveOptions::single()).await.unwrap();
        assert_eq!(one, Resolution::One(AddressRecord::new(IpAddr::V6(Ipv6Addr::LOCALHOST))));

        let bracketed = adapter.resolve("[::1]", ResolveOptions::single()).await.unwrap();
        assert_eq!(bracketed.address(), Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[tokio::test]
    async fn test_blank_host_rejected() {
        let adapter = ResolutionAdapter::new(OverrideTable::new(), Arc::new(StaticSystem(vec![])));
        let err = adapter.resolve("  ", ResolveOptions::single()).await.unwrap_err();
        assert_eq!(err.kind(), &crate::dns::ResolveErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_system_answers_preferred_family_first() {
        let system = StaticSystem(vec![IpAddr::V6(Ipv6Addr::LOCALHOST), v4(1), v4(2)]);
        let adapter = ResolutionAdapter::new(OverrideTable::new(), Arc::new(system));

        let all = adapter.resolve("example.com", ResolveOptions::all()).await.unwrap();
        let families: Vec<_> = all.into_answer_set().iter().map(|r| r.family()).collect();
        assert_eq!(families, vec![Family::V4, Family::V4, Family::V6]);

        for _ in 0..20 {
            let one = adapter.resolve("example.com", ResolveOptions::single()).await.unwrap();
            assert!(matches!(one.address(), Some(IpAddr::V4(_))));
        }
    }

    #[tokio::test]
    async fn test_explicit_family_restricts_system_lookup() {
        let system = StaticSystem(vec![IpAddr::V6(Ipv6Addr::LOCALHOST), v4(1)]);
        let adapter = ResolutionAdapter::new(OverrideTable::new(), Arc::new(system));

        let v6 = adapter
            .resolve("example.com", ResolveOptions::all().with_family(Family::V6))
            .await
            .unwrap();
        assert_eq!(v6.into_answer_set().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_doh_falls_through_and_is_not_cached() {
        let adapter = ResolutionAdapter::new(OverrideTable::new(), Arc::new(StaticSystem(vec![v4(9)])))
            .with_doh(Arc::new(EmptyDoh));

        let one = adapter.resolve("example.com", ResolveOptions::single()).await.unwrap();
        assert_eq!(one.address(), Some(v4(9)));
        assert!(adapter.cache().is_empty());
    }

    #[tokio::test]
    async fn test_extra_overrides_win() {
        let base = OverrideTable::from_pairs([("api.test", "192.0.2.1")]).unwrap();
        let extra = OverrideTable::from_pairs([("api.test", "192.0.2.2")]).unwrap();
        let adapter = ResolutionAdapter::new(base, Arc::new(StaticSystem(vec![])));

        let scoped = adapter.with_extra_overrides(&extra);
        let one = scoped.resolve("API.test", ResolveOptions::single()).await.unwrap();
        assert_eq!(one.address(), Some(v4(2)));

        let one = adapter.resolve("api.test", ResolveOptions::single()).await.unwrap();
        assert_eq!(one.address(), Some(v4(1)));
    }

    #[tokio::test]
    async fn test_resolve_hook_yields_port_zero() {
        let overrides = OverrideTable::from_pairs([("api.test", "192.0.2.7")]).unwrap();
        let adapter = ResolutionAdapter::new(overrides, Arc::new(StaticSystem(vec![])));

        let addrs: Vec<_> = Resolve::resolve(&adapter, Name::new("api.test"))
            .await
            .unwrap()
            .collect();
        assert_eq!(addrs, vec!["192.0.2.7:0".parse().unwrap()]);
    }
}
