//! Resolver configuration.
//!
//! The override table, DoH endpoint, TTL and deadlines are supplied by the
//! embedding application, usually from a JSON file loaded at startup.

use super::{Family, OverrideTable, QueryMethod, RecordType, ResolveError, ResolverEndpoint};
use serde::Deserialize;
use std::{collections::HashMap, fmt, io, path::Path, time::Duration};
use thiserror::Error;

/// Which address families to ask DoH for, and in which order.
///
/// `*First` asks for the preferred record type and only asks for the other
/// one when the first came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressPreference {
    Ipv4Only,
    Ipv6Only,
    #[default]
    Ipv4First,
    Ipv6First,
}

impl AddressPreference {
    pub fn preferred_family(self) -> Family {
        match self {
            AddressPreference::Ipv4Only | AddressPreference::Ipv4First => Family::V4,
            AddressPreference::Ipv6Only | AddressPreference::Ipv6First => Family::V6,
        }
    }

    /// The only family allowed, for the `*Only` variants.
    pub fn only_family(self) -> Option<Family> {
        match self {
            AddressPreference::Ipv4Only => Some(Family::V4),
            AddressPreference::Ipv6Only => Some(Family::V6),
            _ => None,
        }
    }

    /// Record types to query, in order. An explicit family wins over the
    /// preference.
    pub fn record_types(self, family: Option<Family>) -> &'static [RecordType] {
        match family.or(self.only_family()) {
            Some(Family::V4) => &[RecordType::A],
            Some(Family::V6) => &[RecordType::AAAA],
            None if self == AddressPreference::Ipv6First => &[RecordType::AAAA, RecordType::A],
            None => &[RecordType::A, RecordType::AAAA],
        }
    }
}

/// Which platform resolver backs the system fallback and bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemResolverKind {
    /// `getaddrinfo` on the blocking pool.
    #[default]
    Gai,
    /// hickory-dns with the system configuration.
    Hickory,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read resolver config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse resolver config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid resolver config: {0}")]
    Invalid(#[from] ResolveError),
}

/// Resolver settings, deserializable from JSON.
///
/// ```json
/// {
///   "doh_url": "https://doh.example.net/token/abc/https/dns.google/resolve",
///   "query_method": "json_get",
///   "overrides": { "doh.example.net": "104.21.9.230" },
///   "address_preference": "ipv4_first",
///   "default_ttl_ms": 300000
/// }
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSettings {
    /// DoH endpoint URL (http or https).
    pub doh_url: String,

    /// How queries are encoded for the endpoint.
    pub query_method: QueryMethod,

    /// Forced hostname → IP literal mappings.
    pub overrides: HashMap<String, String>,

    /// Address family policy.
    pub address_preference: AddressPreference,

    /// Cache lifetime when the upstream does not supply a TTL.
    pub default_ttl_ms: u64,

    /// Honour TTLs reported by the DoH endpoint.
    pub respect_upstream_ttl: bool,

    /// Deadline for resolving the DoH endpoint host.
    pub bootstrap_timeout_ms: u64,

    /// Deadline for one DoH exchange.
    pub doh_timeout_ms: u64,

    /// Deadline for the system fallback.
    pub system_timeout_ms: u64,

    /// Bound on cached (host, type) entries. `None` = unbounded.
    pub cache_capacity: Option<usize>,

    /// Platform resolver used for bootstrap and fallback.
    pub system_resolver: SystemResolverKind,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            doh_url: "https://dns.google/resolve".to_string(),
            query_method: QueryMethod::JsonGet,
            overrides: HashMap::new(),
            address_preference: AddressPreference::default(),
            default_ttl_ms: 5 * 60 * 1000,
            respect_upstream_ttl: true,
            bootstrap_timeout_ms: 3_000,
            doh_timeout_ms: 5_000,
            system_timeout_ms: 5_000,
            cache_capacity: None,
            system_resolver: SystemResolverKind::default(),
        }
    }
}

impl ResolverSettings {
    /// Parses settings from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads and parses a JSON settings file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks that the endpoint URL and overrides are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint()?;
        self.override_table()?;
        Ok(())
    }

    pub fn override_table(&self) -> Result<OverrideTable, ResolveError> {
        OverrideTable::from_pairs(&self.overrides)
    }

    pub fn endpoint(&self) -> Result<ResolverEndpoint, ResolveError> {
        ResolverEndpoint::parse(&self.doh_url, self.query_method)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }

    pub fn doh_timeout(&self) -> Duration {
        Duration::from_millis(self.doh_timeout_ms)
    }

    pub fn system_timeout(&self) -> Duration {
        Duration::from_millis(self.system_timeout_ms)
    }
}

impl fmt::Debug for ResolverSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverSettings")
            .field("doh_url", &self.doh_url)
            .field("query_method", &self.query_method)
            .field("overrides_count", &self.overrides.len())
            .field("address_preference", &self.address_preference)
            .field("default_ttl_ms", &self.default_ttl_ms)
            .field("respect_upstream_ttl", &self.respect_upstream_ttl)
            .field("bootstrap_timeout_ms", &self.bootstrap_timeout_ms)
            .field("doh_timeout_ms", &self.doh_timeout_ms)
            .field("system_timeout_ms", &self.system_timeout_ms)
            .field("cache_capacity", &self.cache_capacity)
            .field("system_resolver", &self.system_resolver)
            .finish()
    }
}
