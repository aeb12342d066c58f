//! DNS Resolution Module
//!
//! Decides which address a connection should dial for a hostname:
//! - IP literals are used as-is
//! - Hostname-to-IP override table
//! - TTL-bounded address cache
//! - DNS-over-HTTPS (JSON or RFC 8484 wire format)
//! - System resolver (getaddrinfo via thread pool, or hickory-dns)
//!
//! # Architecture
//!
//! The `Resolve` trait is the hook connection establishment calls.
//! [`ResolutionAdapter`] implements it by chaining the stages above. The DoH
//! endpoint's own hostname is resolved only by [`BootstrapResolver`], which
//! never uses DoH.
//!
//! # Example
//!
//! ```rust,ignore
//! use dohnet::dns::{ResolutionAdapter, ResolveOptions, ResolverSettings};
//!
//! let settings = ResolverSettings::from_json_file("resolver.json")?;
//! let adapter = ResolutionAdapter::from_settings(&settings)?;
//! let resolution = adapter.resolve("example.com", ResolveOptions::single()).await?;
//! println!("Resolved: {:?}", resolution.address());
//! ```

mod adapter;
mod bootstrap;
pub mod cache;
mod config;
mod doh;
mod endpoint;
mod error;
mod gai;
mod hickory;
pub mod json;
mod overrides;
mod record;
mod resolve;
mod system;
mod transport;
pub mod wire;

pub use adapter::{ResolutionAdapter, Resolution, ResolveHandle, ResolveOptions};
pub use bootstrap::{BootstrapResolver, DEFAULT_BOOTSTRAP_TIMEOUT};
pub use cache::AddressCache;
pub use config::{AddressPreference, ConfigError, ResolverSettings, SystemResolverKind};
pub use doh::{DohAnswer, DohClient, DohLookup, DohQuerying, DEFAULT_DOH_TIMEOUT};
pub use endpoint::{QueryMethod, ResolverEndpoint};
pub use error::{ResolveError, ResolveErrorKind, ResolveStage};
pub use gai::GaiResolver;
pub use hickory::HickoryResolver;
pub use overrides::OverrideTable;
pub use record::{AddressRecord, AnswerSet, Family, RecordType, UnsupportedRecordType};
pub use resolve::{Addrs, Name, Resolve, Resolving};
pub use system::{lookup_with_timeout, SystemLookup, SystemResolve};
pub use transport::{
    DohRequest, DohResponse, DohTransport, HttpsTransport, TransportFuture, MAX_RESPONSE_BODY,
};
