//! # dohnet
//!
//! Override-aware, DNS-over-HTTPS backed name resolution for HTTP clients.
//!
//! `dohnet` sits between a client's connection-establishment step and the
//! network. For each hostname it picks the address to dial from, in order:
//! an IP literal, a static override table, a TTL-bounded cache, a DoH query,
//! and the platform resolver. The DoH endpoint's own hostname is resolved
//! through a bootstrap path that never touches DoH.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dohnet::dns::{ResolutionAdapter, ResolveOptions, ResolverSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = ResolverSettings::from_json_str(r#"{
//!         "doh_url": "https://dns.google/resolve",
//!         "overrides": { "dns.google": "8.8.8.8" }
//!     }"#).unwrap();
//!     let adapter = ResolutionAdapter::from_settings(&settings).unwrap();
//!     let resolution = adapter
//!         .resolve("example.com", ResolveOptions::single())
//!         .await
//!         .unwrap();
//!     println!("Dial: {:?}", resolution.address());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions and error context helpers
//! - [`dns`] - Override table, DoH client, cache and the resolution adapter
//! - [`socket`] - Connection establishment (TCP, BoringSSL) using a resolver

pub mod base;
pub mod dns;
pub mod socket;
