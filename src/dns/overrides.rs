//! Static hostname-to-IP override table.
//!
//! The table is consulted before any dynamic resolution. It is loaded once,
//! never expires and never touches the network. Matching is exact (no
//! wildcard or suffix rules) and case-insensitive because [`Name`]
//! lowercases on construction.

use super::{Name, ResolveError};
use std::{collections::HashMap, fmt, net::IpAddr};

/// Immutable hostname → IP mapping.
///
/// Share it behind an `Arc`; lookups need no locking.
///
/// # Example
///
/// ```rust,ignore
/// use dohnet::dns::{Name, OverrideTable};
///
/// let table = OverrideTable::from_pairs([("doh.example.net", "104.21.9.230")])?;
/// assert!(table.lookup(&Name::new("DOH.example.net")).is_some());
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OverrideTable {
    entries: HashMap<Name, IpAddr>,
}

impl OverrideTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(hostname, ip literal)` pairs.
    ///
    /// Fails with `InvalidInput` on a blank hostname or a value that is not
    /// an IP literal. Later duplicates replace earlier ones.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = HashMap::new();
        for (host, ip) in pairs {
            let name = Name::parse(host.as_ref())?;
            let ip = parse_ip_literal(ip.as_ref()).ok_or_else(|| {
                ResolveError::invalid_input(
                    name.as_str(),
                    format!("override value {:?} is not an IP literal", ip.as_ref()),
                )
            })?;
            entries.insert(name, ip);
        }
        Ok(Self { entries })
    }

    /// Looks up the forced address for `name`.
    #[inline]
    pub fn lookup(&self, name: &Name) -> Option<IpAddr> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns a new table with `other` layered on top of `self`.
    ///
    /// Entries in `other` win. Used for call-site forced mappings.
    pub fn merged(&self, other: &OverrideTable) -> OverrideTable {
        let mut entries = self.entries.clone();
        entries.extend(other.entries.iter().map(|(k, v)| (k.clone(), *v)));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &IpAddr)> {
        self.entries.iter()
    }
}

impl FromIterator<(Name, IpAddr)> for OverrideTable {
    fn from_iter<I: IntoIterator<Item = (Name, IpAddr)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for OverrideTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideTable")
            .field("override_count", &self.entries.len())
            .finish_non_exhaustive()
    }
}

fn parse_ip_literal(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    let value = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::ResolveErrorKind;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_lookup_hit_is_case_insensitive() {
        let table = OverrideTable::from_pairs([("Override.Local", "127.0.0.1")]).unwrap();

        assert_eq!(
            table.lookup(&Name::new("override.local")),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(
            table.lookup(&Name::new("OVERRIDE.LOCAL")),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let table = OverrideTable::from_pairs([("example.com", "1.2.3.4")]).unwrap();
        assert!(table.lookup(&Name::new("www.example.com")).is_none());
        assert!(table.lookup(&Name::new("example.co")).is_none());
    }

    #[test]
    fn test_ipv6_values() {
        let table = OverrideTable::from_pairs([("a.test", "::1"), ("b.test", "[::1]")]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.lookup(&Name::new("b.test")),
            Some(IpAddr::V6(Ipv6Addr::LOCALHOST))
        );
    }

    #[test]
    fn test_rejects_non_ip_value() {
        let err = OverrideTable::from_pairs([("a.test", "not-an-ip")]).unwrap_err();
        assert_eq!(err.kind(), &ResolveErrorKind::InvalidInput);
        assert_eq!(err.host(), "a.test");

        let err = OverrideTable::from_pairs([("", "1.1.1.1")]).unwrap_err();
        assert_eq!(err.kind(), &ResolveErrorKind::InvalidInput);
    }

    #[test]
    fn test_merged_prefers_other() {
        let base =
            OverrideTable::from_pairs([("a.test", "1.1.1.1"), ("b.test", "2.2.2.2")]).unwrap();
        let call_site = OverrideTable::from_pairs([("b.test", "9.9.9.9")]).unwrap();

        let merged = base.merged(&call_site);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.lookup(&Name::new("b.test")),
            Some(IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)))
        );
        // The base table is untouched.
        assert_eq!(
            base.lookup(&Name::new("b.test")),
            Some(IpAddr::V4(Ipv4Addr::new(2, 2, 2, 2)))
        );
    }
}
