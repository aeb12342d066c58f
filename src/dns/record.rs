//! Address records and answer sets.

use rand::{seq::SliceRandom, Rng};
use serde::Deserialize;
use std::{
    fmt,
    net::{IpAddr, Ipv6Addr, SocketAddr},
    str::FromStr,
};
use thiserror::Error;

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Family {
    #[serde(rename = "ipv4", alias = "4")]
    V4,
    #[serde(rename = "ipv6", alias = "6")]
    V6,
}

impl Family {
    /// Family of an IP address.
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }

    /// Numeric family as used by socket APIs (4 or 6).
    pub fn as_u8(self) -> u8 {
        match self {
            Family::V4 => 4,
            Family::V6 => 6,
        }
    }

    /// The address record type that yields this family.
    pub fn record_type(self) -> RecordType {
        match self {
            Family::V4 => RecordType::A,
            Family::V6 => RecordType::AAAA,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Family::V4 => Family::V6,
            Family::V6 => Family::V4,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPv{}", self.as_u8())
    }
}

/// DNS record types that resolve to addresses.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum RecordType {
    A,
    AAAA,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported record type {0:?}")]
pub struct UnsupportedRecordType(pub String);

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
        }
    }

    /// RR type code on the wire (RFC 1035 / RFC 3596).
    pub fn code(&self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::AAAA => 28,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(RecordType::A),
            28 => Some(RecordType::AAAA),
            _ => None,
        }
    }

    pub fn family(self) -> Family {
        match self {
            RecordType::A => Family::V4,
            RecordType::AAAA => Family::V6,
        }
    }
}

impl FromStr for RecordType {
    type Err = UnsupportedRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("a") {
            return Ok(RecordType::A);
        }
        if s.eq_ignore_ascii_case("aaaa") {
            return Ok(RecordType::AAAA);
        }
        s.parse::<u16>()
            .ok()
            .and_then(RecordType::from_code)
            .ok_or_else(|| UnsupportedRecordType(s.to_string()))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single resolved address. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRecord {
    address: IpAddr,
    family: Family,
}

impl AddressRecord {
    pub fn new(address: IpAddr) -> Self {
        Self {
            family: Family::of(&address),
            address,
        }
    }

    /// Parses an IP literal: dotted quad, bare IPv6, or bracketed IPv6.
    ///
    /// Returns `None` for anything that needs name resolution.
    pub fn from_literal(host: &str) -> Option<Self> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(Self::new(ip));
        }

        let inner = host.strip_prefix('[')?.strip_suffix(']')?;
        inner
            .parse::<Ipv6Addr>()
            .ok()
            .map(|ip| Self::new(IpAddr::V6(ip)))
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn to_socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.address, port)
    }
}

impl From<IpAddr> for AddressRecord {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.family)
    }
}

/// Ordered addresses produced by one resolution. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSet {
    records: Vec<AddressRecord>,
}

impl AnswerSet {
    pub fn new(records: Vec<AddressRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(record: AddressRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AddressRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AddressRecord> {
        self.records.iter()
    }

    pub fn first(&self) -> Option<&AddressRecord> {
        self.records.first()
    }

    /// Keeps only records of the given family, preserving order.
    pub fn filter_family(&self, family: Family) -> Self {
        self.records
            .iter()
            .filter(|r| r.family == family)
            .copied()
            .collect()
    }

    /// Stable partition putting `family` first.
    ///
    /// Mirrors the Happy Eyeballs split: relative order inside each family
    /// is kept, only the families are regrouped.
    pub fn prefer_family(self, family: Family) -> Self {
        let (mut preferred, fallback): (Vec<_>, Vec<_>) =
            self.records.into_iter().partition(|r| r.family == family);
        preferred.extend(fallback);
        Self { records: preferred }
    }

    /// Picks one record uniformly at random.
    pub fn choose_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<AddressRecord> {
        self.records.choose(rng).copied()
    }

    /// Socket addresses with port 0, in answer order.
    pub fn to_socket_addrs(&self) -> Vec<SocketAddr> {
        self.records.iter().map(|r| r.to_socket_addr(0)).collect()
    }
}

impl FromIterator<AddressRecord> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = AddressRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<IpAddr> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = IpAddr>>(iter: I) -> Self {
        iter.into_iter().map(AddressRecord::new).collect()
    }
}

impl IntoIterator for AnswerSet {
    type Item = AddressRecord;
    type IntoIter = std::vec::IntoIter<AddressRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a AnswerSet {
    type Item = &'a AddressRecord;
    type IntoIter = std::slice::Iter<'a, AddressRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
