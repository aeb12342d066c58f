//! Resolution error taxonomy.
//!
//! Every failure in the fallback chain is reported as a [`ResolveError`]
//! naming the stage that produced it and the kind of failure, so a failed
//! connection attempt can be traced back to override, cache, DoH, bootstrap
//! or system resolution.

use super::Name;
use std::fmt;
use thiserror::Error;

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveErrorKind {
    /// The hostname has no records.
    NotFound,
    /// A network-facing step exceeded its deadline.
    Timeout,
    /// Transport-level failure.
    Network,
    /// The DoH endpoint answered with a non-success HTTP status, a DNS
    /// error code, or a body that could not be decoded.
    UpstreamError { status: u16 },
    /// The DoH endpoint's own hostname could not be resolved.
    BootstrapFailure,
    /// Empty hostname or unsupported record type.
    InvalidInput,
    /// The caller gave up before resolution completed.
    Cancelled,
}

impl fmt::Display for ResolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveErrorKind::NotFound => f.write_str("not found"),
            ResolveErrorKind::Timeout => f.write_str("timed out"),
            ResolveErrorKind::Network => f.write_str("network error"),
            ResolveErrorKind::UpstreamError { status } => {
                write!(f, "upstream error (status {})", status)
            }
            ResolveErrorKind::BootstrapFailure => f.write_str("bootstrap failure"),
            ResolveErrorKind::InvalidInput => f.write_str("invalid input"),
            ResolveErrorKind::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Which step of the fallback chain failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveStage {
    Input,
    Override,
    Cache,
    Bootstrap,
    Doh,
    System,
}

impl fmt::Display for ResolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolveStage::Input => "input",
            ResolveStage::Override => "override",
            ResolveStage::Cache => "cache",
            ResolveStage::Bootstrap => "bootstrap",
            ResolveStage::Doh => "DoH",
            ResolveStage::System => "system",
        };
        f.write_str(s)
    }
}

/// A typed resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} resolution of {host:?} failed: {kind}{}", detail_suffix(.detail))]
pub struct ResolveError {
    kind: ResolveErrorKind,
    stage: ResolveStage,
    host: String,
    detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(" ({})", d),
        None => String::new(),
    }
}

impl ResolveError {
    pub fn new(kind: ResolveErrorKind, stage: ResolveStage, name: &Name) -> Self {
        Self {
            kind,
            stage,
            host: name.as_str().to_string(),
            detail: None,
        }
    }

    /// Rejects a hostname before it could be turned into a [`Name`].
    pub fn invalid_input(host: &str, detail: impl Into<String>) -> Self {
        Self {
            kind: ResolveErrorKind::InvalidInput,
            stage: ResolveStage::Input,
            host: host.to_string(),
            detail: Some(detail.into()),
        }
    }

    pub fn timeout(stage: ResolveStage, name: &Name) -> Self {
        Self::new(ResolveErrorKind::Timeout, stage, name)
    }

    pub fn not_found(stage: ResolveStage, name: &Name) -> Self {
        Self::new(ResolveErrorKind::NotFound, stage, name)
    }

    pub fn network(stage: ResolveStage, name: &Name, detail: impl fmt::Display) -> Self {
        Self::new(ResolveErrorKind::Network, stage, name).with_detail(detail.to_string())
    }

    pub fn upstream(status: u16, name: &Name) -> Self {
        Self::new(ResolveErrorKind::UpstreamError { status }, ResolveStage::Doh, name)
    }

    pub fn cancelled(name: &Name) -> Self {
        Self::new(ResolveErrorKind::Cancelled, ResolveStage::Input, name)
    }

    /// Attaches a human readable cause.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> &ResolveErrorKind {
        &self.kind
    }

    pub fn stage(&self) -> ResolveStage {
        self.stage
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// HTTP or DNS status reported by the DoH endpoint, if any.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            ResolveErrorKind::UpstreamError { status } => Some(status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ResolveErrorKind::Timeout
    }
}
