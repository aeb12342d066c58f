//! Where DoH queries go and how they are encoded.

use super::{wire, Name, RecordType, ResolveError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bytes::Bytes;
use http::{header, Method, Request};
use serde::Deserialize;
use url::{Position, Url};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; DNS-Resolver/1.0)";
const DNS_JSON: &str = "application/dns-json";
const DNS_MESSAGE: &str = "application/dns-message";

/// DoH protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMethod {
    /// `GET ?name=..&type=..`, JSON answer (Google / Cloudflare JSON API).
    #[default]
    JsonGet,
    /// RFC 8484 `GET ?dns=<base64url>`, wire-format answer.
    WireGet,
    /// RFC 8484 `POST` with a wire-format body.
    WirePost,
}

impl QueryMethod {
    pub fn is_wire(self) -> bool {
        !matches!(self, QueryMethod::JsonGet)
    }
}

/// A configured DoH endpoint.
///
/// The endpoint host is itself a name that needs resolving; that goes through
/// [`BootstrapResolver`](super::BootstrapResolver), never through DoH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverEndpoint {
    url: Url,
    host: Name,
    port: u16,
    tls: bool,
    method: QueryMethod,
}

impl ResolverEndpoint {
    /// Parses an `http`/`https` endpoint URL.
    ///
    /// Query pairs already present in the URL (for example an access token
    /// on a vendor proxy) are preserved on every request.
    pub fn parse(url: &str, method: QueryMethod) -> Result<Self, ResolveError> {
        let url = Url::parse(url)
            .map_err(|e| ResolveError::invalid_input(url, format!("invalid DoH URL: {}", e)))?;

        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(ResolveError::invalid_input(
                    url.as_str(),
                    format!("unsupported DoH URL scheme {:?}", other),
                ))
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ResolveError::invalid_input(url.as_str(), "DoH URL has no host"))?;
        let host = Name::new(host.trim_start_matches('[').trim_end_matches(']'));
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ResolveError::invalid_input(url.as_str(), "DoH URL has no port"))?;

        Ok(Self {
            url,
            host,
            port,
            tls,
            method,
        })
    }

    /// Endpoint hostname, as resolved by the bootstrap path.
    pub fn host(&self) -> &Name {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn method(&self) -> QueryMethod {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Builds the HTTP request asking for `record_type` records of `name`.
    ///
    /// The request target is origin-form and `Host` carries the endpoint
    /// name, so the connection can be pinned to any address.
    pub fn build_request(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<Request<Bytes>, ResolveError> {
        let mut url = self.url.clone();

        let (method, accept, body) = match self.method {
            QueryMethod::JsonGet => {
                url.query_pairs_mut()
                    .append_pair("name", name.as_str())
                    .append_pair("type", record_type.as_str());
                (Method::GET, DNS_JSON, Bytes::new())
            }
            QueryMethod::WireGet => {
                let query = wire::build_query(name, record_type)?;
                url.query_pairs_mut()
                    .append_pair("dns", &URL_SAFE_NO_PAD.encode(query));
                (Method::GET, DNS_MESSAGE, Bytes::new())
            }
            QueryMethod::WirePost => {
                let query = wire::build_query(name, record_type)?;
                (Method::POST, DNS_MESSAGE, Bytes::from(query))
            }
        };

        let target = &url[Position::BeforePath..];
        let authority = &url[Position::BeforeHost..Position::AfterPort];

        let mut builder = Request::builder()
            .method(method)
            .uri(target)
            .header(header::HOST, authority)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, accept);

        if !body.is_empty() {
            builder = builder
                .header(header::CONTENT_TYPE, DNS_MESSAGE)
                .header(header::CONTENT_LENGTH, body.len());
        }

        builder
            .body(body)
            .map_err(|e| ResolveError::invalid_input(name.as_str(), e.to_string()))
    }
}
