use crate::base::neterror::NetError;
use boring::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode, SslVersion};

/// TLS client configuration for connections opened by [`ConnectJob`].
///
/// [`ConnectJob`]: crate::socket::connectjob::ConnectJob
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    /// OpenSSL cipher string for TLS 1.2 and below. Empty keeps BoringSSL's default.
    pub cipher_list: String,
    pub alpn_protos: Vec<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::http1()
    }
}

impl TlsConfig {
    /// TLS 1.2+ advertising only HTTP/1.1, which is all the DoH transport speaks.
    pub fn http1() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            cipher_list: String::new(),
            alpn_protos: vec!["http/1.1".to_string()],
        }
    }

    /// ALPN protocol list in wire format (length-prefixed).
    pub fn alpn_wire(&self) -> Result<Vec<u8>, NetError> {
        let mut alpn_wire = Vec::new();
        for proto in &self.alpn_protos {
            if proto.is_empty() || proto.len() > 255 {
                return Err(NetError::SslProtocolError);
            }
            alpn_wire.push(proto.len() as u8);
            alpn_wire.extend_from_slice(proto.as_bytes());
        }
        Ok(alpn_wire)
    }

    /// Apply this configuration to an SSL connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        // Set TLS versions
        if let Some(min) = self.min_version {
            builder.set_min_proto_version(Some(min)).map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(max) = self.max_version {
            builder.set_max_proto_version(Some(max)).map_err(|_| NetError::SslProtocolError)?;
        }

        if !self.cipher_list.is_empty() {
            builder.set_cipher_list(&self.cipher_list).map_err(|_| NetError::SslProtocolError)?;
        }

        if !self.alpn_protos.is_empty() {
            builder
                .set_alpn_protos(&self.alpn_wire()?)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        // Certificate verification (use system verifier)
        builder.set_verify(SslVerifyMode::PEER);

        Ok(())
    }

    /// Builds a connector with this configuration applied.
    pub fn build_connector(&self) -> Result<SslConnector, NetError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
        self.apply_to_builder(&mut builder)?;
        Ok(builder.build())
    }

    /// Check if SNI (Server Name Indication) should be set for this host.
    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        // If the host parses as an IP address, don't set SNI
        host.trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_err()
    }
}
