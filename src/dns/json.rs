//! JSON DoH response decoding.
//!
//! Two shapes are accepted: the standard `{"Status":0,"Answer":[...]}` used
//! by Google and Cloudflare, and vendor APIs that name the array `answers`.
//! Whichever array is present is used.

use super::{AddressRecord, AnswerSet, DohAnswer, Family, Name, RecordType, ResolveError};
use serde::Deserialize;
use serde_json::Value;
use std::{net::IpAddr, time::Duration};

const NXDOMAIN: u32 = 3;

#[derive(Debug, Deserialize)]
struct JsonResponse {
    #[serde(rename = "Status", alias = "status", default)]
    status: Option<u32>,
    #[serde(rename = "Answer", default)]
    answer: Option<Vec<JsonAnswer>>,
    #[serde(default)]
    answers: Option<Vec<JsonAnswer>>,
}

#[derive(Debug, Deserialize)]
struct JsonAnswer {
    data: String,
    #[serde(rename = "type", default)]
    record_type: Option<Value>,
    #[serde(rename = "TTL", alias = "ttl", default)]
    ttl: Option<u32>,
}

impl JsonAnswer {
    /// The address in this entry, if it is a `record_type` record.
    ///
    /// CNAME links in the chain and entries of another family are skipped.
    fn address(&self, record_type: RecordType) -> Option<IpAddr> {
        if !self.is_type(record_type) {
            return None;
        }
        let ip: IpAddr = self.data.trim().parse().ok()?;
        (Family::of(&ip) == record_type.family()).then_some(ip)
    }

    /// Vendors send the type as a number (`1`) or a mnemonic (`"A"`).
    fn is_type(&self, record_type: RecordType) -> bool {
        match &self.record_type {
            None | Some(Value::Null) => true,
            Some(Value::Number(n)) => n.as_u64() == Some(u64::from(record_type.code())),
            Some(Value::String(s)) => s.parse::<RecordType>().ok() == Some(record_type),
            Some(_) => false,
        }
    }
}

/// Decodes a JSON DoH response body.
///
/// `Status` 3 (NXDOMAIN), a missing array or an empty array yield an empty
/// answer. Any other non-zero `Status` is an `UpstreamError` carrying the DNS
/// status; a body that is not JSON is an `UpstreamError` carrying
/// `http_status`.
pub fn parse_response(
    body: &[u8],
    name: &Name,
    record_type: RecordType,
    http_status: u16,
) -> Result<DohAnswer, ResolveError> {
    let response: JsonResponse = serde_json::from_slice(body).map_err(|e| {
        ResolveError::upstream(http_status, name).with_detail(format!("bad JSON body: {}", e))
    })?;

    match response.status {
        None | Some(0) => {}
        Some(NXDOMAIN) => return Ok(DohAnswer::empty()),
        Some(code) => {
            return Err(ResolveError::upstream(code as u16, name)
                .with_detail(format!("DNS status {}", code)))
        }
    }

    let entries = response.answer.or(response.answers).unwrap_or_default();

    let mut ttl: Option<u32> = None;
    let mut records = Vec::with_capacity(entries.len());
    for entry in &entries {
        if let Some(ip) = entry.address(record_type) {
            records.push(AddressRecord::new(ip));
            if let Some(t) = entry.ttl {
                ttl = Some(ttl.map_or(t, |cur| cur.min(t)));
            }
        }
    }

    Ok(DohAnswer {
        answers: AnswerSet::new(records),
        ttl: ttl.map(|t| Duration::from_secs(u64::from(t))),
    })
}
