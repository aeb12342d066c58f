//! RFC 8484 wire-format encoding.

use super::{AddressRecord, AnswerSet, DohAnswer, Name, RecordType, ResolveError};
use hickory_resolver::proto::{
    op::{Message, MessageType, OpCode, Query, ResponseCode},
    rr::{Name as DnsName, RecordType as DnsRecordType},
};
use std::time::Duration;

fn to_dns_type(record_type: RecordType) -> DnsRecordType {
    match record_type {
        RecordType::A => DnsRecordType::A,
        RecordType::AAAA => DnsRecordType::AAAA,
    }
}

/// Encodes a recursion-desired query for `name`.
///
/// The message ID is 0 as RFC 8484 recommends, so identical GET queries
/// are cache friendly.
pub fn build_query(name: &Name, record_type: RecordType) -> Result<Vec<u8>, ResolveError> {
    let mut dns_name = DnsName::from_ascii(name.as_str())
        .map_err(|e| ResolveError::invalid_input(name.as_str(), e.to_string()))?;
    dns_name.set_fqdn(true);

    let mut message = Message::new();
    message
        .set_id(0)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(dns_name, to_dns_type(record_type)));

    message
        .to_vec()
        .map_err(|e| ResolveError::invalid_input(name.as_str(), e.to_string()))
}

/// Decodes a wire-format DoH response body.
///
/// NXDOMAIN and answers without records of `record_type` yield an empty
/// set; any other DNS error code is reported as `UpstreamError` carrying the
/// response code. `http_status` tags undecodable bodies.
pub fn parse_response(
    body: &[u8],
    name: &Name,
    record_type: RecordType,
    http_status: u16,
) -> Result<DohAnswer, ResolveError> {
    let message = Message::from_vec(body).map_err(|e| {
        ResolveError::upstream(http_status, name).with_detail(format!("bad DNS message: {}", e))
    })?;

    match message.response_code() {
        ResponseCode::NoError => {}
        ResponseCode::NXDomain => return Ok(DohAnswer::empty()),
        code => {
            return Err(ResolveError::upstream(u16::from(code), name)
                .with_detail(format!("DNS response code {}", code)))
        }
    }

    let wanted = to_dns_type(record_type);
    let mut ttl: Option<u32> = None;
    let mut answers = Vec::new();
    for record in message.answers() {
        if record.record_type() != wanted {
            continue;
        }
        if let Some(ip) = record.data().ip_addr() {
            answers.push(AddressRecord::new(ip));
            ttl = Some(ttl.map_or(record.ttl(), |t| t.min(record.ttl())));
        }
    }

    Ok(DohAnswer {
        answers: AnswerSet::new(answers),
        ttl: ttl.map(|t| Duration::from_secs(u64::from(t))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::proto::rr::{rdata, RData, Record};
    use std::net::{IpAddr, Ipv4Addr};

    fn response(code: ResponseCode, records: Vec<Record>) -> Vec<u8> {
        let mut message = Message::new();
        message
            .set_id(0)
            .set_message_type(MessageType::Response)
            .set_response_code(code);
        for r in records {
            message.add_answer(r);
        }
        message.to_vec().unwrap()
    }

    fn a_record(ip: Ipv4Addr, ttl: u32) -> Record {
        Record::from_rdata(
            DnsName::from_ascii("example.com.").unwrap(),
            ttl,
            RData::A(rdata::A(ip)),
        )
    }

    #[test]
    fn test_query_roundtrips_through_hickory() {
        let bytes = build_query(&Name::new("Example.COM"), RecordType::AAAA).unwrap();
        let message = Message::from_vec(&bytes).unwrap();

        assert_eq!(message.id(), 0);
        assert!(message.recursion_desired());
        assert_eq!(message.queries().len(), 1);
        assert_eq!(message.queries()[0].query_type(), DnsRecordType::AAAA);
        assert_eq!(message.queries()[0].name().to_ascii(), "example.com.");
    }

    #[test]
    fn test_parse_answers_and_min_ttl() {
        let body = response(
            ResponseCode::NoError,
            vec![
                a_record(Ipv4Addr::new(1, 2, 3, 4), 120),
                a_record(Ipv4Addr::new(5, 6, 7, 8), 60),
            ],
        );
        let answer = parse_response(&body, &Name::new("example.com"), RecordType::A, 200).unwrap();

        assert_eq!(answer.answers.len(), 2);
        assert_eq!(
            answer.answers.records()[0].address(),
            IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))
        );
        assert_eq!(answer.ttl, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_skips_other_types() {
        let body = response(
            ResponseCode::NoError,
            vec![a_record(Ipv4Addr::new(1, 2, 3, 4), 120)],
        );
        let answer =
            parse_response(&body, &Name::new("example.com"), RecordType::AAAA, 200).unwrap();
        assert!(answer.answers.is_empty());
        assert_eq!(answer.ttl, None);
    }

    #[test]
    fn test_nxdomain_is_empty() {
        let body = response(ResponseCode::NXDomain, vec![]);
        let answer =
            parse_response(&body, &Name::new("nope.invalid"), RecordType::A, 200).unwrap();
        assert!(answer.answers.is_empty());
    }

    #[test]
    fn test_servfail_is_upstream_error() {
        let body = response(ResponseCode::ServFail, vec![]);
        let err = parse_response(&body, &Name::new("a.test"), RecordType::A, 200).unwrap_err();
        assert_eq!(err.status(), Some(2));
    }

    #[test]
    fn test_garbage_body() {
        let err = parse_response(b"\x01", &Name::new("a.test"), RecordType::A, 200).unwrap_err();
        assert_eq!(err.status(), Some(200));
    }
}
