//! DoH End-to-End Tests
//!
//! Runs a throwaway HTTP/1.1 server on loopback and points the resolver at
//! it through the override table, so the full path (bootstrap, transport,
//! decoding, cache) is exercised without touching the network.

use dohnet::dns::{
    BootstrapResolver, DohClient, GaiResolver, HttpsTransport, Name, OverrideTable, QueryMethod,
    RecordType, ResolutionAdapter, ResolveOptions, ResolverEndpoint, ResolverSettings,
};
use hickory_resolver::proto::op::{Message, MessageType, ResponseCode};
use hickory_resolver::proto::rr::{rdata, Name as DnsName, RData, Record};

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct Captured {
    head: String,
    body: Vec<u8>,
}

async fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.eq_ignore_ascii_case("content-length")
                .then(|| v.trim().parse::<usize>().unwrap())
        })
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0);
        body.extend_from_slice(&chunk[..n]);
    }
    Captured { head, body }
}

/// Serves `body` with `content_type` to every connection and records requests.
async fn spawn_server(
    status: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
) -> (SocketAddr, Arc<Mutex<Vec<Captured>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let captured = read_request(&mut stream).await;
            log.lock().unwrap().push(captured);

            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                content_type,
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
            let _ = stream.shutdown().await;
        }
    });

    (addr, seen)
}

fn settings(addr: SocketAddr, method: &str) -> ResolverSettings {
    ResolverSettings::from_json_str(&format!(
        r#"{{
            "doh_url": "http://doh.test:{}/resolve",
            "query_method": "{}",
            "overrides": {{ "doh.test": "127.0.0.1" }}
        }}"#,
        addr.port(),
        method
    ))
    .unwrap()
}

#[tokio::test]
async fn test_json_doh_end_to_end() {
    let body = br#"{"Status":0,"Answer":[
        {"name":"example.com.","type":1,"TTL":300,"data":"93.184.216.34"}
    ]}"#
    .to_vec();
    let (addr, seen) = spawn_server("200 OK", "application/dns-json", body).await;
    let adapter = ResolutionAdapter::from_settings(&settings(addr, "json_get")).unwrap();

    let resolution = adapter.resolve("Example.com", ResolveOptions::single()).await.unwrap();
    assert_eq!(
        resolution.address(),
        Some(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)))
    );

    // Served from the cache the second time.
    adapter.resolve("example.com", ResolveOptions::single()).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let head = &seen[0].head;
    assert!(head.starts_with("GET /resolve?name=example.com&type=A HTTP/1.1\r\n"), "{}", head);
    assert!(head.to_ascii_lowercase().contains(&format!("host: doh.test:{}", addr.port())));
    assert!(head.contains("application/dns-json"));
    assert!(head.contains("DNS-Resolver/1.0"));
}

#[tokio::test]
async fn test_wire_post_end_to_end() {
    let mut response = Message::new();
    response
        .set_id(0)
        .set_message_type(MessageType::Response)
        .set_response_code(ResponseCode::NoError)
        .add_answer(Record::from_rdata(
            DnsName::from_ascii("example.org.").unwrap(),
            60,
            RData::A(rdata::A(Ipv4Addr::new(198, 51, 100, 7))),
        ));
    let (addr, seen) = spawn_server(
        "200 OK",
        "application/dns-message",
        response.to_vec().unwrap(),
    )
    .await;
    let adapter = ResolutionAdapter::from_settings(&settings(addr, "wire_post")).unwrap();

    let all = adapter.resolve("example.org", ResolveOptions::all()).await.unwrap();
    let addrs: Vec<_> = all.into_answer_set().iter().map(|r| r.address()).collect();
    assert_eq!(addrs, vec![IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7))]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].head.starts_with("POST /resolve HTTP/1.1\r\n"));
    let query = Message::from_vec(&seen[0].body).unwrap();
    assert_eq!(query.queries()[0].name().to_ascii(), "example.org.");
}

#[tokio::test]
async fn test_http_error_reported_as_upstream() {
    let (addr, _seen) = spawn_server("500 Internal Server Error", "text/plain", b"oops".to_vec()).await;

    let endpoint = ResolverEndpoint::parse(
        &format!("http://doh.test:{}/resolve", addr.port()),
        QueryMethod::JsonGet,
    )
    .unwrap();
    let overrides = Arc::new(OverrideTable::from_pairs([("doh.test", "127.0.0.1")]).unwrap());
    let bootstrap = BootstrapResolver::new(overrides, Arc::new(GaiResolver::new()));
    let client = DohClient::new(endpoint, bootstrap, Arc::new(HttpsTransport::default()));

    let err = client.lookup(&Name::new("example.com"), RecordType::A).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_endpoint_host_resolved_without_doh() {
    let (addr, seen) = spawn_server("200 OK", "application/dns-json", b"{}".to_vec()).await;
    let adapter = ResolutionAdapter::from_settings(&settings(addr, "json_get")).unwrap();

    let resolution = adapter.resolve("doh.test", ResolveOptions::single()).await.unwrap();
    assert_eq!(resolution.address(), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));

    assert!(seen.lock().unwrap().is_empty());
}
