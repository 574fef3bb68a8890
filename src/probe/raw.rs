// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Verbatim raw-request support.
//!
//! When a rule supplies a complete request blob it goes out exactly as
//! written, with no automatic header injection; the reply is parsed just
//! enough to fill the response record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::errors::{NetworkError, ScannerError, ScannerResult};
use crate::probe::socket::{tcp_exchange, SocketConfig};
use crate::proto::{Request, Response, UrlRecord};

/// Send `raw` to the target's host and parse the reply.
pub async fn send_raw_request(
    target: &str,
    raw: &str,
    timeout: Duration,
) -> ScannerResult<(Arc<Request>, Arc<Response>)> {
    let parsed = Url::parse(target).map_err(|_| {
        ScannerError::Network(NetworkError::InvalidUrl {
            url: target.to_string(),
        })
    })?;
    let host = parsed
        .host_str()
        .ok_or_else(|| {
            ScannerError::Network(NetworkError::InvalidUrl {
                url: target.to_string(),
            })
        })?
        .to_string();
    let use_tls = parsed.scheme() == "https";
    let port = parsed
        .port()
        .unwrap_or(if use_tls { 443 } else { 80 });

    // Bare \n separators in YAML blobs become proper CRLF on the wire.
    let wire = if raw.contains("\r\n") {
        raw.to_string()
    } else {
        raw.replace('\n', "\r\n")
    };

    let config = SocketConfig {
        read_size: 1024 * 1024,
        read_timeout: timeout,
        dial_timeout: timeout,
        use_tls,
    };

    let started = Instant::now();
    let reply = tcp_exchange(&format!("{}:{}", host, port), wire.as_bytes(), &config).await?;
    let latency = started.elapsed().as_millis() as i64;

    let (method, path) = parse_request_line(&wire);
    let url = UrlRecord {
        scheme: parsed.scheme().to_string(),
        host: format!("{}:{}", host, port),
        port: port.to_string(),
        domain: host,
        path,
        query: String::new(),
        fragment: String::new(),
    };

    let request = Request {
        method,
        url: url.clone(),
        headers: HashMap::new(),
        content_type: String::new(),
        body: Vec::new(),
        raw_header: raw_header_of(&wire),
        raw: wire.into_bytes(),
    };

    let response = parse_raw_response(&reply, url, latency);

    Ok((Arc::new(request), Arc::new(response)))
}

fn parse_request_line(raw: &str) -> (String, String) {
    let first_line = raw.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("GET").to_uppercase();
    let path = parts.next().unwrap_or("/").to_string();
    (method, path)
}

fn raw_header_of(raw: &str) -> Vec<u8> {
    match raw.split_once("\r\n\r\n") {
        Some((head, _)) => head.as_bytes().to_vec(),
        None => raw.as_bytes().to_vec(),
    }
}

fn parse_raw_response(reply: &[u8], url: UrlRecord, latency: i64) -> Response {
    let text = String::from_utf8_lossy(reply).into_owned();
    let (head, body) = text
        .split_once("\r\n\r\n")
        .or_else(|| text.split_once("\n\n"))
        .unwrap_or(("", text.as_str()));

    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|status_line| status_line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<i64>().ok())
        .unwrap_or(0);

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let content_type = headers.get("content-type").cloned().unwrap_or_default();

    Response {
        status,
        url,
        headers,
        content_type,
        body: body.as_bytes().to_vec(),
        raw: reply.to_vec(),
        raw_header: head.as_bytes().to_vec(),
        latency,
        icon_hash: "0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_line() {
        let raw = "POST /api/login HTTP/1.1\r\nHost: x\r\n\r\nbody";
        let (method, path) = parse_request_line(raw);
        assert_eq!(method, "POST");
        assert_eq!(path, "/api/login");
    }

    #[test]
    fn test_parse_raw_response() {
        let reply = b"HTTP/1.1 302 Found\r\nLocation: /login\r\nServer: jetty\r\n\r\nredirecting";
        let resp = parse_raw_response(reply, UrlRecord::default(), 5);
        assert_eq!(resp.status, 302);
        assert_eq!(resp.headers.get("server").map(String::as_str), Some("jetty"));
        assert_eq!(resp.body, b"redirecting");
        assert!(resp.raw.len() >= resp.raw_header.len());
    }

    #[test]
    fn test_parse_raw_response_garbage() {
        let resp = parse_raw_response(b"not http at all", UrlRecord::default(), 0);
        assert_eq!(resp.status, 0);
        assert!(resp.headers.is_empty());
    }
}
