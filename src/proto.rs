// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Byte-accurate request/response records for the expression environment.
//!
//! Both records are values: once a pair has been stored in the per-target
//! cache or in a result snapshot it is never mutated, so they are shared
//! behind `Arc` instead of deep-cloned.

use serde::Serialize;
use std::collections::HashMap;
use url::Url;

/// Decomposed URL as seen by rule expressions (`request.url.path` etc.)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlRecord {
    pub scheme: String,
    /// host:port when a port is present, otherwise just the host
    pub host: String,
    pub port: String,
    /// hostname without the port
    pub domain: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl UrlRecord {
    pub fn from_url(u: &Url) -> Self {
        Self {
            scheme: u.scheme().to_string(),
            host: match (u.host_str(), u.port()) {
                (Some(h), Some(p)) => format!("{}:{}", h, p),
                (Some(h), None) => h.to_string(),
                _ => String::new(),
            },
            port: u.port().map(|p| p.to_string()).unwrap_or_default(),
            domain: u.host_str().unwrap_or_default().to_string(),
            path: u.path().to_string(),
            query: u.query().unwrap_or_default().to_string(),
            fragment: u.fragment().unwrap_or_default().to_string(),
        }
    }
}

/// The `request` variable of the rule environment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Request {
    pub method: String,
    pub url: UrlRecord,
    pub headers: HashMap<String, String>,
    pub content_type: String,
    #[serde(skip)]
    pub body: Vec<u8>,
    #[serde(skip)]
    pub raw: Vec<u8>,
    #[serde(skip)]
    pub raw_header: Vec<u8>,
}

/// The `response` variable of the rule environment.
///
/// `headers` keys are lowercased; `raw` always contains `raw_header`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Response {
    pub status: i64,
    pub url: UrlRecord,
    pub headers: HashMap<String, String>,
    pub content_type: String,
    #[serde(skip)]
    pub body: Vec<u8>,
    #[serde(skip)]
    pub raw: Vec<u8>,
    #[serde(skip)]
    pub raw_header: Vec<u8>,
    /// First-byte latency in milliseconds
    pub latency: i64,
    /// Shodan-style mmh3 favicon hash; "0" when not computed
    pub icon_hash: String,
}

impl Response {
    pub fn raw_header_str(&self) -> String {
        String::from_utf8_lossy(&self.raw_header).into_owned()
    }
}

/// Out-of-band callback record produced by `newReverse()` / `newJNDI()`.
///
/// Without an external callback stack both probes resolve to `false`;
/// the fields still substitute into request templates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reverse {
    pub url: String,
    pub domain: String,
    pub ip: String,
    pub is_domain_name_server: bool,
}

/// Assemble the raw request bytes the way they would appear on the wire.
pub fn synthesize_raw_request(
    method: &str,
    path: &str,
    host: &str,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> Vec<u8> {
    let mut header_lines = headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>();
    header_lines.sort();
    let mut raw = format!(
        "{} {} HTTP/1.1\nHost: {}\n{}\n\n",
        method,
        path,
        host,
        header_lines.join("\n")
    )
    .into_bytes();
    raw.extend_from_slice(body);
    raw
}

/// Flatten a header map into `Name: value` lines (one per header).
pub fn raw_header_block(headers: &HashMap<String, String>) -> Vec<u8> {
    let mut lines = headers
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>();
    lines.sort();
    lines.join("\n").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_record_from_url() {
        let u = Url::parse("https://example.test:8443/admin?x=1#frag").unwrap();
        let rec = UrlRecord::from_url(&u);
        assert_eq!(rec.scheme, "https");
        assert_eq!(rec.host, "example.test:8443");
        assert_eq!(rec.port, "8443");
        assert_eq!(rec.domain, "example.test");
        assert_eq!(rec.path, "/admin");
        assert_eq!(rec.query, "x=1");
        assert_eq!(rec.fragment, "frag");
    }

    #[test]
    fn test_url_record_default_port() {
        let u = Url::parse("http://example.test/").unwrap();
        let rec = UrlRecord::from_url(&u);
        assert_eq!(rec.host, "example.test");
        assert_eq!(rec.port, "");
    }

    #[test]
    fn test_raw_contains_raw_header() {
        let mut headers = HashMap::new();
        headers.insert("server".to_string(), "nginx".to_string());
        let header_block = raw_header_block(&headers);
        let raw = synthesize_raw_request("GET", "/", "example.test", &headers, b"");
        let raw_str = String::from_utf8_lossy(&raw);
        assert!(raw_str.contains(&String::from_utf8_lossy(&header_block).into_owned()));
        assert!(raw.len() >= header_block.len());
    }
}
