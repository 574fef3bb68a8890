// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Favicon discovery and Shodan-style hashing.
//!
//! The hash is MurmurHash3-32 over the 76-column line-wrapped standard
//! base64 of the icon bytes, matching what search engines index. `0` means
//! "no icon / not an image".

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Hex prefixes of icon formats worth hashing: PNG, ICO, GIF, JPEG, SVG, XML.
const ICON_MAGIC_PREFIXES: &[&str] = &[
    "89504e470",
    "00000100",
    "474946383",
    "ffd8ffe00",
    "ffd8ffe10",
    "3c7376672",
    "3c3f786d6",
];

static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href=["']?([^"'>\s]+)"#).expect("static regex"));

static ICON_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href=["']([^"']+\.(?:ico|png|jpg|jpeg|gif|svg))["']"#).expect("static regex")
});

/// Icon link tag openers, most specific first; the earliest match in the
/// document wins.
const ICON_TAGS: &[&str] = &[
    r#"<link rel="icon""#,
    r#"<link rel="shortcut icon""#,
    r#"<link type="image/x-icon""#,
    r#"<link rel="apple-touch-icon""#,
    r#"<link rel="apple-touch-icon-precomposed""#,
];

/// MurmurHash3 32-bit, seed 0.
pub fn mmh3_hash32(data: &[u8]) -> i32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;
    const R1: u32 = 15;
    const R2: u32 = 13;
    const M: u32 = 5;
    const N: u32 = 0xe654_6b64;

    let mut hash: u32 = 0;
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(R1);
        k = k.wrapping_mul(C2);
        hash ^= k;
        hash = hash.rotate_left(R2);
        hash = hash.wrapping_mul(M).wrapping_add(N);
    }

    let mut k: u32 = 0;
    for (i, &b) in tail.iter().enumerate() {
        k |= (b as u32) << (8 * i);
    }
    if !tail.is_empty() {
        k = k.wrapping_mul(C1);
        k = k.rotate_left(R1);
        k = k.wrapping_mul(C2);
        hash ^= k;
    }

    hash ^= data.len() as u32;
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;

    hash as i32
}

/// Standard base64 wrapped at 76 columns with a trailing newline, the exact
/// byte stream the hash is computed over.
pub fn stand_base64(raw: &[u8]) -> Vec<u8> {
    if raw.is_empty() {
        return Vec::new();
    }
    let encoded = BASE64.encode(raw);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / 76 + 1);
    for (i, b) in encoded.bytes().enumerate() {
        out.push(b);
        if (i + 1) % 76 == 0 {
            out.push(b'\n');
        }
    }
    out.push(b'\n');
    out
}

/// Resolve the icon URL advertised by a page, falling back to
/// `/favicon.ico` at the site root.
pub fn icon_url(page_url: &str, html: &str) -> String {
    let parsed = match Url::parse(page_url) {
        Ok(u) => u,
        Err(_) => return String::new(),
    };
    let base_url = format!(
        "{}://{}/",
        parsed.scheme(),
        parsed.host_str().map(host_with_port(&parsed)).unwrap_or_default()
    );
    let mut base_path = parsed.path().to_string();
    if base_path.contains('.') {
        base_path = String::new();
    }

    let html_lower = html.to_lowercase();
    let mut icon_index: Option<usize> = None;
    for tag in ICON_TAGS {
        if let Some(index) = html_lower.find(tag) {
            icon_index = Some(icon_index.map_or(index, |prev| prev.min(index)));
        }
    }

    if let Some(start) = icon_index {
        if let Some(end) = html[start..].find('>') {
            let link_tag = &html[start..start + end];
            if let Some(caps) = HREF_RE.captures(link_tag) {
                let href = &caps[1];
                let url = absolute_url(&parsed, &base_url, &base_path, href);
                debug!(icon = %url, "icon link extracted from page");
                return normalize_favicon_url(&url);
            }
        }
    }

    // Any image-looking href is better than a blind default.
    if let Some(caps) = ICON_LINK_RE.captures(html) {
        let url = absolute_url(&parsed, &base_url, &base_path, &caps[1]);
        return normalize_favicon_url(&url);
    }

    normalize_favicon_url(&format!("{}favicon.ico", base_url))
}

fn host_with_port(parsed: &Url) -> impl Fn(&str) -> String + '_ {
    move |host: &str| match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn absolute_url(parsed: &Url, base_url: &str, base_path: &str, icon_path: &str) -> String {
    if icon_path.starts_with("http://") || icon_path.starts_with("https://") {
        return icon_path.to_string();
    }
    if let Some(rest) = icon_path.strip_prefix("//") {
        return format!("{}://{}", parsed.scheme(), rest);
    }
    if let Some(rest) = icon_path.strip_prefix('/') {
        return format!("{}{}", base_url, rest);
    }
    if base_path.is_empty() || base_path.ends_with('/') {
        return format!("{}{}{}", base_url, base_path.trim_start_matches('/'), icon_path);
    }
    let dir = match base_path.rfind('/') {
        Some(i) => &base_path[..i + 1],
        None => "",
    };
    format!("{}{}{}", base_url, dir.trim_start_matches('/'), icon_path)
}

fn normalize_favicon_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        format!("http://{}", rest.replace("//", "/"))
    } else if let Some(rest) = url.strip_prefix("https://") {
        format!("https://{}", rest.replace("//", "/"))
    } else {
        url.to_string()
    }
}

/// True when the payload looks like an icon by magic bytes.
pub fn looks_like_icon(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    let prefix = hex::encode(&data[..data.len().min(8)]);
    ICON_MAGIC_PREFIXES
        .iter()
        .any(|magic| prefix.starts_with(magic))
}

/// Fetch an icon URL and compute its hash. Data URLs hash without I/O.
pub async fn fetch_icon_hash(icon_url: &str, proxy: &str, timeout: Duration) -> String {
    if icon_url.is_empty() {
        return "0".to_string();
    }

    if let Some(rest) = icon_url.strip_prefix("data:") {
        if let Some((_, payload)) = rest.split_once(',') {
            if let Ok(bytes) = BASE64.decode(payload.trim()) {
                if !bytes.is_empty() {
                    return mmh3_hash32(&stand_base64(&bytes)).to_string();
                }
            }
        }
        return "0".to_string();
    }

    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5));
    if !proxy.is_empty() {
        if let Ok(p) = reqwest::Proxy::all(proxy) {
            builder = builder.proxy(p);
        }
    }
    let client = match builder.build() {
        Ok(c) => c,
        Err(_) => return "0".to_string(),
    };

    let resp = match client.get(icon_url).send().await {
        Ok(r) => r,
        Err(err) => {
            debug!(icon = icon_url, error = %err, "icon fetch failed");
            return "0".to_string();
        }
    };

    if resp.status() != reqwest::StatusCode::OK {
        return "0".to_string();
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let bytes = match resp.bytes().await {
        Ok(b) => b,
        Err(_) => return "0".to_string(),
    };

    if bytes.is_empty() {
        return "0".to_string();
    }

    if content_type.starts_with("image") || looks_like_icon(&bytes) {
        return mmh3_hash32(&stand_base64(&bytes)).to_string();
    }

    "0".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmh3_known_vectors() {
        // Reference values from the canonical murmur3 implementation.
        assert_eq!(mmh3_hash32(b""), 0);
        assert_eq!(mmh3_hash32(b"hello") as u32, 0x248b_fa47);
    }

    #[test]
    fn test_stand_base64_wraps_at_76() {
        let data = vec![b'a'; 100];
        let wrapped = stand_base64(&data);
        let text = String::from_utf8(wrapped).unwrap();
        let first_line = text.lines().next().unwrap();
        assert_eq!(first_line.len(), 76);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_stand_base64_empty() {
        assert!(stand_base64(b"").is_empty());
    }

    #[test]
    fn test_icon_url_from_link_tag() {
        let html = r#"<link rel="icon" href="/static/fav.png">"#;
        assert_eq!(
            icon_url("http://example.test/", html),
            "http://example.test/static/fav.png"
        );
    }

    #[test]
    fn test_icon_url_default() {
        assert_eq!(
            icon_url("http://example.test/app", "<html></html>"),
            "http://example.test/favicon.ico"
        );
    }

    #[test]
    fn test_icon_url_protocol_relative() {
        let html = r#"<link rel="icon" href="//cdn.example.test/fav.ico">"#;
        assert_eq!(
            icon_url("https://example.test/", html),
            "https://cdn.example.test/fav.ico"
        );
    }

    #[test]
    fn test_looks_like_icon_png() {
        let png = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
        assert!(looks_like_icon(&png));
        assert!(!looks_like_icon(b"<html>nope</html>"));
    }

    #[tokio::test]
    async fn test_data_url_hash() {
        use base64::Engine as _;
        let icon = format!(
            "data:image/x-icon;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(b"fake-icon-bytes")
        );
        let hash = fetch_icon_hash(&icon, "", Duration::from_secs(1)).await;
        assert_ne!(hash, "0");
    }
}
