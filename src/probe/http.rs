// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - HTTP Request Dispatcher
 * Turns rule request templates into concrete probes and materializes the
 * request/response records back into the variable environment
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::errors::{NetworkError, ScannerError, ScannerResult};
use crate::expr::Evaluator;
use crate::probe::icon;
use crate::proto::{raw_header_block, synthesize_raw_request, Request, Response, UrlRecord};
use crate::retry::{retry_with_backoff, RetryConfig};

/// Maximum response body read (5MB) to prevent memory exhaustion
const MAX_BODY_SIZE: usize = 5 * 1024 * 1024;

/// Marker some TLS frontends return to plain-HTTP probes on an HTTPS port
const HTTPS_PORT_MARKER: &str = "400 The plain HTTP request was sent to HTTPS port";

/// Realistic browser User-Agents to avoid detection
const BROWSER_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

static TEMPLATE_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("static regex"));

/// Get a realistic browser User-Agent (rotates to avoid blocks)
pub fn random_user_agent() -> &'static str {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let index = COUNTER.fetch_add(1, Ordering::Relaxed) % BROWSER_USER_AGENTS.len();
    BROWSER_USER_AGENTS[index]
}

/// Random public-looking IPv4 for the X-Forwarded-For header
pub fn random_forwarded_ip() -> String {
    let mut rng = rand::rng();
    format!(
        "{}.{}.{}.{}",
        rng.random_range(1..=223u8),
        rng.random_range(0..=255u8),
        rng.random_range(0..=255u8),
        rng.random_range(1..=254u8)
    )
}

/// Per-probe options resolved from rule template + scan configuration.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub proxy: String,
    pub timeout: Duration,
    pub retries: u32,
    pub follow_redirects: bool,
    pub custom_headers: HashMap<String, String>,
    /// Attempt favicon hashing when the page advertises an icon link
    pub icon_hash: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            proxy: String::new(),
            timeout: Duration::from_secs(5),
            retries: 3,
            follow_redirects: true,
            custom_headers: HashMap::new(),
            icon_hash: false,
        }
    }
}

/// Substitute `{{name}}` template variables from the environment.
pub fn substitute_variables(text: &str, env: &Evaluator) -> String {
    TEMPLATE_VAR_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match env.get_var(&caps[1]) {
                Some(value) => value.render(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Canonicalize a rule path: trim, `^` anchor to `/`, ensure leading `/`,
/// encode spaces and `#`.
pub fn format_path(path: &str) -> String {
    let mut out = path.trim().to_string();
    if let Some(rest) = out.strip_prefix('^') {
        out = format!("/{}", rest);
    }
    if !out.starts_with('/') {
        out = format!("/{}", out);
    }
    out.replace(' ', "%20").replace('#', "%23")
}

/// Rebuild a shorthand multipart body around a generated boundary.
///
/// Rule bodies spell a single part as `<part headers>\n\n<content>`;
/// the part headers and content are wrapped with boundary delimiters and
/// the new content type (with boundary parameter) is returned.
pub fn deal_multipart(body: &str) -> Option<(String, String)> {
    let (part_headers, content) = body.split_once("\n\n")?;
    let mut rng = rand::rng();
    let suffix: String = (0..16)
        .map(|_| rng.random_range(b'a'..=b'z') as char)
        .collect();
    let boundary = format!("----WebKitFormBoundary{}", suffix);

    let new_body = format!(
        "--{b}\r\n{h}\r\n\r\n{c}\r\n--{b}--\r\n",
        b = boundary,
        h = part_headers.trim_end(),
        c = content
    );
    let content_type = format!("multipart/form-data; boundary={}", boundary);
    Some((new_body, content_type))
}

/// Resolve an ambiguous scheme: explicit schemes pass through, port 80/443
/// pick their protocol, anything else probes https before http. A plain
/// HTTP response carrying the HTTPS-port marker upgrades to https.
pub async fn check_protocol(target: &str, proxy: &str, timeout: Duration) -> ScannerResult<String> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(ScannerError::Network(NetworkError::InvalidUrl {
            url: target.to_string(),
        }));
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(trimmed.to_string());
    }

    let probe_url = Url::parse(&format!("http://{}", trimmed)).map_err(|_| {
        ScannerError::Network(NetworkError::InvalidUrl {
            url: trimmed.to_string(),
        })
    })?;

    match probe_url.port() {
        Some(80) => probe_scheme(&format!("http://{}", trimmed), proxy, timeout).await,
        Some(443) => probe_scheme(&format!("https://{}", trimmed), proxy, timeout).await,
        _ => {
            match probe_scheme(&format!("https://{}", trimmed), proxy, timeout).await {
                Ok(url) => Ok(url),
                Err(_) => probe_scheme(&format!("http://{}", trimmed), proxy, timeout).await,
            }
        }
    }
}

async fn probe_scheme(url: &str, proxy: &str, timeout: Duration) -> ScannerResult<String> {
    let options = ProbeOptions {
        proxy: proxy.to_string(),
        timeout,
        retries: 1,
        follow_redirects: false,
        ..Default::default()
    };
    let client = build_client(&options)?;

    let resp = client
        .get(url)
        .header("User-Agent", random_user_agent())
        .send()
        .await
        .map_err(ScannerError::from)?;

    let body = resp.text().await.unwrap_or_default();
    if body.contains(HTTPS_PORT_MARKER) {
        if let Some(rest) = url.strip_prefix("http://") {
            debug!(url = url, "https-port marker detected, upgrading scheme");
            return Ok(format!("https://{}", rest));
        }
    }

    Ok(url.to_string())
}

/// Build a reqwest client honoring redirect, TLS-skip, proxy and timeout
/// policies. Certificate verification is always skipped: the engine is a
/// diagnostic tool, not a user agent.
pub fn build_client(options: &ProbeOptions) -> ScannerResult<reqwest::Client> {
    let redirect = if options.follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(options.timeout)
        .redirect(redirect);

    if !options.proxy.is_empty() {
        let proxy = reqwest::Proxy::all(&options.proxy).map_err(|e| {
            ScannerError::Network(NetworkError::ProxyError {
                reason: e.to_string(),
            })
        })?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(ScannerError::from)
}

/// Send one HTTP request and assemble the byte-accurate record pair.
///
/// Retries (transport errors only, jittered backoff) happen inside; HTTP
/// status codes are results, not errors.
pub async fn send_http_request(
    method: &str,
    url_str: &str,
    body: &str,
    options: &ProbeOptions,
) -> ScannerResult<(Arc<Request>, Arc<Response>)> {
    let client = build_client(options)?;

    // Default header policy; rule-supplied headers override.
    let mut headers: HashMap<String, String> = HashMap::new();
    headers.insert("User-Agent".into(), random_user_agent().to_string());
    headers.insert("Accept".into(), "*/*".into());
    headers.insert("X-Forwarded-For".into(), random_forwarded_ip());
    headers.insert("Pragma".into(), "no-cache".into());
    headers.insert("Cache-Control".into(), "no-cache".into());
    headers.insert("Connection".into(), "close".into());
    if method.eq_ignore_ascii_case("POST")
        && !options
            .custom_headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"))
    {
        headers.insert(
            "Content-Type".into(),
            "application/x-www-form-urlencoded".into(),
        );
    }
    for (k, v) in &options.custom_headers {
        headers.insert(k.clone(), v.clone());
    }

    let retry_config = RetryConfig::default().with_max_attempts(options.retries.max(1));
    let started = Instant::now();

    let response = retry_with_backoff(&retry_config, "http_probe", || {
        let client = client.clone();
        let headers = headers.clone();
        let method = method.to_string();
        let url = url_str.to_string();
        let body = body.to_string();
        async move {
            let parsed_method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|_| {
                    ScannerError::Network(NetworkError::Other(format!(
                        "invalid method {:?}",
                        method
                    )))
                })?;
            let mut req = client.request(parsed_method, &url);
            for (k, v) in &headers {
                req = req.header(k.as_str(), v.as_str());
            }
            if !body.is_empty() {
                req = req.body(body);
            }
            req.send().await.map_err(ScannerError::from)
        }
    })
    .await?;

    let latency = started.elapsed().as_millis() as i64;

    let final_url = response.url().clone();
    let status = response.status().as_u16() as i64;

    let mut resp_headers: HashMap<String, String> = HashMap::new();
    let mut raw_header_lines: Vec<String> = Vec::new();
    for (name, value) in response.headers() {
        let value_str = value.to_str().unwrap_or_default();
        resp_headers.insert(name.as_str().to_lowercase(), value_str.to_string());
        raw_header_lines.push(format!("{}: {}", name.as_str(), value_str));
    }
    let content_type = resp_headers.get("content-type").cloned().unwrap_or_default();
    let version = format!("{:?}", response.version());

    let body_bytes = response.bytes().await.unwrap_or_default();
    let body_bytes = if body_bytes.len() > MAX_BODY_SIZE {
        body_bytes.slice(..MAX_BODY_SIZE)
    } else {
        body_bytes
    };
    let utf8_body = String::from_utf8_lossy(&body_bytes).into_owned();

    let icon_hash = if options.icon_hash {
        let declared = icon::icon_url(final_url.as_str(), &utf8_body);
        if declared.ends_with("/favicon.ico") && !utf8_body.to_lowercase().contains("icon") {
            // Page does not advertise an icon; skip the blind fetch so that
            // cache-covered targets stay at one round-trip.
            "0".to_string()
        } else {
            icon::fetch_icon_hash(&declared, &options.proxy, options.timeout).await
        }
    } else {
        "0".to_string()
    };

    let raw_header = raw_header_lines.join("\n");
    let raw = format!("{} {}\n{}\n\n{}", version, status, raw_header, utf8_body);

    let proto_resp = Response {
        status,
        url: UrlRecord::from_url(&final_url),
        headers: resp_headers,
        content_type,
        body: utf8_body.into_bytes(),
        raw: raw.into_bytes(),
        raw_header: raw_header.into_bytes(),
        latency,
        icon_hash,
    };

    let requested = Url::parse(url_str).unwrap_or(final_url);
    let req_path = requested.path().to_string();
    let req_host = requested
        .host_str()
        .map(|h| match requested.port() {
            Some(p) => format!("{}:{}", h, p),
            None => h.to_string(),
        })
        .unwrap_or_default();

    let proto_req = Request {
        method: method.to_uppercase(),
        url: UrlRecord::from_url(&requested),
        content_type: headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone())
            .unwrap_or_default(),
        raw: synthesize_raw_request(
            &method.to_uppercase(),
            &req_path,
            &req_host,
            &headers,
            body.as_bytes(),
        ),
        raw_header: raw_header_block(&headers),
        headers,
        body: body.as_bytes().to_vec(),
    };

    Ok((Arc::new(proto_req), Arc::new(proto_resp)))
}

/// Join a normalized target with a canonical rule path.
pub fn join_target_path(target: &str, path: &str) -> String {
    let base = target.trim_end_matches('/');
    format!("{}{}", base, path)
}
