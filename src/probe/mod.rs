// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request dispatcher: rule request templates become concrete HTTP, TCP,
//! UDP or TLS probes, and the resulting record pair is materialized back
//! into the variable environment.

pub mod http;
pub mod icon;
pub mod raw;
pub mod socket;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::errors::{NetworkError, ScannerError, ScannerResult};
use crate::expr::{Evaluator, Value};
use crate::proto::{Request, Response};
use crate::rules::model::{RuleRequest, GO_TYPE, HTTP_TYPE, SSL_TYPE, TCP_TYPE, UDP_TYPE};

/// Dispatch one rule request template against a normalized target.
///
/// On success the environment's `request`/`response` bindings are replaced
/// with the fresh records. On failure the environment is left untouched and
/// the caller records the owning rule key as `false`.
pub async fn dispatch_rule(
    target: &str,
    template: &RuleRequest,
    env: &mut Evaluator,
    proxy: &str,
    timeout: Duration,
) -> ScannerResult<(Arc<Request>, Arc<Response>)> {
    let req_type = template.req_type.to_lowercase();

    let (request, response) = match req_type.as_str() {
        "" | HTTP_TYPE => {
            if template.raw.is_empty() {
                dispatch_http(target, template, env, proxy, timeout).await?
            } else {
                let raw_blob = http::substitute_variables(&template.raw, env);
                raw::send_raw_request(target, &raw_blob, timeout).await?
            }
        }
        TCP_TYPE | UDP_TYPE | SSL_TYPE => {
            dispatch_socket(target, &req_type, template, env, timeout).await?
        }
        GO_TYPE => {
            // External plugin transport; not wired into this engine.
            return Err(ScannerError::Network(NetworkError::UnsupportedTransport {
                transport: req_type,
            }));
        }
        other => {
            return Err(ScannerError::Network(NetworkError::UnsupportedTransport {
                transport: other.to_string(),
            }));
        }
    };

    env.set_var("request", Value::Request(Arc::clone(&request)));
    env.set_var("response", Value::Response(Arc::clone(&response)));

    Ok((request, response))
}

async fn dispatch_http(
    target: &str,
    template: &RuleRequest,
    env: &Evaluator,
    proxy: &str,
    timeout: Duration,
) -> ScannerResult<(Arc<Request>, Arc<Response>)> {
    // Substitute template variables, then canonicalize.
    let substituted_path = http::substitute_variables(template.path.trim(), env);
    let path = http::format_path(&substituted_path);

    let mut custom_headers = template.headers.clone();
    let mut body = http::substitute_variables(template.body.trim(), env);

    let content_type = custom_headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    if content_type.to_lowercase().starts_with("multipart/form-data") && body.contains("\n\n") {
        if let Some((new_body, new_content_type)) = http::deal_multipart(&body) {
            body = http::substitute_variables(&new_body, env);
            custom_headers.retain(|k, _| !k.eq_ignore_ascii_case("content-type"));
            custom_headers.insert("Content-Type".to_string(), new_content_type);
        }
    }

    let normalized = http::check_protocol(target, proxy, timeout)
        .await
        .unwrap_or_else(|_| {
            if target.starts_with("http://") || target.starts_with("https://") {
                target.to_string()
            } else {
                format!("https://{}", target)
            }
        });

    let url = http::join_target_path(&normalized, &path);
    debug!(url = %url, method = %template.method_or_get(), "dispatching http probe");

    let options = http::ProbeOptions {
        proxy: proxy.to_string(),
        timeout,
        retries: 3,
        follow_redirects: template.follow_redirects,
        custom_headers,
        icon_hash: false,
    };

    http::send_http_request(&template.method_or_get(), &url, &body, &options).await
}

async fn dispatch_socket(
    target: &str,
    req_type: &str,
    template: &RuleRequest,
    env: &Evaluator,
    timeout: Duration,
) -> ScannerResult<(Arc<Request>, Arc<Response>)> {
    let host = http::substitute_variables(template.host.trim(), env);
    let address = if host.is_empty() {
        socket_address_of(target)?
    } else {
        host
    };

    let mut data = http::substitute_variables(&template.data, env).into_bytes();
    if template.data_type.eq_ignore_ascii_case("hex") {
        let hex_str: String = data
            .iter()
            .map(|&b| b as char)
            .filter(|c| !c.is_whitespace())
            .collect();
        data = hex::decode(&hex_str).map_err(|e| {
            ScannerError::Network(NetworkError::Other(format!("bad hex data: {}", e)))
        })?;
    }

    let config = socket::SocketConfig {
        read_size: if template.read_size == 0 {
            2048
        } else {
            template.read_size
        },
        read_timeout: if template.read_timeout == 0 {
            Duration::from_secs(3)
        } else {
            Duration::from_secs(template.read_timeout)
        },
        dial_timeout: timeout,
        use_tls: req_type == SSL_TYPE,
    };

    let started = Instant::now();
    let received = match req_type {
        UDP_TYPE => socket::udp_exchange(&address, &data, &config).await?,
        _ => socket::tcp_exchange(&address, &data, &config).await?,
    };

    Ok(socket::build_socket_records(
        req_type,
        &address,
        &data,
        &received,
        started.elapsed(),
    ))
}

/// Derive a host:port socket address from an HTTP(S) target.
fn socket_address_of(target: &str) -> ScannerResult<String> {
    let candidate = if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{}", target)
    };
    let parsed = Url::parse(&candidate).map_err(|_| {
        ScannerError::Network(NetworkError::InvalidUrl {
            url: target.to_string(),
        })
    })?;
    let host = parsed.host_str().ok_or_else(|| {
        ScannerError::Network(NetworkError::InvalidUrl {
            url: target.to_string(),
        })
    })?;
    let port = parsed
        .port()
        .unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });
    Ok(format!("{}:{}", host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_address_of() {
        assert_eq!(
            socket_address_of("http://example.test:8080/x").unwrap(),
            "example.test:8080"
        );
        assert_eq!(
            socket_address_of("https://example.test").unwrap(),
            "example.test:443"
        );
        assert_eq!(
            socket_address_of("example.test:6379").unwrap(),
            "example.test:6379"
        );
    }

    #[tokio::test]
    async fn test_go_transport_unsupported() {
        let template = RuleRequest {
            req_type: "go".into(),
            ..Default::default()
        };
        let mut env = Evaluator::new();
        let result = dispatch_rule(
            "http://example.test",
            &template,
            &mut env,
            "",
            Duration::from_secs(1),
        )
        .await;
        assert!(result.is_err());
        // environment stays untouched on dispatch failure
        assert!(env.get_var("request").is_none());
    }
}
