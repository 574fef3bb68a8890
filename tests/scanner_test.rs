// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - Scanner End-to-End Tests
 * Stub-server scenarios for baseline extraction, cache behavior and
 * rule-failure isolation
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tunniste_scanner::runner::Scanner;
use tunniste_scanner::types::ScanOptions;

const BODY: &str = "<html><title>Hi</title></html>";

fn write_rules(dir: &std::path::Path, rules: &[(&str, &str)]) {
    for (name, contents) in rules {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

fn scanner_with_rules(dir: &std::path::Path) -> Scanner {
    let options = ScanOptions {
        rule_dir: Some(dir.display().to_string()),
        timeout: 2,
        ..Default::default()
    };
    Scanner::new(options).unwrap()
}

async fn mock_nginx_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx/1.18.0")
                .set_body_string(BODY),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_single_target_baseline_match() {
    let server = mock_nginx_server().await;
    let rules_dir = tempfile::tempdir().unwrap();
    write_rules(
        rules_dir.path(),
        &[(
            "nginx.yaml",
            r#"
id: nginx-test
info:
  name: Nginx
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200 && "nginx" in response.headers["server"]
expression: r0()
"#,
        )],
    );

    let scanner = scanner_with_rules(rules_dir.path());
    let result = scanner.finger_scan(&server.uri()).await;

    assert_eq!(result.status_code, 200);
    assert_eq!(result.title, "Hi");
    assert_eq!(result.server.server_type, "nginx");
    assert_eq!(result.server.version, "1.18.0");
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].finger.id, "nginx-test");
}

#[tokio::test]
async fn test_cache_reuse_single_round_trip() {
    // 1,000 cache-eligible fingerprints share the baseline round-trip.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx/1.18.0")
                .set_body_string(BODY),
        )
        .expect(1)
        .mount(&server)
        .await;

    let rules_dir = tempfile::tempdir().unwrap();
    for i in 0..1000 {
        let doc = format!(
            r#"
id: f{i}
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200
expression: r0()
"#
        );
        std::fs::write(rules_dir.path().join(format!("f{i}.yaml")), doc).unwrap();
    }

    let scanner = scanner_with_rules(rules_dir.path());
    let result = scanner.finger_scan(&server.uri()).await;

    assert_eq!(result.matches.len(), 1000);
    server.verify().await;
}

#[tokio::test]
async fn test_cache_bypass_on_custom_header() {
    let server = MockServer::start().await;
    // specific mock first: the probe carrying the custom header
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("X-Probe", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx/1.18.0")
                .set_body_string(BODY),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx/1.18.0")
                .set_body_string(BODY),
        )
        .expect(1)
        .mount(&server)
        .await;

    let rules_dir = tempfile::tempdir().unwrap();
    write_rules(
        rules_dir.path(),
        &[
            (
                "plain.yaml",
                r#"
id: plain
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200
expression: r0()
"#,
            ),
            (
                "probe.yaml",
                r#"
id: probe
rules:
  r0:
    request:
      method: GET
      path: /
      headers:
        X-Probe: "1"
    expression: response.status == 200
expression: r0()
"#,
            ),
        ],
    );

    let scanner = scanner_with_rules(rules_dir.path());
    let result = scanner.finger_scan(&server.uri()).await;

    assert_eq!(result.matches.len(), 2);
    server.verify().await;
}

#[tokio::test]
async fn test_rule_failure_isolation() {
    // r1 probes a refusing TCP port; r0 and r2 still evaluate and the
    // combining expression r0() && r2() && !r1() holds.
    let server = mock_nginx_server().await;
    let rules_dir = tempfile::tempdir().unwrap();
    write_rules(
        rules_dir.path(),
        &[(
            "isolated.yaml",
            r#"
id: isolated
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200
  r1:
    request:
      type: tcp
      host: "127.0.0.1:1"
      data: "ping"
      read-size: 16
      read-timeout: 1
    expression: response.raw.bcontains(b"pong")
  r2:
    request:
      method: GET
      path: /
    expression: '"nginx" in response.headers["server"]'
expression: r0() && r2() && !r1()
"#,
        )],
    );

    let scanner = scanner_with_rules(rules_dir.path());
    let result = scanner.finger_scan(&server.uri()).await;

    assert_eq!(result.matches.len(), 1);
    assert!(result.matches[0].result);
}

#[tokio::test]
async fn test_scheme_upgrade_marker() {
    // A plain-HTTP listener answering with the HTTPS-port marker: the
    // resolved target URL must come out as https.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let body =
                    "<html><title>400 The plain HTTP request was sent to HTTPS port</title></html>";
                let reply = format!(
                    "HTTP/1.1 400 Bad Request\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
            });
        }
    });

    let rules_dir = tempfile::tempdir().unwrap();
    write_rules(
        rules_dir.path(),
        &[(
            "any.yaml",
            r#"
id: any
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200
expression: r0()
"#,
        )],
    );

    let scanner = scanner_with_rules(rules_dir.path());
    let result = scanner
        .finger_scan(&format!("127.0.0.1:{}", addr.port()))
        .await;

    assert!(
        result.url.starts_with("https://"),
        "expected https scheme, got {}",
        result.url
    );
}

#[tokio::test]
async fn test_output_bindings_cross_rule() {
    // A rule's output binding and recorded key are visible to later rules.
    let server = mock_nginx_server().await;
    let rules_dir = tempfile::tempdir().unwrap();
    write_rules(
        rules_dir.path(),
        &[(
            "chained.yaml",
            r#"
id: chained
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200
    output:
      saved_status: response.status
  r1:
    request:
      method: GET
      path: /
    expression: saved_status == 200 && r0()
expression: r0() && r1()
"#,
        )],
    );

    let scanner = scanner_with_rules(rules_dir.path());
    let result = scanner.finger_scan(&server.uri()).await;

    assert_eq!(result.matches.len(), 1);
}

#[tokio::test]
async fn test_expression_timeout_reports_false() {
    // The evaluation cap turns a runaway sleep into a plain mismatch and
    // the target still completes promptly afterwards.
    let server = mock_nginx_server().await;
    let rules_dir = tempfile::tempdir().unwrap();
    write_rules(
        rules_dir.path(),
        &[(
            "sleeper.yaml",
            r#"
id: sleeper
rules:
  r0:
    request:
      method: GET
      path: /
    expression: sleep(40000) && true
expression: r0()
"#,
        )],
    );

    let scanner = scanner_with_rules(rules_dir.path());
    let started = Instant::now();
    let result = scanner.finger_scan(&server.uri()).await;

    assert!(result.matches.is_empty());
    assert!(
        started.elapsed() < Duration::from_secs(35),
        "target took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_unreachable_target_zeroed_baseinfo() {
    let rules_dir = tempfile::tempdir().unwrap();
    write_rules(
        rules_dir.path(),
        &[(
            "any.yaml",
            r#"
id: any
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200
expression: r0()
"#,
        )],
    );

    let scanner = scanner_with_rules(rules_dir.path());
    let result = scanner.finger_scan("http://127.0.0.1:1").await;

    assert_eq!(result.status_code, 0);
    assert_eq!(result.title, "");
    assert_eq!(result.server.server_type, "");
    assert!(result.matches.is_empty());
}

#[tokio::test]
async fn test_follow_redirects_policies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/landing")
                .insert_header("Server", "nginx"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&server)
        .await;

    let rules_dir = tempfile::tempdir().unwrap();
    write_rules(
        rules_dir.path(),
        &[(
            "redirects.yaml",
            r#"
id: redirects
rules:
  r0:
    request:
      method: GET
      path: /
      follow_redirects: false
    expression: response.status == 302
  r1:
    request:
      method: GET
      path: /
    expression: response.status == 200 && response.body.bcontains(b"landed")
expression: r0() && r1()
"#,
        )],
    );

    let scanner = scanner_with_rules(rules_dir.path());
    let result = scanner.finger_scan(&server.uri()).await;

    assert_eq!(result.matches.len(), 1);
}

#[tokio::test]
async fn test_pool_stats_accounting() {
    let server = mock_nginx_server().await;
    let rules_dir = tempfile::tempdir().unwrap();
    for i in 0..5 {
        std::fs::write(
            rules_dir.path().join(format!("f{i}.yaml")),
            format!(
                r#"
id: f{i}
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200
expression: r0()
"#
            ),
        )
        .unwrap();
    }

    let scanner = scanner_with_rules(rules_dir.path());
    let _ = scanner.finger_scan(&server.uri()).await;

    let stats = scanner.pool_stats();
    assert_eq!(stats.total_tasks, 5);
    assert_eq!(stats.completed_tasks, 5);
    assert_eq!(stats.failed_tasks, 0);

    scanner.reset_pool_stats();
    assert_eq!(scanner.pool_stats().total_tasks, 0);
}
