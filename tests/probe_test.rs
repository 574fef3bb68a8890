// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - Dispatcher Integration Tests
 * Header policy, template substitution and redirect handling against a
 * stub server
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::time::Duration;
use wiremock::matchers::{body_string, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tunniste_scanner::expr::{Evaluator, Value};
use tunniste_scanner::probe::dispatch_rule;
use tunniste_scanner::probe::http::{check_protocol, send_http_request, ProbeOptions};
use tunniste_scanner::rules::model::RuleRequest;

#[tokio::test]
async fn test_default_header_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header_exists("User-Agent"))
        .and(header_exists("X-Forwarded-For"))
        .and(header("Accept", "*/*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let options = ProbeOptions {
        timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let url = format!("{}/", server.uri());
    let (request, response) = send_http_request("GET", &url, "", &options).await.unwrap();

    assert_eq!(response.status, 200);
    assert!(request.headers.contains_key("User-Agent"));
    server.verify().await;
}

#[tokio::test]
async fn test_post_gets_form_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string("a=1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let options = ProbeOptions {
        timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let url = format!("{}/login", server.uri());
    let (_, response) = send_http_request("POST", &url, "a=1", &options).await.unwrap();

    assert_eq!(response.status, 200);
    server.verify().await;
}

#[tokio::test]
async fn test_rule_headers_override_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("User-Agent", "custom-agent"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = ProbeOptions {
        timeout: Duration::from_secs(2),
        ..Default::default()
    };
    options
        .custom_headers
        .insert("User-Agent".into(), "custom-agent".into());

    let url = format!("{}/", server.uri());
    send_http_request("GET", &url, "", &options).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_dispatch_substitutes_path_variables() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/probe-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("found"))
        .expect(1)
        .mount(&server)
        .await;

    let template = RuleRequest {
        method: "GET".into(),
        path: "/probe-{{token}}".into(),
        ..Default::default()
    };
    let mut env = Evaluator::new();
    env.set_var("token", Value::String("abc".into()));

    let (request, response) = dispatch_rule(
        &server.uri(),
        &template,
        &mut env,
        "",
        Duration::from_secs(2),
    )
    .await
    .unwrap();

    assert_eq!(request.url.path, "/probe-abc");
    assert_eq!(response.status, 200);

    // the environment was materialized back
    match env.get_var("response") {
        Some(Value::Response(resp)) => assert_eq!(resp.body, b"found"),
        other => panic!("response binding missing: {:?}", other),
    }
    server.verify().await;
}

#[tokio::test]
async fn test_no_follow_returns_first_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", "/elsewhere"),
        )
        .mount(&server)
        .await;

    let options = ProbeOptions {
        timeout: Duration::from_secs(2),
        follow_redirects: false,
        ..Default::default()
    };
    let url = format!("{}/", server.uri());
    let (_, response) = send_http_request("GET", &url, "", &options).await.unwrap();

    assert_eq!(response.status, 301);
    assert_eq!(
        response.headers.get("location").map(String::as_str),
        Some("/elsewhere")
    );
}

#[tokio::test]
async fn test_check_protocol_passthrough_with_scheme() {
    let url = check_protocol("http://example.test:8080", "", Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(url, "http://example.test:8080");
}

#[tokio::test]
async fn test_response_raw_contains_header_block() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx")
                .set_body_string("body-bytes"),
        )
        .mount(&server)
        .await;

    let options = ProbeOptions {
        timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let url = format!("{}/", server.uri());
    let (_, response) = send_http_request("GET", &url, "", &options).await.unwrap();

    assert!(response.raw.len() >= response.raw_header.len());
    let raw = String::from_utf8_lossy(&response.raw);
    assert!(raw.contains("body-bytes"));
    // header keys in the map are lowercased
    assert_eq!(response.headers.get("server").map(String::as_str), Some("nginx"));
}
