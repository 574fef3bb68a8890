// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - Concurrency Tests
 * High fan-out across both pools with deterministic totals
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tunniste_scanner::runner::Scanner;
use tunniste_scanner::types::ScanOptions;

const FINGERS_PER_TARGET: usize = 200;
const TARGETS: usize = 5;

async fn start_stub() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx/1.18.0")
                .set_body_string("<title>stub</title>"),
        )
        .mount(&server)
        .await;
    server
}

fn write_fingers(dir: &std::path::Path) {
    for i in 0..FINGERS_PER_TARGET {
        std::fs::write(
            dir.join(format!("f{i}.yaml")),
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
}

async fn run_scan(targets: Vec<String>, rules_dir: &std::path::Path, rule_threads: usize) -> usize {
    let options = ScanOptions {
        targets,
        rule_dir: Some(rules_dir.display().to_string()),
        rule_threads,
        threads: 10,
        timeout: 2,
        ..Default::default()
    };
    let scanner = Scanner::new(options).unwrap();
    let summary = scanner.run().await.unwrap();
    assert_eq!(summary.pool.failed_tasks, 0);

    scanner
        .results()
        .values()
        .map(|result| result.matches.len())
        .sum()
}

#[tokio::test]
async fn test_high_fanout_totals_are_deterministic() {
    let mut servers = Vec::new();
    for _ in 0..TARGETS {
        servers.push(start_stub().await);
    }
    let targets: Vec<String> = servers.iter().map(|s| s.uri()).collect();

    let rules_dir = tempfile::tempdir().unwrap();
    write_fingers(rules_dir.path());

    // saturated wide pool and a narrow pool must agree on total matches
    let wide = run_scan(targets.clone(), rules_dir.path(), 5000).await;
    let narrow = run_scan(targets, rules_dir.path(), 100).await;

    assert_eq!(wide, TARGETS * FINGERS_PER_TARGET);
    assert_eq!(wide, narrow);
}

#[tokio::test]
async fn test_rule_pool_counts_all_submissions() {
    let server = start_stub().await;
    let rules_dir = tempfile::tempdir().unwrap();
    write_fingers(rules_dir.path());

    let options = ScanOptions {
        targets: vec![server.uri()],
        rule_dir: Some(rules_dir.path().display().to_string()),
        rule_threads: 100,
        timeout: 2,
        ..Default::default()
    };
    let scanner = Scanner::new(options).unwrap();
    let summary = scanner.run().await.unwrap();

    assert_eq!(summary.pool.total_tasks, FINGERS_PER_TARGET as u64);
    assert_eq!(summary.pool.completed_tasks, FINGERS_PER_TARGET as u64);
}
