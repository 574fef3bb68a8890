// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::proto::{Request, Response};
use crate::rules::model::Finger;
use crate::wappalyzer::Technologies;

/// Options for a scan run. Mirrors the CLI surface; also the library entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanOptions {
    /// Targets given directly (URL or host[:port])
    pub targets: Vec<String>,

    /// File with one target per line
    pub targets_file: Option<String>,

    /// URL worker count (default 10)
    #[serde(default)]
    pub threads: usize,

    /// Rule worker count (default 500, clamped to [100, 5000])
    #[serde(default)]
    pub rule_threads: usize,

    /// HTTP or SOCKS5 proxy URL
    #[serde(default)]
    pub proxy: String,

    /// Per-request timeout in seconds (<= 0 means the 5 s default)
    #[serde(default)]
    pub timeout: i64,

    /// Output file path; extension selects the format
    pub output: Option<String>,

    /// Force JSON output regardless of extension
    #[serde(default)]
    pub json_output: bool,

    /// Unix-domain-socket path for result broadcast
    pub sock_output: Option<String>,

    /// Single rule file (takes precedence over `rule_dir`)
    pub rule_file: Option<String>,

    /// Rule directory, walked recursively
    pub rule_dir: Option<String>,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,
}

impl ScanOptions {
    pub fn url_worker_count(&self) -> usize {
        if self.threads == 0 {
            10
        } else {
            self.threads
        }
    }

    pub fn rule_worker_count(&self) -> usize {
        let requested = if self.rule_threads == 0 {
            500
        } else {
            self.rule_threads
        };
        requested.clamp(100, 5000)
    }
}

/// Server banner distilled from the `Server` response header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub original_server: String,
    pub server_type: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(original: &str, server_type: &str, version: &str) -> Self {
        Self {
            original_server: original.to_string(),
            server_type: server_type.to_string(),
            version: version.to_string(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Basic facts about a target, shared with every rule evaluation.
#[derive(Debug, Clone, Default)]
pub struct BaseInfo {
    pub title: String,
    pub server: ServerInfo,
    pub status_code: i64,
}

/// Baseline fetch result handed from the pipeline to rule evaluation.
#[derive(Debug, Clone)]
pub struct BaseInfoResponse {
    pub url: String,
    pub title: String,
    pub server: ServerInfo,
    pub status_code: i64,
    pub response: Option<Arc<Response>>,
    pub request: Option<Arc<Request>>,
    pub wappalyzer: Option<Technologies>,
}

/// One matched fingerprint with its evidence snapshots.
#[derive(Debug, Clone)]
pub struct FingerMatch {
    pub finger: Arc<Finger>,
    pub result: bool,
    pub request: Option<Arc<Request>>,
    pub response: Option<Arc<Response>>,
}

/// Scan result for one target.
#[derive(Debug, Clone)]
pub struct TargetResult {
    pub url: String,
    pub status_code: i64,
    pub title: String,
    pub server: ServerInfo,
    pub matches: Vec<FingerMatch>,
    pub wappalyzer: Option<Technologies>,
    pub last_request: Option<Arc<Request>>,
    pub last_response: Option<Arc<Response>>,
}

impl TargetResult {
    pub fn unreachable(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status_code: 0,
            title: String::new(),
            server: ServerInfo::empty(),
            matches: Vec::new(),
            wappalyzer: None,
            last_request: None,
            last_response: None,
        }
    }

    pub fn matched(&self) -> bool {
        !self.matches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_worker_count_clamped() {
        let mut opts = ScanOptions::default();
        assert_eq!(opts.rule_worker_count(), 500);

        opts.rule_threads = 7;
        assert_eq!(opts.rule_worker_count(), 100);

        opts.rule_threads = 9000;
        assert_eq!(opts.rule_worker_count(), 5000);

        opts.rule_threads = 1200;
        assert_eq!(opts.rule_worker_count(), 1200);
    }

    #[test]
    fn test_url_worker_count_default() {
        let opts = ScanOptions::default();
        assert_eq!(opts.url_worker_count(), 10);
    }

    #[test]
    fn test_server_info_empty() {
        let info = ServerInfo::empty();
        assert_eq!(info.original_server, "");
        assert_eq!(info.server_type, "");
        assert_eq!(info.version, "");
    }
}
