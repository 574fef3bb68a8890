// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - Scan Runner
 * Owns the rule library, the shared rule pool and the per-run cache;
 * drives the URL worker pool and funnels results to the writers
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::cache::TargetCache;
use crate::errors::{ScannerError, ScannerResult};
use crate::output::{self, ResultRecord, ResultWriter, SockBroadcaster};
use crate::pipeline;
use crate::rules::model::Finger;
use crate::rules::{load_fingerprints, RuleSource};
use crate::scheduler::{url_pool_semaphore, PoolStatsSnapshot, RulePool};
use crate::types::{ScanOptions, TargetResult};
use crate::wappalyzer::{self, Technologies};

/// End-of-run totals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSummary {
    pub matched_targets: usize,
    pub unmatched_targets: usize,
    pub pool: PoolStatsSnapshot,
}

/// One scan run's context: fingerprint library (read-only after load),
/// shared rule pool, per-target cache. No process-wide globals; everything
/// is released when the `Scanner` drops.
pub struct Scanner {
    options: ScanOptions,
    fingers: Arc<Vec<Arc<Finger>>>,
    cache: Arc<TargetCache>,
    rule_pool: Arc<RulePool>,
    results: Arc<Mutex<HashMap<String, TargetResult>>>,
}

impl Scanner {
    /// Load the rule library and pre-allocate the rule pool.
    pub fn new(options: ScanOptions) -> ScannerResult<Self> {
        let source = RuleSource {
            rule_file: options.rule_file.clone(),
            rule_dir: options.rule_dir.clone(),
        };
        let fingers = load_fingerprints(&source)?;
        info!(count = fingers.len(), "fingerprint rules loaded");

        let rule_pool = RulePool::new(options.rule_worker_count());
        info!(workers = rule_pool.worker_count(), "rule pool initialized");

        Ok(Self {
            options,
            fingers: Arc::new(fingers),
            cache: Arc::new(TargetCache::new()),
            rule_pool: Arc::new(rule_pool),
            results: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn fingerprints(&self) -> &[Arc<Finger>] {
        &self.fingers
    }

    pub fn pool_stats(&self) -> PoolStatsSnapshot {
        self.rule_pool.stats()
    }

    pub fn reset_pool_stats(&self) {
        self.rule_pool.reset_stats()
    }

    /// Baseline facts for one target, without rule evaluation.
    pub async fn base_info(&self, target: &str) -> ScannerResult<crate::types::BaseInfoResponse> {
        pipeline::get_base_info(target, &self.options.proxy, self.options.timeout).await
    }

    /// Scan a single target through the full pipeline.
    pub async fn finger_scan(&self, target: &str) -> TargetResult {
        pipeline::process_url(
            target,
            &self.fingers,
            &self.cache,
            &self.rule_pool,
            &self.options.proxy,
            self.options.timeout,
        )
        .await
    }

    /// Run the configured scan: URL pool fan-out, per-target pipeline,
    /// writers, progress bar, summary.
    pub async fn run(&self) -> ScannerResult<ScanSummary> {
        let targets = collect_targets(&self.options)?;
        if targets.is_empty() {
            return Err(ScannerError::Configuration(
                "no valid targets to scan".into(),
            ));
        }
        info!(targets = targets.len(), "starting scan");

        let writer = match &self.options.output {
            Some(path) if !path.is_empty() => {
                let format = output::detect_format(self.options.json_output, path);
                Some(Arc::new(ResultWriter::create(path, format)?))
            }
            _ => None,
        };

        let sock = match &self.options.sock_output {
            Some(path) if !path.is_empty() => {
                let broadcaster = SockBroadcaster::bind(path)?;
                info!(path = %path, "socket broadcast enabled");
                Some(Arc::new(broadcaster))
            }
            _ => None,
        };

        let progress = output::create_progress_bar(targets.len() as u64);
        let semaphore = url_pool_semaphore(self.options.url_worker_count(), targets.len());

        // Periodic heartbeat with pool counters while the scan is running.
        let monitor_pool = Arc::clone(&self.rule_pool);
        let monitor_results = Arc::clone(&self.results);
        let monitor = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(10));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stats = monitor_pool.stats();
                debug!(
                    targets_done = monitor_results.lock().len(),
                    rule_tasks = stats.total_tasks,
                    completed = stats.completed_tasks,
                    failed = stats.failed_tasks,
                    "scan heartbeat"
                );
            }
        });

        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ScannerError::General("url pool closed".into()))?;

            let fingers = Arc::clone(&self.fingers);
            let cache = Arc::clone(&self.cache);
            let rule_pool = Arc::clone(&self.rule_pool);
            let results = Arc::clone(&self.results);
            let writer = writer.clone();
            let sock = sock.clone();
            let progress = progress.clone();
            let proxy = self.options.proxy.clone();
            let timeout = self.options.timeout;
            let json_stdout = self.options.json_output && self.options.output.is_none();

            handles.push(tokio::spawn(async move {
                let result =
                    pipeline::process_url(&target, &fingers, &cache, &rule_pool, &proxy, timeout)
                        .await;
                drop(permit);

                let record = ResultRecord::from_target(&result);

                if result.matched() {
                    progress.println(format!(
                        "[+] {} [{}] {} {}",
                        result.url,
                        result.status_code,
                        result.title,
                        record.finger_ids.join(",")
                    ));
                } else {
                    debug!(target = %result.url, "no fingerprint matched");
                }

                if json_stdout {
                    if let Ok(line) = record.to_json_line() {
                        progress.println(line);
                    }
                }

                if let Some(writer) = &writer {
                    if let Err(err) = writer.write_record(&record) {
                        error!(error = %err, "output write failed");
                    }
                }
                if let Some(sock) = &sock {
                    if let Ok(line) = record.to_json_line() {
                        sock.broadcast(line);
                    }
                }

                progress.inc(1);
                results.lock().insert(target, result);
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        monitor.abort();
        progress.finish();

        let summary = self.summarize();
        info!(
            matched = summary.matched_targets,
            unmatched = summary.unmatched_targets,
            rule_tasks = summary.pool.total_tasks,
            "scan finished"
        );

        // Per-run resources go down with the run.
        self.cache.clear_all();
        self.rule_pool.release();

        Ok(summary)
    }

    pub fn results(&self) -> HashMap<String, TargetResult> {
        self.results.lock().clone()
    }

    fn summarize(&self) -> ScanSummary {
        let results = self.results.lock();
        let matched_targets = results.values().filter(|r| r.matched()).count();
        ScanSummary {
            matched_targets,
            unmatched_targets: results.len() - matched_targets,
            pool: self.rule_pool.stats(),
        }
    }
}

/// Gather targets from the options, preserving order and dropping
/// duplicates and blanks.
pub fn collect_targets(options: &ScanOptions) -> ScannerResult<Vec<String>> {
    let mut raw: Vec<String> = Vec::new();

    if !options.targets.is_empty() {
        for entry in &options.targets {
            for part in entry.split(',') {
                raw.push(part.trim().to_string());
            }
        }
    } else if let Some(file) = options.targets_file.as_deref().filter(|s| !s.is_empty()) {
        let contents = std::fs::read_to_string(file).map_err(|e| {
            ScannerError::Configuration(format!("cannot read targets file {}: {}", file, e))
        })?;
        for line in contents.lines() {
            raw.push(line.trim().to_string());
        }
    }

    let original_count = raw.len();
    let mut seen = HashSet::new();
    let targets: Vec<String> = raw
        .into_iter()
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect();

    info!(
        original = original_count,
        duplicates = original_count - targets.len(),
        effective = targets.len(),
        "targets collected"
    );

    Ok(targets)
}

/// Fetch one target and run technology inference only.
pub async fn wappalyzer_scan(
    target: &str,
    proxy: &str,
    timeout_secs: i64,
) -> ScannerResult<Technologies> {
    let baseline = pipeline::get_base_info(target, proxy, timeout_secs).await?;
    Ok(match baseline.wappalyzer {
        Some(tech) => tech,
        None => baseline
            .response
            .map(|resp| wappalyzer::analyze(&resp.headers, &resp.body))
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_targets_dedup_and_commas() {
        let options = ScanOptions {
            targets: vec![
                "a.test,b.test".into(),
                " a.test ".into(),
                "c.test".into(),
            ],
            ..Default::default()
        };
        let targets = collect_targets(&options).unwrap();
        assert_eq!(targets, vec!["a.test", "b.test", "c.test"]);
    }

    #[test]
    fn test_collect_targets_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.txt");
        std::fs::write(&path, "a.test\n\nb.test\na.test\n").unwrap();

        let options = ScanOptions {
            targets_file: Some(path.display().to_string()),
            ..Default::default()
        };
        let targets = collect_targets(&options).unwrap();
        assert_eq!(targets, vec!["a.test", "b.test"]);
    }

    #[test]
    fn test_collect_targets_missing_file() {
        let options = ScanOptions {
            targets_file: Some("/no/such/file".into()),
            ..Default::default()
        };
        assert!(collect_targets(&options).is_err());
    }

    #[test]
    fn test_scanner_new_loads_embedded() {
        let scanner = Scanner::new(ScanOptions::default()).unwrap();
        assert!(!scanner.fingerprints().is_empty());
    }

    #[tokio::test]
    async fn test_run_without_targets_fails() {
        let scanner = Scanner::new(ScanOptions::default()).unwrap();
        assert!(scanner.run().await.is_err());
    }
}
