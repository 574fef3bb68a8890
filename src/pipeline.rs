// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-target pipeline: baseline fetch, title/server extraction, technology
//! inference, cache seeding, rule fan-out, cache eviction.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::TargetCache;
use crate::errors::ScannerResult;
use crate::probe::http::{self, ProbeOptions};
use crate::rules::model::Finger;
use crate::scheduler::{RulePool, RuleTask};
use crate::server_info;
use crate::title;
use crate::types::{BaseInfo, BaseInfoResponse, ServerInfo, TargetResult};
use crate::wappalyzer;

/// Baseline fetch timeout applied when the caller passes a non-positive
/// timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn effective_timeout(timeout_secs: i64) -> Duration {
    if timeout_secs <= 0 {
        DEFAULT_TIMEOUT
    } else {
        Duration::from_secs(timeout_secs as u64)
    }
}

/// Fetch a target's baseline: normalized URL, status, title, server banner
/// and inferred technologies.
pub async fn get_base_info(
    target: &str,
    proxy: &str,
    timeout_secs: i64,
) -> ScannerResult<BaseInfoResponse> {
    let timeout = effective_timeout(timeout_secs);

    let normalized = match http::check_protocol(target, proxy, timeout).await {
        Ok(url) => url,
        Err(_) if !target.starts_with("http://") && !target.starts_with("https://") => {
            format!("https://{}", target)
        }
        Err(_) => target.to_string(),
    };
    debug!(target = target, normalized = %normalized, "scheme resolved");

    let options = ProbeOptions {
        proxy: proxy.to_string(),
        timeout,
        retries: 3,
        follow_redirects: true,
        custom_headers: Default::default(),
        icon_hash: true,
    };

    let (request, response) = http::send_http_request("GET", &normalized, "", &options).await?;

    let body = String::from_utf8_lossy(&response.body).into_owned();
    let mut page_title = title::extract_title(&body);

    // An i18n bundle referenced by the page can carry the real login title.
    if let Some(i18n_url) = title::find_i18n_script(&normalized, &body) {
        debug!(url = %i18n_url, "fetching i18n bundle for title");
        let i18n_options = ProbeOptions {
            proxy: proxy.to_string(),
            timeout,
            retries: 3,
            follow_redirects: true,
            custom_headers: Default::default(),
            icon_hash: false,
        };
        if let Ok((_, i18n_resp)) =
            http::send_http_request("GET", &i18n_url, "", &i18n_options).await
        {
            let i18n_body = String::from_utf8_lossy(&i18n_resp.body);
            if let Some(better) = title::extract_i18n_title(&i18n_body) {
                page_title = better;
            }
        }
    }

    let server = response
        .headers
        .get("server")
        .map(|value| server_info::parse_server_header(value))
        .unwrap_or_else(ServerInfo::empty);

    let technologies = wappalyzer::analyze(&response.headers, &response.body);
    let wappalyzer = if technologies.is_empty() {
        None
    } else {
        Some(technologies)
    };

    Ok(BaseInfoResponse {
        // The scheme-resolved URL is what rules and the cache key off.
        url: normalized,
        title: page_title,
        server,
        status_code: response.status,
        response: Some(response),
        request: Some(request),
        wappalyzer,
    })
}

/// Run the full pipeline for one URL.
pub async fn process_url(
    target: &str,
    fingers: &[Arc<Finger>],
    cache: &Arc<TargetCache>,
    rule_pool: &RulePool,
    proxy: &str,
    timeout_secs: i64,
) -> TargetResult {
    let baseline = match get_base_info(target, proxy, timeout_secs).await {
        Ok(baseline) => baseline,
        Err(err) => {
            // Target unreachable: zeroed BaseInfo, rules still evaluate
            // against an empty baseline.
            debug!(target = target, error = %err, "baseline fetch failed");
            BaseInfoResponse {
                url: target.to_string(),
                title: String::new(),
                server: ServerInfo::empty(),
                status_code: 0,
                response: None,
                request: None,
                wappalyzer: None,
            }
        }
    };

    let mut result = TargetResult {
        url: baseline.url.clone(),
        status_code: baseline.status_code,
        title: baseline.title.clone(),
        server: baseline.server.clone(),
        matches: Vec::new(),
        wappalyzer: baseline.wappalyzer.clone(),
        last_request: baseline.request.clone(),
        last_response: baseline.response.clone(),
    };

    // Seed the cache with the baseline pair under the key that
    // default-configured rules look up (GET, follow-redirects).
    if let (Some(request), Some(response)) = (&baseline.request, &baseline.response) {
        cache.update(request, response, &baseline.url, true);
    }

    if fingers.is_empty() {
        cache.clear_target_url(&baseline.url);
        return result;
    }

    let base_info = Arc::new(BaseInfo {
        title: baseline.title.clone(),
        server: baseline.server.clone(),
        status_code: baseline.status_code,
    });

    // Fan every finger out to the shared rule pool; joining the handles is
    // this target's wait-group.
    let mut handles = Vec::with_capacity(fingers.len());
    for finger in fingers {
        let task = RuleTask {
            finger: Arc::clone(finger),
            target: baseline.url.clone(),
            base_info: Arc::clone(&base_info),
            cache: Arc::clone(cache),
            proxy: proxy.to_string(),
            timeout: effective_timeout(timeout_secs),
        };
        if let Some(handle) = rule_pool.submit(task).await {
            handles.push(handle);
        }
    }

    for handle in handles {
        if let Ok(Some(finger_match)) = handle.await {
            result.matches.push(finger_match);
        }
    }

    // Release per-target memory before returning.
    cache.clear_target_url(&baseline.url);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_timeout_default() {
        assert_eq!(effective_timeout(0), Duration::from_secs(5));
        assert_eq!(effective_timeout(-3), Duration::from_secs(5));
        assert_eq!(effective_timeout(9), Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_unreachable_target_zeroed() {
        let cache = Arc::new(TargetCache::new());
        let pool = RulePool::new(4);
        let result = process_url("http://127.0.0.1:1", &[], &cache, &pool, "", 1).await;
        assert_eq!(result.status_code, 0);
        assert_eq!(result.title, "");
        assert!(result.matches.is_empty());
        assert!(cache.is_empty());
    }
}
