// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-target request/response cache.
//!
//! Guarantees at most one physical round-trip per distinct
//! `(target URL, method, follow_redirects)` tuple across all cache-eligible
//! rules of a target. Entries are shared (`Arc`) and immutable; readers get
//! the stored records directly with no clone of bodies.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::proto::{Request, Response};
use crate::rules::model::{RuleRequest, HTTP_TYPE};

/// Method axis used when evicting a target's keys.
const CACHE_METHODS: &[&str] = &["GET", "POST", "HEAD", "PUT", "DELETE", "OPTIONS"];

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub request: Arc<Request>,
    pub response: Arc<Response>,
}

/// Process-wide cache for one scan run, behind a reader/writer lock.
/// Reads (cache hits) are the common case; each key is written once.
#[derive(Debug, Default)]
pub struct TargetCache {
    map: RwLock<HashMap<String, CacheEntry>>,
}

fn normalize_url(url: &str) -> &str {
    url.trim_end_matches('/')
}

fn cache_key(url: &str, method: &str, follow_redirects: bool) -> String {
    format!(
        "{}:{}:{}",
        normalize_url(url),
        method.to_uppercase(),
        follow_redirects
    )
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a rule may consult the cache at all: HTTP(S) GET/POST with
    /// no custom headers and no body. Cache-ineligible rules never read
    /// nor write.
    pub fn rule_is_eligible(template: &RuleRequest) -> bool {
        let req_type = template.req_type.to_lowercase();
        if !req_type.is_empty() && req_type != HTTP_TYPE {
            return false;
        }
        let method = template.method_or_get();
        let is_get_or_post = method == "GET" || method == "POST";
        is_get_or_post && template.headers.is_empty() && template.body.is_empty()
    }

    /// Return the cached pair for an eligible rule, if present.
    pub fn lookup(&self, template: &RuleRequest, target: &str) -> Option<CacheEntry> {
        if target.is_empty() || !Self::rule_is_eligible(template) {
            return None;
        }

        let key = cache_key(target, &template.method_or_get(), template.follow_redirects);
        let entry = self.map.read().get(&key).cloned();
        if entry.is_some() {
            debug!(key = %key, "cache hit");
        }
        entry
    }

    /// Store a completed exchange iff the concrete request is a body-less
    /// GET/POST. Replaces any prior entry for the same key.
    pub fn update(
        &self,
        request: &Arc<Request>,
        response: &Arc<Response>,
        target: &str,
        follow_redirects: bool,
    ) {
        if target.is_empty() {
            return;
        }
        let method = request.method.to_uppercase();
        let is_get_or_post = method == "GET" || method == "POST";
        if !is_get_or_post || !request.body.is_empty() {
            return;
        }

        let key = cache_key(target, &method, follow_redirects);
        debug!(key = %key, "cache store");
        self.map.write().insert(
            key,
            CacheEntry {
                request: Arc::clone(request),
                response: Arc::clone(response),
            },
        );
    }

    /// Drop every entry belonging to `target`, across the method and
    /// redirect-flag axes. Called when a target's pipeline finishes.
    pub fn clear_target_url(&self, target: &str) {
        if target.is_empty() {
            return;
        }

        let mut keys = Vec::with_capacity(CACHE_METHODS.len() * 2);
        for method in CACHE_METHODS {
            for follow in [true, false] {
                keys.push(cache_key(target, method, follow));
            }
        }

        let mut map = self.map.write();
        let mut removed = 0;
        for key in keys {
            if map.remove(&key).is_some() {
                removed += 1;
            }
        }
        drop(map);

        if removed > 0 {
            debug!(target = target, removed = removed, "cleared target cache");
        }
    }

    pub fn clear_all(&self) {
        self.map.write().clear();
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}
