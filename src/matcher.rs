// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Fingerprint evaluation: one `Finger` against one target.
//!
//! Sub-rules run strictly in source order; every network or expression
//! failure stays local to its rule key (recorded `false`) and never aborts
//! the document.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::TargetCache;
use crate::errors::ScannerResult;
use crate::expr::{evaluate_capped, Evaluator, Value};
use crate::probe;
use crate::proto::{Request, Response, Reverse, UrlRecord};
use crate::rules::model::Finger;
use crate::types::{BaseInfo, FingerMatch};

/// Evaluate `finger` against `target`, consulting and populating the
/// per-target `cache`.
pub async fn evaluate_finger(
    finger: &Arc<Finger>,
    target: &str,
    base_info: &BaseInfo,
    cache: &TargetCache,
    proxy: &str,
    timeout: Duration,
) -> ScannerResult<FingerMatch> {
    debug!(finger = %finger.id, target = target, "evaluating fingerprint");

    let mut env = Evaluator::new();
    preload_environment(&mut env, target, base_info);

    // Rule-local bindings, then payloads, in declared order.
    apply_bindings(&mut env, &finger.set).await;
    apply_bindings(&mut env, &finger.payloads.payloads).await;

    for entry in &finger.rules {
        let key = entry.key.as_str();
        let rule = &entry.rule;

        if rule.before_sleep > 0 {
            tokio::time::sleep(Duration::from_secs(rule.before_sleep)).await;
        }

        // Cache first; cache-ineligible rules always hit the network.
        if let Some(hit) = cache.lookup(&rule.request, target) {
            env.set_var("request", Value::Request(hit.request));
            env.set_var("response", Value::Response(hit.response));
        } else {
            match probe::dispatch_rule(target, &rule.request, &mut env, proxy, timeout).await {
                Ok((request, response)) => {
                    cache.update(&request, &response, target, rule.request.follow_redirects);
                }
                Err(err) => {
                    debug!(finger = %finger.id, rule = key, error = %err, "probe failed, rule is false");
                    env.record_rule_result(key, false);
                    continue;
                }
            }
        }

        let rule_result = match evaluate_capped(&env, &rule.expression).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(err) => {
                debug!(finger = %finger.id, rule = key, error = %err, "expression failed, rule is false");
                false
            }
        };
        env.record_rule_result(key, rule_result);

        // Post-evaluation bindings extend the environment for later rules.
        apply_bindings(&mut env, &rule.output).await;

        if rule.stop_if_match && rule_result {
            break;
        }
        if rule.stop_if_mismatch && !rule_result {
            break;
        }
    }

    let result = match evaluate_capped(&env, &finger.expression).await {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(err) => {
            debug!(finger = %finger.id, error = %err, "combining expression failed");
            false
        }
    };

    let request = match env.get_var("request") {
        Some(Value::Request(req)) => Some(Arc::clone(req)),
        _ => None,
    };
    let response = match env.get_var("response") {
        Some(Value::Response(resp)) => Some(Arc::clone(resp)),
        _ => None,
    };

    Ok(FingerMatch {
        finger: Arc::clone(finger),
        result,
        request,
        response,
    })
}

/// Fixed top-level bindings: a synthesized GET request, the baseline
/// response facts, the page title and the server record.
fn preload_environment(env: &mut Evaluator, target: &str, base_info: &BaseInfo) {
    let url_record = Url::parse(target)
        .map(|u| UrlRecord::from_url(&u))
        .unwrap_or_default();

    let request = Request {
        method: "GET".to_string(),
        url: url_record.clone(),
        ..Default::default()
    };

    let response = Response {
        status: base_info.status_code,
        url: url_record,
        icon_hash: "0".to_string(),
        ..Default::default()
    };

    env.set_var("request", Value::Request(Arc::new(request)));
    env.set_var("response", Value::Response(Arc::new(response)));
    env.set_var("title", Value::String(base_info.title.clone()));

    let mut server = HashMap::new();
    server.insert(
        "original_server".to_string(),
        base_info.server.original_server.clone(),
    );
    server.insert("server_type".to_string(), base_info.server.server_type.clone());
    server.insert("version".to_string(), base_info.server.version.clone());
    env.set_var("server", Value::Map(server));
}

/// Evaluate ordered `(name, expression)` bindings. `newReverse()` and
/// `newJNDI()` yield out-of-band probe records instead of evaluating.
async fn apply_bindings(env: &mut Evaluator, bindings: &[(String, String)]) {
    for (name, expression) in bindings {
        let trimmed = expression.trim();
        if trimmed.starts_with("newReverse(") || trimmed.starts_with("newJNDI(") {
            env.set_var(name, Value::Reverse(Arc::new(Reverse::default())));
            continue;
        }

        match evaluate_capped(env, trimmed).await {
            Ok(value) => env.set_var(name, value),
            Err(err) => {
                debug!(binding = %name, error = %err, "binding expression failed, skipped");
            }
        }
    }
}
