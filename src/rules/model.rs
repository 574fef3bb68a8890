// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Declarative fingerprint rule documents.
//!
//! One YAML document yields one [`Finger`]. Rule order inside a document is
//! significant: the combining `expression` refers to rule keys (`r0`, `r1`)
//! as zero-argument functions and sub-rules execute in source order, so
//! `rules`, `set`, `payloads` and `output` all deserialize through ordered
//! mappings.

use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use std::collections::HashMap;

pub const HTTP_TYPE: &str = "http";
pub const TCP_TYPE: &str = "tcp";
pub const UDP_TYPE: &str = "udp";
pub const SSL_TYPE: &str = "ssl";
pub const GO_TYPE: &str = "go";

/// One fingerprint document, immutable after load.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Finger {
    #[serde(default)]
    pub id: String,

    /// Transport for the document as a whole; rules may override per request
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Ordered process-local bindings evaluated before any rule
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub set: Vec<(String, String)>,

    #[serde(default)]
    pub payloads: Payloads,

    /// Ordered `(key, rule)` pairs; source order drives execution
    #[serde(default, deserialize_with = "ordered_rules")]
    pub rules: Vec<RuleEntry>,

    /// Top-level boolean expression over the rule keys
    #[serde(default)]
    pub expression: String,

    #[serde(default)]
    pub info: Info,
}

fn default_transport() -> String {
    HTTP_TYPE.to_string()
}

impl Finger {
    /// True when at least one rule goes over HTTP(S).
    pub fn is_http_type(&self) -> bool {
        self.rules
            .iter()
            .any(|entry| entry.rule.request.req_type.is_empty()
                || entry.rule.request.req_type == HTTP_TYPE)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payloads {
    #[serde(default, rename = "continue")]
    pub continue_on_match: bool,

    #[serde(default, deserialize_with = "ordered_pairs")]
    pub payloads: Vec<(String, String)>,
}

/// A keyed rule, order-preserving.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub key: String,
    pub rule: Rule,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub request: RuleRequest,
    pub expression: String,
    #[serde(deserialize_with = "ordered_pairs")]
    pub output: Vec<(String, String)>,
    pub stop_if_match: bool,
    pub stop_if_mismatch: bool,
    /// Seconds to sleep before this rule's probe
    pub before_sleep: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleRequest {
    /// Transport: empty/`http`, `tcp`, `udp`, `ssl`, `go`
    #[serde(rename = "type")]
    pub req_type: String,

    /// tcp/udp target as host:port
    pub host: String,

    /// tcp/udp payload
    pub data: String,

    /// `raw` or `hex`
    #[serde(rename = "data-type")]
    pub data_type: String,

    /// tcp/udp read cap in bytes
    #[serde(rename = "read-size")]
    pub read_size: usize,

    /// tcp/udp read timeout in seconds
    #[serde(rename = "read-timeout")]
    pub read_timeout: u64,

    /// Verbatim request blob; bypasses header policy entirely
    pub raw: String,

    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,

    /// `true` (the default) follows redirects
    pub follow_redirects: bool,
}

impl Default for RuleRequest {
    fn default() -> Self {
        Self {
            req_type: String::new(),
            host: String::new(),
            data: String::new(),
            data_type: String::new(),
            read_size: 0,
            read_timeout: 0,
            raw: String::new(),
            method: String::new(),
            path: String::new(),
            headers: HashMap::new(),
            body: String::new(),
            follow_redirects: true,
        }
    }
}

impl RuleRequest {
    pub fn method_or_get(&self) -> String {
        if self.method.is_empty() {
            "GET".to_string()
        } else {
            self.method.to_uppercase()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Info {
    pub name: String,
    pub author: String,
    pub severity: String,
    pub verified: bool,
    pub description: String,
    pub reference: Vec<String>,
    pub affected: String,
    pub solutions: String,
    pub tags: String,
    pub classification: Classification,
    pub created: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Classification {
    #[serde(rename = "cvss-metrics")]
    pub cvss_metrics: String,
    #[serde(rename = "cvss-score")]
    pub cvss_score: f64,
    #[serde(rename = "cve-id")]
    pub cve_id: String,
    #[serde(rename = "cwe-id")]
    pub cwe_id: String,
}

/// Deserialize a YAML mapping into ordered `(name, scalar)` pairs.
fn ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
    let mut pairs = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = scalar_to_string(&key)
            .ok_or_else(|| D::Error::custom("mapping key must be a scalar"))?;
        let value = scalar_to_string(&value)
            .ok_or_else(|| D::Error::custom("mapping value must be a scalar"))?;
        pairs.push((key, value));
    }
    Ok(pairs)
}

/// Deserialize the `rules` mapping preserving document order.
fn ordered_rules<'de, D>(deserializer: D) -> Result<Vec<RuleEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
    let mut entries = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = scalar_to_string(&key)
            .ok_or_else(|| D::Error::custom("rule key must be a scalar"))?;
        let rule: Rule = serde_yaml::from_value(value).map_err(D::Error::custom)?;
        entries.push(RuleEntry { key, rule });
    }
    Ok(entries)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
id: nginx-detect
info:
  name: Nginx
  author: tunniste
  severity: info
  tags: webserver
set:
  rand: randomLowercase(8)
  num: 7
rules:
  r0:
    request:
      method: GET
      path: /
    expression: response.status == 200
  r1:
    request:
      method: GET
      path: /{{rand}}
    expression: response.status == 404
    stop_if_mismatch: true
expression: r0() && r1()
"#;

    #[test]
    fn test_parse_sample() {
        let finger: Finger = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(finger.id, "nginx-detect");
        assert_eq!(finger.transport, "http");
        assert_eq!(finger.info.name, "Nginx");
        assert_eq!(finger.expression, "r0() && r1()");
    }

    #[test]
    fn test_rules_preserve_source_order() {
        let finger: Finger = serde_yaml::from_str(SAMPLE).unwrap();
        let keys: Vec<_> = finger.rules.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["r0", "r1"]);
        assert!(finger.rules[1].rule.stop_if_mismatch);
    }

    #[test]
    fn test_set_preserves_order_and_stringifies() {
        let finger: Finger = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(
            finger.set,
            vec![
                ("rand".to_string(), "randomLowercase(8)".to_string()),
                ("num".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn test_follow_redirects_defaults_true() {
        let finger: Finger = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(finger.rules[0].rule.request.follow_redirects);

        let explicit: Finger = serde_yaml::from_str(
            r#"
id: x
rules:
  r0:
    request:
      method: GET
      path: /
      follow_redirects: false
    expression: "true"
expression: r0()
"#,
        )
        .unwrap();
        assert!(!explicit.rules[0].rule.request.follow_redirects);
    }

    #[test]
    fn test_is_http_type() {
        let finger: Finger = serde_yaml::from_str(SAMPLE).unwrap();
        assert!(finger.is_http_type());

        let tcp_only: Finger = serde_yaml::from_str(
            r#"
id: redis
transport: tcp
rules:
  r0:
    request:
      type: tcp
      host: "{{Hostname}}:6379"
      data: "PING\r\n"
    expression: response.raw.bcontains(b"PONG")
expression: r0()
"#,
        )
        .unwrap();
        assert!(!tcp_only.is_http_type());
    }

    #[test]
    fn test_method_or_get() {
        let req = RuleRequest::default();
        assert_eq!(req.method_or_get(), "GET");
        let req = RuleRequest {
            method: "post".into(),
            ..Default::default()
        };
        assert_eq!(req.method_or_get(), "POST");
    }

    #[test]
    fn test_malformed_document_is_error() {
        let result: Result<Finger, _> = serde_yaml::from_str("rules: [not, a, mapping]");
        assert!(result.is_err());
    }
}
