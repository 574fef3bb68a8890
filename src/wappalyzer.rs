// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - Technology Inference
 * Maps (headers, body) to named technology lists for result enrichment
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Technology lists surfaced through the target result. Not authoritative;
/// fingerprint rules are the real classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Technologies {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub servers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub frameworks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub languages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub javascript: Vec<String>,
}

impl Technologies {
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
            && self.frameworks.is_empty()
            && self.languages.is_empty()
            && self.cms.is_empty()
            && self.javascript.is_empty()
    }

    /// Flat list for log lines and remarks.
    pub fn all(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.extend(self.servers.iter().cloned());
        out.extend(self.frameworks.iter().cloned());
        out.extend(self.languages.iter().cloned());
        out.extend(self.cms.iter().cloned());
        out.extend(self.javascript.iter().cloned());
        out
    }
}

#[derive(Clone, Copy)]
enum Category {
    Server,
    Framework,
    Language,
    Cms,
    JavaScript,
}

enum Probe {
    Header(&'static str, &'static str),
    Body(&'static str),
}

struct TechSignature {
    name: &'static str,
    category: Category,
    probe: Probe,
}

static SIGNATURES: Lazy<Vec<(TechSignature, Option<Regex>)>> = Lazy::new(|| {
    let raw = vec![
        TechSignature { name: "Nginx", category: Category::Server, probe: Probe::Header("server", r"(?i)nginx") },
        TechSignature { name: "Apache", category: Category::Server, probe: Probe::Header("server", r"(?i)apache") },
        TechSignature { name: "Microsoft-IIS", category: Category::Server, probe: Probe::Header("server", r"(?i)microsoft-iis") },
        TechSignature { name: "Tomcat", category: Category::Server, probe: Probe::Header("server", r"(?i)tomcat") },
        TechSignature { name: "OpenResty", category: Category::Server, probe: Probe::Header("server", r"(?i)openresty") },
        TechSignature { name: "LiteSpeed", category: Category::Server, probe: Probe::Header("server", r"(?i)litespeed") },
        TechSignature { name: "PHP", category: Category::Language, probe: Probe::Header("x-powered-by", r"(?i)php") },
        TechSignature { name: "ASP.NET", category: Category::Language, probe: Probe::Header("x-powered-by", r"(?i)asp\.net") },
        TechSignature { name: "Java", category: Category::Language, probe: Probe::Header("x-powered-by", r"(?i)(servlet|jsp|jboss)") },
        TechSignature { name: "Express", category: Category::Framework, probe: Probe::Header("x-powered-by", r"(?i)express") },
        TechSignature { name: "Spring", category: Category::Framework, probe: Probe::Header("x-application-context", r".") },
        TechSignature { name: "Laravel", category: Category::Framework, probe: Probe::Header("set-cookie", r"laravel_session") },
        TechSignature { name: "Django", category: Category::Framework, probe: Probe::Header("set-cookie", r"csrftoken") },
        TechSignature { name: "ThinkPHP", category: Category::Framework, probe: Probe::Header("x-powered-by", r"(?i)thinkphp") },
        TechSignature { name: "WordPress", category: Category::Cms, probe: Probe::Body(r"(?i)/wp-(content|includes)/") },
        TechSignature { name: "Joomla", category: Category::Cms, probe: Probe::Body(r#"(?i)<meta\s+name=["']generator["'][^>]*Joomla"#) },
        TechSignature { name: "Drupal", category: Category::Cms, probe: Probe::Body(r"(?i)(Drupal\.settings|/sites/all/)") },
        TechSignature { name: "jQuery", category: Category::JavaScript, probe: Probe::Body(r"jquery[.-][\w.]*js") },
        TechSignature { name: "Vue.js", category: Category::JavaScript, probe: Probe::Body(r"vue(?:\.runtime)?[.-][\w.]*js") },
        TechSignature { name: "React", category: Category::JavaScript, probe: Probe::Body(r"(?:react-dom|react)[.-][\w.]*\.js") },
        TechSignature { name: "Bootstrap", category: Category::JavaScript, probe: Probe::Body(r"bootstrap[.-][\w.]*(?:css|js)") },
    ];

    raw.into_iter()
        .map(|sig| {
            let pattern = match &sig.probe {
                Probe::Header(_, p) | Probe::Body(p) => Regex::new(p).ok(),
            };
            (sig, pattern)
        })
        .collect()
});

/// Classify a response. `headers` keys must be lowercased, as the response
/// records already guarantee.
pub fn analyze(headers: &HashMap<String, String>, body: &[u8]) -> Technologies {
    let body_text = String::from_utf8_lossy(body);
    let mut out = Technologies::default();

    for (sig, regex) in SIGNATURES.iter() {
        let Some(regex) = regex else { continue };
        let matched = match &sig.probe {
            Probe::Header(name, _) => headers
                .get(*name)
                .map(|value| regex.is_match(value))
                .unwrap_or(false),
            Probe::Body(_) => regex.is_match(&body_text),
        };
        if !matched {
            continue;
        }

        let bucket = match sig.category {
            Category::Server => &mut out.servers,
            Category::Framework => &mut out.frameworks,
            Category::Language => &mut out.languages,
            Category::Cms => &mut out.cms,
            Category::JavaScript => &mut out.javascript,
        };
        let name = sig.name.to_string();
        if !bucket.contains(&name) {
            bucket.push(name);
        }
    }

    out
}
