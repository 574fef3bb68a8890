// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Page title extraction.
//!
//! Order of precedence: `<title>` tag, then a plausible JavaScript
//! `document.title = (...)` assignment, then a `top.login.title` key found
//! in a referenced i18n JavaScript file.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title>(.*?)</title>").expect("static regex"));

static DOM_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)document\.title.*?=.*?\((.*?)\)").expect("static regex"));

static SCRIPT_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)type="text/javascript".*?src="(.*?)""#).expect("static regex"));

static I18N_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""top\.login\.title": "(.*?)","#).expect("static regex"));

/// Values that disqualify a `document.title` assignment from overriding the
/// tag title. A DOM title containing any of these substrings is an
/// un-rendered template, not a page name.
const INVALID_DOM_TITLES: &[&str] = &[
    "title", ".title", "top.", ".login", "=", "||", "''", "null",
];

/// Extract the page title from an HTML body.
pub fn extract_title(body: &str) -> String {
    let mut title = String::new();

    if let Some(caps) = TITLE_RE.captures(body) {
        title = clean_title(&caps[1]);
        debug!(title = %title, "matched <title> tag");
    }

    if let Some(caps) = DOM_TITLE_RE.captures(body) {
        let dom_title = caps[1].replace('"', "");
        let invalid = INVALID_DOM_TITLES
            .iter()
            .any(|tok| dom_title.contains(tok))
            || dom_title.to_lowercase().contains("null");
        if invalid {
            debug!(candidate = %dom_title, "discarding implausible document.title value");
        } else {
            debug!(title = %dom_title, "document.title override");
            title = dom_title;
        }
    }

    title
}

/// Find the URL of an i18n JavaScript file referenced by the page, if any.
pub fn find_i18n_script(page_url: &str, body: &str) -> Option<String> {
    let parsed = url::Url::parse(page_url).ok()?;
    let base_url = format!("{}://{}/", parsed.scheme(), parsed.host_str()?);
    let base_path = parsed.path().to_string();

    for caps in SCRIPT_SRC_RE.captures_iter(body) {
        let src = &caps[1];
        if !(src.ends_with(".js") && src.contains("i18n")) {
            continue;
        }
        let path = src.trim_start_matches('/');
        let url = if path.starts_with(base_path.trim_start_matches('/')) {
            format!("{}{}", base_url, path)
        } else {
            format!(
                "{}{}/{}",
                base_url,
                base_path.trim_start_matches('/').trim_end_matches('/'),
                path
            )
        };
        return Some(url);
    }
    None
}

/// Pull the login title out of a fetched i18n JavaScript body.
pub fn extract_i18n_title(js_body: &str) -> Option<String> {
    I18N_TITLE_RE
        .captures(js_body)
        .map(|caps| caps[1].to_string())
}

/// Collapse whitespace runs and strip control characters from a raw title.
fn clean_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.chars() {
        let c = match c {
            '\r' | '\n' | '\t' => ' ',
            c => c,
        };
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out.trim().to_string()
}
