// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! `Server` header distillation.
//!
//! `Apache/2.4.41 (Ubuntu)` becomes type `Apache`, version `2.4.41`;
//! parenthetical annotations and marketing glue ("powered by",
//! "running on") are stripped; when several products are advertised their
//! names concatenate and the first versioned token wins the version slot.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ServerInfo;

static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").expect("static regex"));

/// Filler words that connect product names without naming one.
const MODIFIER_WORDS: &[&str] = &["powered", "by", "running", "on", "via", "with"];

/// Parse a raw `Server` header value into a [`ServerInfo`].
pub fn parse_server_header(value: &str) -> ServerInfo {
    if value.trim().is_empty() {
        return ServerInfo::empty();
    }

    let cleaned = clean_server_string(value);
    let (server_type, version) = split_type_version(&cleaned);

    ServerInfo::new(value, &server_type, &version)
}

/// Strip parentheticals and modifier words, collapse whitespace.
fn clean_server_string(value: &str) -> String {
    let without_parens = PAREN_RE.replace_all(value, " ");
    without_parens
        .split_whitespace()
        .filter(|tok| !MODIFIER_WORDS.contains(&tok.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `name/version` tokens contribute their name to the type; the first
/// version encountered becomes the version.
fn split_type_version(cleaned: &str) -> (String, String) {
    let mut names = Vec::new();
    let mut version = String::new();

    for token in cleaned.split_whitespace() {
        match token.split_once('/') {
            Some((name, ver)) => {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
                if version.is_empty() && !ver.is_empty() {
                    version = ver.to_string();
                }
            }
            None => names.push(token.to_string()),
        }
    }

    (names.join(" "), version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_header() {
        let info = parse_server_header("");
        assert_eq!(info, ServerInfo::empty());
    }

    #[test]
    fn test_plain_name() {
        let info = parse_server_header("Apache");
        assert_eq!(info.server_type, "Apache");
        assert_eq!(info.version, "");
        assert_eq!(info.original_server, "Apache");
    }

    #[test]
    fn test_name_with_version() {
        let info = parse_server_header("nginx/1.18.0");
        assert_eq!(info.server_type, "nginx");
        assert_eq!(info.version, "1.18.0");
    }

    #[test]
    fn test_parenthetical_stripped() {
        let info = parse_server_header("Apache/2.4.41 (Ubuntu)");
        assert_eq!(info.server_type, "Apache");
        assert_eq!(info.version, "2.4.41");
        assert_eq!(info.original_server, "Apache/2.4.41 (Ubuntu)");
    }

    #[test]
    fn test_modifier_words_stripped() {
        let info = parse_server_header("powered by Apache");
        assert_eq!(info.server_type, "Apache");
        assert_eq!(info.version, "");
    }

    #[test]
    fn test_multiple_products() {
        let info = parse_server_header("Microsoft-IIS/10.0 powered by ASP.NET (Windows Server 2019)");
        assert_eq!(info.server_type, "Microsoft-IIS ASP.NET");
        assert_eq!(info.version, "10.0");
    }

    #[test]
    fn test_clean_keeps_non_modifier_tokens() {
        assert_eq!(
            clean_server_string("powered by Apache running on CentOS"),
            "Apache CentOS"
        );
    }

    #[test]
    fn test_first_version_wins() {
        let info = parse_server_header("Apache/2.4.41 PHP/7.4.3");
        assert_eq!(info.server_type, "Apache PHP");
        assert_eq!(info.version, "2.4.41");
    }
}
