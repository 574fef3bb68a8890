// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Embedded default rule library.
//!
//! A read-only, filesystem-like view of the `finger/` tree compiled into
//! the binary; [`walk`] iterates it the way the directory loader walks a
//! real tree.

/// `(virtual path, document)` pairs under the `finger/` root.
pub static EMBEDDED_RULES: &[(&str, &str)] = &[
    ("finger/apache.yaml", include_str!("../../finger/apache.yaml")),
    ("finger/grafana.yaml", include_str!("../../finger/grafana.yaml")),
    ("finger/iis.yaml", include_str!("../../finger/iis.yaml")),
    ("finger/jenkins.yaml", include_str!("../../finger/jenkins.yaml")),
    ("finger/nginx.yaml", include_str!("../../finger/nginx.yaml")),
    ("finger/redis.yaml", include_str!("../../finger/redis.yaml")),
    ("finger/thinkphp.yaml", include_str!("../../finger/thinkphp.yaml")),
    ("finger/tomcat.yaml", include_str!("../../finger/tomcat.yaml")),
    ("finger/weblogic.yaml", include_str!("../../finger/weblogic.yaml")),
    ("finger/wordpress.yaml", include_str!("../../finger/wordpress.yaml")),
];

/// Walk the embedded tree in path order.
pub fn walk() -> impl Iterator<Item = (&'static str, &'static str)> {
    EMBEDDED_RULES.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_rules_present() {
        assert!(EMBEDDED_RULES.len() >= 8);
    }

    #[test]
    fn test_walk_yields_yaml_paths() {
        for (path, contents) in walk() {
            assert!(path.starts_with("finger/"));
            assert!(path.ends_with(".yaml") || path.ends_with(".yml"));
            assert!(!contents.is_empty());
        }
    }
}
