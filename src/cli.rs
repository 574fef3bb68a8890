// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Command-line surface of the scanner binary.

use clap::Parser;

use crate::types::ScanOptions;

/// Tunniste - Web Service Fingerprinting Engine
#[derive(Debug, Parser)]
#[command(name = "tunniste")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version)]
#[command(about = "Concurrent web-service fingerprinting. Fast, rule-driven, Rust.", long_about = None)]
pub struct Cli {
    /// Target URL or host[:port]; repeatable, comma-separated lists accepted
    #[arg(short = 'u', long = "url")]
    pub url: Vec<String>,

    /// File with one target per line
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// URL worker count
    #[arg(short = 't', long = "threads", default_value_t = 10)]
    pub threads: usize,

    /// Rule worker count (clamped to 100..=5000)
    #[arg(long = "rule-threads", default_value_t = 500)]
    pub rule_threads: usize,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = 5)]
    pub timeout: i64,

    /// Output file; the extension picks the format (.txt / .csv / .json)
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Force JSON output regardless of the file extension
    #[arg(long = "json")]
    pub json: bool,

    /// Unix-domain-socket path broadcasting one JSON line per target
    #[arg(long = "sock-output")]
    pub sock_output: Option<String>,

    /// HTTP or SOCKS5 proxy URL
    #[arg(long = "proxy")]
    pub proxy: Option<String>,

    /// Single rule file to load instead of the embedded library
    #[arg(short = 'p', long = "rule-file")]
    pub rule_file: Option<String>,

    /// Rule directory, walked recursively for .yaml/.yml
    #[arg(long = "pf", alias = "rule-dir")]
    pub rule_dir: Option<String>,

    /// Verbose logging
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Validate and convert to scan options.
    pub fn into_options(self) -> Result<ScanOptions, String> {
        if self.url.is_empty() && self.file.as_deref().map_or(true, str::is_empty) {
            return Err("either -u/--url or -f/--file is required".to_string());
        }

        Ok(ScanOptions {
            targets: self.url,
            targets_file: self.file,
            threads: self.threads,
            rule_threads: self.rule_threads,
            proxy: self.proxy.unwrap_or_default(),
            timeout: self.timeout,
            output: self.output,
            json_output: self.json,
            sock_output: self.sock_output,
            rule_file: self.rule_file,
            rule_dir: self.rule_dir,
            debug: self.debug,
        })
    }
}

pub const BANNER: &str = r#"
   __                    _      __
  / /___  ______  ____  (_)____/ /____
 / __/ / / / __ \/ __ \/ / ___/ __/ _ \
/ /_/ /_/ / / / / / / / (__  ) /_/  __/
\__/\__,_/_/ /_/_/ /_/_/____/\__/\___/
"#;
