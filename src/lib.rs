// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - Web Service Fingerprinting Engine
 * Rule-driven service classification over a two-tier worker pipeline
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod cache;
pub mod cli;
pub mod errors;
pub mod expr;
pub mod matcher;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod proto;
pub mod retry;
pub mod rules;
pub mod runner;
pub mod scheduler;
pub mod server_info;
pub mod title;
pub mod types;
pub mod wappalyzer;

pub use errors::{ScannerError, ScannerResult};
pub use pipeline::get_base_info;
pub use runner::{wappalyzer_scan, ScanSummary, Scanner};
pub use types::{FingerMatch, ScanOptions, TargetResult};

/// Matched fingerprints of a finished target.
pub fn get_finger_matches(result: &TargetResult) -> &[FingerMatch] {
    &result.matches
}
