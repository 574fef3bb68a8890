// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scan progress bar; ticks once per finished target.

use indicatif::{ProgressBar, ProgressStyle};

pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .expect("static template")
            .progress_chars("=>-"),
    );
    pb.set_message("fingerprinting");
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_counts() {
        let pb = create_progress_bar(3);
        pb.inc(1);
        pb.inc(1);
        assert_eq!(pb.position(), 2);
        pb.finish();
    }
}
