// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;

use tunniste_scanner::cli::{Cli, BANNER};
use tunniste_scanner::runner::Scanner;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    print!("\x1b[92m{}\x1b[0m", BANNER);
    println!("        Web Service Fingerprinting Engine");
    println!();

    let options = match cli.into_options() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("\x1b[91m[!] {}\x1b[0m", message);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("\x1b[91m[!] failed to build runtime: {}\x1b[0m", err);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(options)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\x1b[91m[!] {}\x1b[0m", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(options: tunniste_scanner::types::ScanOptions) -> Result<()> {
    let scanner = Scanner::new(options)?;
    let summary = scanner.run().await?;

    info!(
        "matched: {}, unmatched: {}, rule tasks: {} (completed {}, failed {})",
        summary.matched_targets,
        summary.unmatched_targets,
        summary.pool.total_tasks,
        summary.pool.completed_tasks,
        summary.pool.failed_tasks,
    );

    Ok(())
}
