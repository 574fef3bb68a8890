// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Rule library loading.
//!
//! Priority: single file, then directory (walked recursively for
//! `.yaml`/`.yml`), then the embedded default library. A malformed
//! document inside a directory or the embedded blob is skipped with a
//! debug log; an unreadable directory subtree is fatal.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{RuleError, ScannerResult};
use crate::rules::embedded;
use crate::rules::model::Finger;

/// Where rules come from for one scan run.
#[derive(Debug, Clone, Default)]
pub struct RuleSource {
    pub rule_file: Option<String>,
    pub rule_dir: Option<String>,
}

pub fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Load the fingerprint library for a scan run.
pub fn load_fingerprints(source: &RuleSource) -> ScannerResult<Vec<Arc<Finger>>> {
    if let Some(file) = source.rule_file.as_deref().filter(|s| !s.is_empty()) {
        info!(file = file, "loading rule file");
        return load_single_file(file);
    }

    if let Some(dir) = source.rule_dir.as_deref().filter(|s| !s.is_empty()) {
        info!(dir = dir, "loading rule directory");
        return load_directory(dir);
    }

    info!("using embedded rule library");
    load_embedded()
}

fn load_single_file(path: &str) -> ScannerResult<Vec<Arc<Finger>>> {
    let path_ref = Path::new(path);
    if !is_yaml_file(path_ref) {
        return Err(RuleError::MalformedDocument {
            path: path.to_string(),
            reason: "not a .yaml/.yml file".into(),
        }
        .into());
    }

    let contents = fs::read_to_string(path_ref).map_err(|e| RuleError::MalformedDocument {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let finger: Finger =
        serde_yaml::from_str(&contents).map_err(|e| RuleError::MalformedDocument {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    Ok(vec![Arc::new(finger)])
}

fn load_directory(dir: &str) -> ScannerResult<Vec<Arc<Finger>>> {
    let mut fingers = Vec::new();
    walk_directory(Path::new(dir), &mut fingers)?;

    if fingers.is_empty() {
        return Err(RuleError::Empty {
            source_path: dir.to_string(),
        }
        .into());
    }

    Ok(fingers)
}

fn walk_directory(dir: &Path, fingers: &mut Vec<Arc<Finger>>) -> ScannerResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| RuleError::WalkFailed {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut paths: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RuleError::WalkFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            walk_directory(&path, fingers)?;
        } else if is_yaml_file(&path) {
            match fs::read_to_string(&path) {
                Ok(contents) => match serde_yaml::from_str::<Finger>(&contents) {
                    Ok(finger) => fingers.push(Arc::new(finger)),
                    Err(err) => {
                        debug!(path = %path.display(), error = %err, "skipping malformed rule document");
                    }
                },
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unreadable rule file");
                }
            }
        }
    }

    Ok(())
}

fn load_embedded() -> ScannerResult<Vec<Arc<Finger>>> {
    let mut fingers = Vec::new();
    for (path, contents) in embedded::walk() {
        match serde_yaml::from_str::<Finger>(contents) {
            Ok(finger) => fingers.push(Arc::new(finger)),
            Err(err) => {
                debug!(path = path, error = %err, "skipping malformed embedded rule");
            }
        }
    }

    if fingers.is_empty() {
        return Err(RuleError::Empty {
            source_path: "embedded".into(),
        }
        .into());
    }

    Ok(fingers)
}
