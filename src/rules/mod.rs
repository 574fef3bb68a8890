// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Declarative fingerprint rules: model, loader, embedded default library.

pub mod embedded;
pub mod loader;
pub mod model;

pub use loader::{load_fingerprints, RuleSource};
pub use model::{Finger, Rule, RuleEntry, RuleRequest};
