// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Sandboxed expression language for fingerprint rules.
//!
//! Rule predicates are C-family boolean expressions over a fixed variable
//! environment (`request`, `response`, `title`, `server` plus rule-local
//! bindings) with a domain function library. Evaluation is capped at 30
//! seconds per expression; on compile, evaluation or cap failure the caller
//! treats the sub-rule as `false`.

pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use eval::{evaluate_capped, Evaluator, EVAL_TIMEOUT};
pub use parser::compile;
pub use value::Value;
