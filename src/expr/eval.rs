// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Expression evaluation against a variable environment.
//!
//! An [`Evaluator`] owns the environment for one (target, finger) pair:
//! the fixed bindings (`request`, `response`, `title`, `server`), the
//! rule-local names from `set`/`payloads`/`output`, and the booleans
//! recorded for finished sub-rules (exposed as `r0()` style calls).
//! Instances are never shared across concurrent evaluations.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::errors::ExpressionError;
use crate::expr::functions::{call_function, call_method};
use crate::expr::parser::{compile, BinOp, Expr};
use crate::expr::value::Value;

/// Hard cap for a single expression evaluation.
pub const EVAL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    vars: HashMap<String, Value>,
    rule_results: HashMap<String, bool>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Record the boolean for a finished sub-rule; later expressions see it
    /// as a zero-argument function under the rule key.
    pub fn record_rule_result(&mut self, key: &str, result: bool) {
        self.rule_results.insert(key.to_string(), result);
    }

    pub fn rule_result(&self, key: &str) -> Option<bool> {
        self.rule_results.get(key).copied()
    }

    /// Compile and evaluate `source` under `deadline`.
    pub fn eval_source(
        &self,
        source: &str,
        deadline: Instant,
    ) -> Result<Value, ExpressionError> {
        let ast = compile(source)?;
        self.eval(&ast, deadline)
    }

    pub fn eval(&self, expr: &Expr, deadline: Instant) -> Result<Value, ExpressionError> {
        if Instant::now() >= deadline {
            return Err(ExpressionError::Timeout(EVAL_TIMEOUT));
        }

        match expr {
            Expr::Literal(lit) => Ok(lit.to_value()),
            Expr::Ident(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| ExpressionError::UnknownIdentifier(name.clone())),
            Expr::Not(inner) => {
                let v = self.eval(inner, deadline)?;
                Ok(Value::Bool(!v.as_bool()?))
            }
            Expr::Member(recv, name) => {
                let value = self.eval(recv, deadline)?;
                member(&value, name)
            }
            Expr::Index(recv, index) => {
                let value = self.eval(recv, deadline)?;
                let key = self.eval(index, deadline)?;
                match value {
                    Value::Map(m) => {
                        let k = key.as_str()?;
                        Ok(Value::String(m.get(k).cloned().unwrap_or_default()))
                    }
                    other => Err(ExpressionError::TypeMismatch {
                        expected: "map".into(),
                        got: other.type_name().into(),
                    }),
                }
            }
            Expr::Call(name, args) => {
                // Rule keys shadow the function library.
                if args.is_empty() {
                    if let Some(result) = self.rule_result(name) {
                        return Ok(Value::Bool(result));
                    }
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, deadline)?);
                }
                call_function(name, values, deadline)
            }
            Expr::Method(recv, name, args) => {
                let receiver = self.eval(recv, deadline)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, deadline)?);
                }
                call_method(&receiver, name, values)
            }
            Expr::Binary(op, left, right) => self.eval_binary(op, left, right, deadline),
        }
    }

    fn eval_binary(
        &self,
        op: &BinOp,
        left: &Expr,
        right: &Expr,
        deadline: Instant,
    ) -> Result<Value, ExpressionError> {
        // Short-circuit forms first.
        match op {
            BinOp::And => {
                if !self.eval(left, deadline)?.as_bool()? {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval(right, deadline)?.as_bool()?));
            }
            BinOp::Or => {
                if self.eval(left, deadline)?.as_bool()? {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval(right, deadline)?.as_bool()?));
            }
            _ => {}
        }

        let lhs = self.eval(left, deadline)?;
        let rhs = self.eval(right, deadline)?;

        match op {
            BinOp::Eq => Ok(Value::Bool(lhs.loose_eq(&rhs)?)),
            BinOp::Ne => Ok(Value::Bool(!lhs.loose_eq(&rhs)?)),
            BinOp::Lt => Ok(Value::Bool(lhs.as_int()? < rhs.as_int()?)),
            BinOp::Le => Ok(Value::Bool(lhs.as_int()? <= rhs.as_int()?)),
            BinOp::Gt => Ok(Value::Bool(lhs.as_int()? > rhs.as_int()?)),
            BinOp::Ge => Ok(Value::Bool(lhs.as_int()? >= rhs.as_int()?)),
            BinOp::In => match (&lhs, &rhs) {
                // substring test on strings, key test on maps
                (Value::String(needle), Value::String(hay)) => {
                    Ok(Value::Bool(hay.contains(needle.as_str())))
                }
                (Value::String(key), Value::Map(map)) => {
                    Ok(Value::Bool(map.contains_key(key.as_str())))
                }
                (Value::Bytes(needle), Value::Bytes(hay)) => Ok(Value::Bool(
                    hay.windows(needle.len().max(1)).any(|w| w == &needle[..]),
                )),
                (l, r) => Err(ExpressionError::TypeMismatch {
                    expected: "string in string|map".into(),
                    got: format!("{} in {}", l.type_name(), r.type_name()),
                }),
            },
            BinOp::Add => match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (Value::String(a), Value::String(b)) => {
                    Ok(Value::String(format!("{}{}", a, b)))
                }
                (Value::Bytes(a), Value::Bytes(b)) => {
                    let mut out = a.clone();
                    out.extend_from_slice(b);
                    Ok(Value::Bytes(out))
                }
                (l, r) => Err(ExpressionError::TypeMismatch {
                    expected: l.type_name().into(),
                    got: r.type_name().into(),
                }),
            },
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }
}

fn member(value: &Value, name: &str) -> Result<Value, ExpressionError> {
    match value {
        Value::Request(req) => match name {
            "method" => Ok(Value::String(req.method.clone())),
            "url" => Ok(Value::Url(req.url.clone())),
            "headers" => Ok(Value::Map(req.headers.clone())),
            "content_type" => Ok(Value::String(req.content_type.clone())),
            "body" => Ok(Value::Bytes(req.body.clone())),
            "raw" => Ok(Value::Bytes(req.raw.clone())),
            "raw_header" => Ok(Value::Bytes(req.raw_header.clone())),
            _ => Err(unknown_member("request", name)),
        },
        Value::Response(resp) => match name {
            "status" => Ok(Value::Int(resp.status)),
            "url" => Ok(Value::Url(resp.url.clone())),
            "headers" => Ok(Value::Map(resp.headers.clone())),
            "content_type" => Ok(Value::String(resp.content_type.clone())),
            "body" => Ok(Value::Bytes(resp.body.clone())),
            "raw" => Ok(Value::Bytes(resp.raw.clone())),
            "raw_header" => Ok(Value::Bytes(resp.raw_header.clone())),
            "latency" => Ok(Value::Int(resp.latency)),
            "icon_hash" => Ok(Value::String(resp.icon_hash.clone())),
            _ => Err(unknown_member("response", name)),
        },
        Value::Url(u) => match name {
            "scheme" => Ok(Value::String(u.scheme.clone())),
            "host" => Ok(Value::String(u.host.clone())),
            "port" => Ok(Value::String(u.port.clone())),
            "domain" => Ok(Value::String(u.domain.clone())),
            "path" => Ok(Value::String(u.path.clone())),
            "query" => Ok(Value::String(u.query.clone())),
            "fragment" => Ok(Value::String(u.fragment.clone())),
            _ => Err(unknown_member("url", name)),
        },
        Value::Reverse(r) => match name {
            "url" => Ok(Value::String(r.url.clone())),
            "domain" => Ok(Value::String(r.domain.clone())),
            "ip" => Ok(Value::String(r.ip.clone())),
            _ => Err(unknown_member("reverse", name)),
        },
        other => Err(ExpressionError::TypeMismatch {
            expected: "record".into(),
            got: other.type_name().into(),
        }),
    }
}

fn unknown_member(record: &str, name: &str) -> ExpressionError {
    ExpressionError::Eval(format!("unknown member {}.{}", record, name))
}

/// Evaluate `source` with the fixed hard cap: the work runs on a blocking
/// thread and the caller is released at the deadline even if the thread is
/// stuck in a `sleep()`.
pub async fn evaluate_capped(
    evaluator: &Evaluator,
    source: &str,
) -> Result<Value, ExpressionError> {
    let env = evaluator.clone();
    let source = source.to_string();
    let handle = tokio::task::spawn_blocking(move || {
        let deadline = Instant::now() + EVAL_TIMEOUT;
        env.eval_source(&source, deadline)
    });

    match tokio::time::timeout(EVAL_TIMEOUT, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ExpressionError::Eval(format!(
            "evaluation task failed: {}",
            join_err
        ))),
        Err(_) => Err(ExpressionError::Timeout(EVAL_TIMEOUT)),
    }
}
