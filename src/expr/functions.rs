// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Domain function library for rule expressions.
//!
//! A leaf module: it knows the value types but nothing about the evaluator.
//! The evaluator dispatches free calls to [`call_function`] and method
//! calls to [`call_method`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Datelike, Duration as ChronoDuration, Local};
use md5::{Digest, Md5};
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::errors::ExpressionError;
use crate::expr::value::Value;
use crate::probe::icon::{mmh3_hash32, stand_base64};

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), ExpressionError> {
    if args.len() != expected {
        return Err(ExpressionError::Eval(format!(
            "{} expects {} argument(s), got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

/// Dispatch a free function call.
pub fn call_function(
    name: &str,
    args: Vec<Value>,
    deadline: Instant,
) -> Result<Value, ExpressionError> {
    match name {
        "icontains" => {
            arity(name, &args, 2)?;
            let hay = args[0].as_str()?.to_lowercase();
            let needle = args[1].as_str()?.to_lowercase();
            Ok(Value::Bool(hay.contains(&needle)))
        }
        "substr" => {
            arity(name, &args, 3)?;
            let s = args[0].as_str()?;
            let start = args[1].as_int()?.max(0) as usize;
            let len = args[2].as_int()?.max(0) as usize;
            let out: String = s.chars().skip(start).take(len).collect();
            Ok(Value::String(out))
        }
        "replaceAll" => {
            arity(name, &args, 3)?;
            let s = args[0].as_str()?;
            let from = args[1].as_str()?;
            let to = args[2].as_str()?;
            Ok(Value::String(s.replace(from, to)))
        }
        "printable" => {
            arity(name, &args, 1)?;
            let s = args[0].as_str()?;
            let out: String = s
                .chars()
                .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
                .collect();
            Ok(Value::String(out))
        }
        "toUintString" => {
            arity(name, &args, 2)?;
            let s = args[0].as_str()?;
            let n: i64 = s.trim().parse().map_err(|_| {
                ExpressionError::Eval(format!("toUintString: not an integer: {:?}", s))
            })?;
            let unsigned = (n as i32) as u32;
            Ok(Value::String(unsigned.to_string()))
        }
        "md5" => {
            arity(name, &args, 1)?;
            let mut hasher = Md5::new();
            hasher.update(args[0].as_bytes()?);
            Ok(Value::String(format!("{:x}", hasher.finalize())))
        }
        "base64" => {
            arity(name, &args, 1)?;
            Ok(Value::String(BASE64.encode(args[0].as_bytes()?)))
        }
        "base64Decode" => {
            arity(name, &args, 1)?;
            let decoded = BASE64
                .decode(args[0].as_bytes()?)
                .map_err(|e| ExpressionError::Eval(format!("base64Decode: {}", e)))?;
            Ok(Value::String(
                String::from_utf8_lossy(&decoded).into_owned(),
            ))
        }
        "urlencode" => {
            arity(name, &args, 1)?;
            let s = String::from_utf8_lossy(args[0].as_bytes()?).into_owned();
            Ok(Value::String(urlencoding::encode(&s).into_owned()))
        }
        "urldecode" => {
            arity(name, &args, 1)?;
            let s = String::from_utf8_lossy(args[0].as_bytes()?).into_owned();
            let decoded = urlencoding::decode(&s)
                .map_err(|e| ExpressionError::Eval(format!("urldecode: {}", e)))?;
            Ok(Value::String(decoded.into_owned()))
        }
        "hexdecode" => {
            arity(name, &args, 1)?;
            let decoded = hex::decode(args[0].as_str()?)
                .map_err(|e| ExpressionError::Eval(format!("hexdecode: {}", e)))?;
            Ok(Value::String(
                String::from_utf8_lossy(&decoded).into_owned(),
            ))
        }
        "faviconHash" => {
            arity(name, &args, 1)?;
            let data = args[0].as_bytes()?;
            Ok(Value::Int(mmh3_hash32(&stand_base64(data)) as i64))
        }
        "randomInt" => {
            arity(name, &args, 2)?;
            let lo = args[0].as_int()?;
            let hi = args[1].as_int()?;
            if lo > hi {
                return Err(ExpressionError::Eval("randomInt: empty range".into()));
            }
            Ok(Value::Int(rand::rng().random_range(lo..=hi)))
        }
        "randomLowercase" => {
            arity(name, &args, 1)?;
            let n = args[0].as_int()?.max(0) as usize;
            let mut rng = rand::rng();
            let out: String = (0..n)
                .map(|_| rng.random_range(b'a'..=b'z') as char)
                .collect();
            Ok(Value::String(out))
        }
        "sleep" => {
            arity(name, &args, 1)?;
            let ms = args[0].as_int()?.max(0) as u64;
            sleep_until(Duration::from_millis(ms), deadline)?;
            Ok(Value::Null)
        }
        "year" => Ok(Value::String(
            offset_date(&args)?.year().to_string(),
        )),
        "shortyear" => Ok(Value::String(format!(
            "{:02}",
            offset_date(&args)?.year() % 100
        ))),
        "month" => Ok(Value::String(format!("{:02}", offset_date(&args)?.month()))),
        "day" => Ok(Value::String(format!("{:02}", offset_date(&args)?.day()))),
        "timestamp_second" => {
            let dt = offset_date(&args)?;
            Ok(Value::String(dt.timestamp().to_string()))
        }
        other => Err(ExpressionError::UnknownFunction(other.to_string())),
    }
}

/// Dispatch an instance-method call on `receiver`.
pub fn call_method(
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, ExpressionError> {
    match name {
        "contains" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(
                receiver.as_str()?.contains(args[0].as_str()?),
            ))
        }
        "icontains" => {
            arity(name, &args, 1)?;
            let hay = receiver.as_str()?.to_lowercase();
            let needle = args[0].as_str()?.to_lowercase();
            Ok(Value::Bool(hay.contains(&needle)))
        }
        "startsWith" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(
                receiver.as_str()?.starts_with(args[0].as_str()?),
            ))
        }
        "endsWith" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(
                receiver.as_str()?.ends_with(args[0].as_str()?),
            ))
        }
        "bcontains" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(contains_bytes(
                receiver.as_bytes()?,
                args[0].as_bytes()?,
            )))
        }
        "ibcontains" => {
            arity(name, &args, 1)?;
            let hay = receiver.as_bytes()?.to_ascii_lowercase();
            let needle = args[0].as_bytes()?.to_ascii_lowercase();
            Ok(Value::Bool(contains_bytes(&hay, &needle)))
        }
        "bstartsWith" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(
                receiver.as_bytes()?.starts_with(args[0].as_bytes()?),
            ))
        }
        // Regex family: the receiver is the pattern.
        "matches" => {
            arity(name, &args, 1)?;
            let re = compile_regex(receiver.as_str()?)?;
            Ok(Value::Bool(re.is_match(args[0].as_str()?)))
        }
        "bmatches" => {
            arity(name, &args, 1)?;
            let re = compile_regex(receiver.as_str()?)?;
            let hay = String::from_utf8_lossy(args[0].as_bytes()?);
            Ok(Value::Bool(re.is_match(&hay)))
        }
        "submatch" => {
            arity(name, &args, 1)?;
            let re = compile_regex(receiver.as_str()?)?;
            Ok(Value::Map(named_captures(&re, args[0].as_str()?)))
        }
        "bsubmatch" => {
            arity(name, &args, 1)?;
            let re = compile_regex(receiver.as_str()?)?;
            let hay = String::from_utf8_lossy(args[0].as_bytes()?).into_owned();
            Ok(Value::Map(named_captures(&re, &hay)))
        }
        "wait" | "jndi" => {
            arity(name, &args, 1)?;
            match receiver {
                Value::Reverse(_) => {
                    // No out-of-band callback stack configured; both probes fail closed.
                    debug!(probe = name, "reverse callback stack absent, resolving false");
                    Ok(Value::Bool(false))
                }
                other => Err(ExpressionError::TypeMismatch {
                    expected: "reverse".into(),
                    got: other.type_name().into(),
                }),
            }
        }
        other => Err(ExpressionError::UnknownFunction(format!(
            "{}.{}",
            receiver.type_name(),
            other
        ))),
    }
}

fn contains_bytes(hay: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    hay.windows(needle.len()).any(|w| w == needle)
}

fn compile_regex(pattern: &str) -> Result<Regex, ExpressionError> {
    Regex::new(pattern).map_err(|e| ExpressionError::Eval(format!("bad pattern: {}", e)))
}

fn named_captures(re: &Regex, hay: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    if let Some(caps) = re.captures(hay) {
        for name in re.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                out.insert(name.to_string(), m.as_str().to_string());
            }
        }
        // numbered groups under their index, group 0 excluded
        for (i, m) in caps.iter().enumerate().skip(1) {
            if let Some(m) = m {
                out.entry(i.to_string())
                    .or_insert_with(|| m.as_str().to_string());
            }
        }
    }
    out
}

/// Sleep in slices so a long `sleep()` cannot outlive the evaluation cap.
fn sleep_until(total: Duration, deadline: Instant) -> Result<(), ExpressionError> {
    let slice = Duration::from_millis(100);
    let end = Instant::now() + total;
    loop {
        let now = Instant::now();
        if now >= end {
            return Ok(());
        }
        if now >= deadline {
            return Err(ExpressionError::Timeout(Duration::from_secs(30)));
        }
        std::thread::sleep(slice.min(end - now).min(deadline - now));
    }
}

fn offset_date(args: &[Value]) -> Result<chrono::DateTime<Local>, ExpressionError> {
    let days = match args.first() {
        Some(v) => v.as_int()?,
        None => 0,
    };
    Ok(Local::now() + ChronoDuration::days(days))
}
