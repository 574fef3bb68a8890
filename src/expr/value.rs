// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Dynamically-typed values flowing through rule expressions.
//!
//! The environment is `name -> Value`; records from `proto` are shared
//! behind `Arc` so binding them into an environment never copies bodies.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ExpressionError;
use crate::proto::{Request, Response, Reverse, UrlRecord};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Bytes(Vec<u8>),
    Map(HashMap<String, String>),
    Url(UrlRecord),
    Request(Arc<Request>),
    Response(Arc<Response>),
    Reverse(Arc<Reverse>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Map(_) => "map",
            Value::Url(_) => "url",
            Value::Request(_) => "request",
            Value::Response(_) => "response",
            Value::Reverse(_) => "reverse",
        }
    }

    pub fn as_bool(&self) -> Result<bool, ExpressionError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ExpressionError::TypeMismatch {
                expected: "bool".into(),
                got: other.type_name().into(),
            }),
        }
    }

    pub fn as_int(&self) -> Result<i64, ExpressionError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(ExpressionError::TypeMismatch {
                expected: "int".into(),
                got: other.type_name().into(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str, ExpressionError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(ExpressionError::TypeMismatch {
                expected: "string".into(),
                got: other.type_name().into(),
            }),
        }
    }

    /// Byte view shared by `bytes` and `string` operands.
    pub fn as_bytes(&self) -> Result<&[u8], ExpressionError> {
        match self {
            Value::Bytes(b) => Ok(b),
            Value::String(s) => Ok(s.as_bytes()),
            other => Err(ExpressionError::TypeMismatch {
                expected: "bytes".into(),
                got: other.type_name().into(),
            }),
        }
    }

    /// Render for `{{name}}` template substitution.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Map(m) => {
                let mut pairs: Vec<_> = m.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                pairs.sort();
                pairs.join("&")
            }
            Value::Url(u) => format!("{}://{}{}", u.scheme, u.host, u.path),
            Value::Request(_) => "[request]".into(),
            Value::Response(_) => "[response]".into(),
            Value::Reverse(r) => r.url.clone(),
        }
    }

    /// Structural equality used by `==` / `!=`. String and bytes operands
    /// compare byte-wise so `response.body == "x"` behaves as expected.
    pub fn loose_eq(&self, other: &Value) -> Result<bool, ExpressionError> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(true),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(a == b),
            (Value::String(a), Value::Bytes(b)) | (Value::Bytes(b), Value::String(a)) => {
                Ok(a.as_bytes() == b.as_slice())
            }
            (Value::Url(a), Value::Url(b)) => Ok(a == b),
            (a, b) => Err(ExpressionError::TypeMismatch {
                expected: a.type_name().into(),
                got: b.type_name().into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_eq_string_bytes() {
        let s = Value::String("abc".into());
        let b = Value::Bytes(b"abc".to_vec());
        assert!(s.loose_eq(&b).unwrap());
        assert!(b.loose_eq(&s).unwrap());
    }

    #[test]
    fn test_loose_eq_type_mismatch() {
        let s = Value::String("1".into());
        let i = Value::Int(1);
        assert!(s.loose_eq(&i).is_err());
    }

    #[test]
    fn test_render_int() {
        assert_eq!(Value::Int(42).render(), "42");
    }

    #[test]
    fn test_as_bytes_accepts_string() {
        let s = Value::String("xy".into());
        assert_eq!(s.as_bytes().unwrap(), b"xy");
    }
}
