// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Tokenizer for the rule expression language.

use crate::errors::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    True,
    False,
    In,
    AndAnd,
    OrOr,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

pub fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'(' => {
                tokens.push((i, Token::LParen));
                i += 1;
            }
            b')' => {
                tokens.push((i, Token::RParen));
                i += 1;
            }
            b'[' => {
                tokens.push((i, Token::LBracket));
                i += 1;
            }
            b']' => {
                tokens.push((i, Token::RBracket));
                i += 1;
            }
            b',' => {
                tokens.push((i, Token::Comma));
                i += 1;
            }
            b'.' => {
                tokens.push((i, Token::Dot));
                i += 1;
            }
            b'+' => {
                tokens.push((i, Token::Plus));
                i += 1;
            }
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push((i, Token::AndAnd));
                    i += 2;
                } else {
                    return Err(err(i, "expected '&&'"));
                }
            }
            b'|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push((i, Token::OrOr));
                    i += 2;
                } else {
                    return Err(err(i, "expected '||'"));
                }
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((i, Token::Eq));
                    i += 2;
                } else {
                    return Err(err(i, "expected '=='"));
                }
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((i, Token::Ne));
                    i += 2;
                } else {
                    tokens.push((i, Token::Not));
                    i += 1;
                }
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((i, Token::Le));
                    i += 2;
                } else {
                    tokens.push((i, Token::Lt));
                    i += 1;
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((i, Token::Ge));
                    i += 2;
                } else {
                    tokens.push((i, Token::Gt));
                    i += 1;
                }
            }
            b'"' | b'\'' => {
                let (raw, next) = read_string(input, i, c)?;
                tokens.push((i, Token::Str(String::from_utf8_lossy(&raw).into_owned())));
                i = next;
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text = &input[start..i];
                let n: i64 = text
                    .parse()
                    .map_err(|_| err(start, "integer literal out of range"))?;
                tokens.push((start, Token::Int(n)));
            }
            b'b' if matches!(bytes.get(i + 1), Some(b'"') | Some(b'\'')) => {
                let quote = bytes[i + 1];
                let (raw, next) = read_string(input, i + 1, quote)?;
                tokens.push((i, Token::Bytes(raw)));
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let word = &input[start..i];
                let token = match word {
                    "true" => Token::True,
                    "false" => Token::False,
                    "in" => Token::In,
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push((start, token));
            }
            _ => return Err(err(i, "unexpected character")),
        }
    }

    Ok(tokens)
}

/// Read a quoted literal as raw bytes so `\xNN` escapes above 0x7f survive
/// byte-accurate (`b"\x89PNG"` must be four bytes, not UTF-8).
fn read_string(input: &str, start: usize, quote: u8) -> Result<(Vec<u8>, usize), ExpressionError> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let esc = bytes
                    .get(i + 1)
                    .ok_or_else(|| err(i, "dangling escape"))?;
                match esc {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'\\' => out.push(b'\\'),
                    b'"' => out.push(b'"'),
                    b'\'' => out.push(b'\''),
                    b'0' => out.push(b'\0'),
                    b'x' => {
                        let hi = bytes.get(i + 2).ok_or_else(|| err(i, "bad \\x escape"))?;
                        let lo = bytes.get(i + 3).ok_or_else(|| err(i, "bad \\x escape"))?;
                        let hex = [(*hi), (*lo)];
                        let hex_str =
                            std::str::from_utf8(&hex).map_err(|_| err(i, "bad \\x escape"))?;
                        let byte = u8::from_str_radix(hex_str, 16)
                            .map_err(|_| err(i, "bad \\x escape"))?;
                        out.push(byte);
                        i += 2;
                    }
                    _ => return Err(err(i, "unknown escape")),
                }
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(err(start, "unterminated string literal"))
}

fn err(offset: usize, reason: &str) -> ExpressionError {
    ExpressionError::Parse {
        offset,
        reason: reason.to_string(),
    }
}
