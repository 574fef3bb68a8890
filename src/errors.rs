// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Tunniste - Scanner Error Types
 * Production-ready error handling with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Main scanner error type
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Rule document errors
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// Expression compile/evaluate errors
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Output writer errors
    #[error("Output error: {0}")]
    Output(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout errors
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// General errors
    #[error("Scanner error: {0}")]
    General(String),
}

/// Network-specific errors with retryability classification
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout { url: String, timeout: Duration },

    #[error("Connection refused for {url}")]
    ConnectionRefused { url: String },

    #[error("Connection reset by peer for {url}")]
    ConnectionReset { url: String },

    #[error("DNS resolution failed for {host}: {reason}")]
    DnsResolutionFailed { host: String, reason: String },

    #[error("Proxy error: {reason}")]
    ProxyError { reason: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Unsupported transport: {transport}")]
    UnsupportedTransport { transport: String },

    #[error("Network error: {0}")]
    Other(String),
}

/// Rule loading / rule document errors
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Malformed rule document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("Rule directory walk failed at {path}: {reason}")]
    WalkFailed { path: String, reason: String },

    #[error("No rules loaded from {source_path}")]
    Empty { source_path: String },
}

/// Expression engine errors
#[derive(Error, Debug)]
pub enum ExpressionError {
    #[error("Parse error at offset {offset}: {reason}")]
    Parse { offset: usize, reason: String },

    #[error("Evaluation error: {0}")]
    Eval(String),

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Expression timed out after {0:?}")]
    Timeout(Duration),
}

impl NetworkError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::ConnectionTimeout { .. } => true,
            NetworkError::ConnectionReset { .. } => true,
            NetworkError::ProxyError { .. } => true,
            NetworkError::ConnectionRefused { .. } => false,
            NetworkError::DnsResolutionFailed { .. } => false,
            NetworkError::InvalidUrl { .. } => false,
            NetworkError::UnsupportedTransport { .. } => false,
            NetworkError::Other(_) => false,
        }
    }
}

impl ScannerError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ScannerError::Network(e) => e.is_retryable(),
            ScannerError::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Convert reqwest errors to our error types
impl From<reqwest::Error> for ScannerError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            ScannerError::Network(NetworkError::ConnectionTimeout {
                url,
                timeout: Duration::from_secs(30),
            })
        } else if err.is_connect() {
            ScannerError::Network(NetworkError::ConnectionRefused { url })
        } else if err.is_builder() {
            ScannerError::Network(NetworkError::InvalidUrl { url })
        } else {
            ScannerError::Network(NetworkError::Other(err.to_string()))
        }
    }
}

/// Result type for scanner operations
pub type ScannerResult<T> = Result<T, ScannerError>;
