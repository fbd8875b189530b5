//! Provider Error Types
//!
//! Classification of everything that can go wrong talking to a provider.
//! These never leave the adapter: `fold_stage` turns them into
//! `Stage::Absent` before the pipeline sees them.

use thiserror::Error;

use crate::domain::{AbsentKind, AbsentReason, Stage};

/// Errors raised inside a provider client
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// Network failure or 5xx, retried
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// 4xx other than 429, never retried
    #[error("Provider rejected request ({status}): {message}")]
    Permanent { status: u16, message: String },

    /// Local limiter wait too long, or 429 on every attempt
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Request exceeded the client timeout
    #[error("Request timed out")]
    Timeout,

    /// Body did not match the expected schema
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::Timeout)
    }

    pub fn absent_kind(&self) -> AbsentKind {
        match self {
            ProviderError::Transient(_) => AbsentKind::Transient,
            ProviderError::Permanent { .. } => AbsentKind::Permanent,
            ProviderError::RateLimited(_) => AbsentKind::RateLimited,
            ProviderError::Timeout => AbsentKind::Timeout,
            ProviderError::Decode(_) => AbsentKind::Malformed,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

impl From<ProviderError> for AbsentReason {
    fn from(err: ProviderError) -> Self {
        AbsentReason::new(err.absent_kind(), err.to_string())
    }
}

/// Collapse a fallible fetch into a stage
pub fn fold_stage<T>(result: Result<Stage<T>, ProviderError>) -> Stage<T> {
    result.unwrap_or_else(|err| Stage::Absent(err.into()))
}
