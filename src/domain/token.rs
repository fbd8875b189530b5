//! Token Candidates
//!
//! Candidate addresses handed out by the discovery feed, plus the address
//! validation every pipeline entry point runs before touching the network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wrapped SOL mint, used as the quote side for routing checks
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Length of a decoded Solana public key
const PUBKEY_BYTES: usize = 32;

/// Rejected input, raised before any provider is called
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Address is empty")]
    EmptyAddress,

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Validate a Solana mint address (base58, 32 bytes once decoded)
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    if trimmed.len() != address.len() {
        return Err(ValidationError::InvalidAddress {
            address: address.to_string(),
            reason: "surrounding whitespace".to_string(),
        });
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| ValidationError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    if bytes.len() != PUBKEY_BYTES {
        return Err(ValidationError::InvalidAddress {
            address: address.to_string(),
            reason: format!("decoded to {} bytes, expected {}", bytes.len(), PUBKEY_BYTES),
        });
    }

    Ok(())
}

/// A token address seen by the discovery feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCandidate {
    /// Token mint address
    pub address: String,
    /// When the scheduler first saw this address
    pub first_seen_at: DateTime<Utc>,
}

impl TokenCandidate {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            first_seen_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        assert!(validate_address(SOL_MINT).is_ok());
        assert!(validate_address("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").is_ok());
    }

    #[test]
    fn test_empty_address_rejected() {
        assert_eq!(validate_address(""), Err(ValidationError::EmptyAddress));
        assert_eq!(validate_address("   "), Err(ValidationError::EmptyAddress));
    }

    #[test]
    fn test_non_base58_rejected() {
        // '0', 'O', 'I' and 'l' are not in the base58 alphabet
        let err = validate_address("0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAddress { .. }));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = validate_address("abc").unwrap_err();
        assert!(err.to_string().contains("expected 32"));
    }

    #[test]
    fn test_whitespace_rejected() {
        let padded = format!(" {}", SOL_MINT);
        assert!(validate_address(&padded).is_err());
    }

    #[test]
    fn test_candidate_creation() {
        let candidate = TokenCandidate::new(SOL_MINT);
        assert_eq!(candidate.address, SOL_MINT);
        assert!(candidate.first_seen_at <= Utc::now());
    }
}
