//! Chain-specific types and error definitions.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::chain::amount::{Amount, ArithmeticError};
use crate::chain::encoding::{self, Alphabet, ACCOUNT_PREFIX, TX_HASH_PREFIX};

/// Startup input that does not match the expected format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid address '{input}': {reason}")]
    Address { input: String, reason: String },

    #[error("invalid recovery phrase: {0}")]
    Mnemonic(String),
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Transport failure or unexpected node response.
    #[error("network error: {0}")]
    Network(String),

    /// Request did not finish within its deadline.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// The node (or the signing policy) refused the transaction.
    #[error("submission rejected: {0}")]
    Submission(String),

    /// Malformed encoded data.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    /// Key derivation or signing failure.
    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Operation needs something the client was not built with.
    #[error("not available: {0}")]
    NotAvailable(String),
}

/// Result type for blockchain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// An account address (`ak_...`), checked on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    encoded: String,
    public_key: [u8; 32],
}

impl Address {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::Address {
            input: input.to_string(),
            reason,
        };

        if input.trim() != input || input.is_empty() {
            return Err(invalid("empty or padded with whitespace".to_string()));
        }
        if !input.starts_with("ak_") {
            return Err(invalid("expected 'ak_' prefix".to_string()));
        }

        let payload = encoding::decode_prefixed(ACCOUNT_PREFIX, input, Alphabet::Base58)
            .map_err(|e| invalid(e.to_string()))?;
        let public_key: [u8; 32] = payload
            .as_slice()
            .try_into()
            .map_err(|_| invalid(format!("expected 32 byte key, got {}", payload.len())))?;

        Ok(Self {
            encoded: input.to_string(),
            public_key,
        })
    }

    pub fn from_public_key(public_key: [u8; 32]) -> Self {
        Self {
            encoded: encoding::encode_prefixed(ACCOUNT_PREFIX, &public_key, Alphabet::Base58),
            public_key,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Transaction hash (`th_...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHash(String);

impl TxHash {
    pub fn from_signed_tx(signed_tx: &[u8]) -> Self {
        Self(encoding::encode_prefixed(
            TX_HASH_PREFIX,
            &encoding::blake2b_256(signed_tx),
            Alphabet::Base58,
        ))
    }

    pub fn parse(input: &str) -> ChainResult<Self> {
        encoding::decode_prefixed(TX_HASH_PREFIX, input, Alphabet::Base58)?;
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An unsigned spend built only to learn its fee (`tx_...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTemplate {
    encoded: String,
}

impl TransactionTemplate {
    pub fn new(encoded: String) -> Self {
        Self { encoded }
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Accepted by the node but not yet in a block.
    Pending,
    /// Included in a micro block at this height.
    Mined { block_height: u64 },
}

/// What a successful submission reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub recipient: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub nonce: u64,
    pub status: ConfirmationStatus,
}
