//! Exact integer amounts in the chain's smallest unit (aettos).
//!
//! Balances routinely exceed `u64::MAX` (1 AE = 10^18 aettos), so every
//! monetary value is carried as a 256-bit unsigned integer. Nothing in this
//! module touches floating point.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of decimals between aettos and AE.
pub const AE_DECIMALS: usize = 18;

/// Arithmetic failure on [`Amount`] values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    /// Subtraction would need a signed result.
    #[error("underflow: {minuend} - {subtrahend} is negative")]
    Underflow { minuend: Amount, subtrahend: Amount },

    /// Addition exceeded 256 bits.
    #[error("overflow: {0} + {1} exceeds 256 bits")]
    Overflow(Amount, Amount),

    /// Input was not a non-negative decimal integer.
    #[error("invalid amount '{0}'")]
    Parse(String),
}

/// Non-negative amount of aettos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Self = Self(U256::ZERO);

    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.0.is_zero()
    }

    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, ArithmeticError> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount)
            .ok_or(ArithmeticError::Underflow {
                minuend: self,
                subtrahend: rhs,
            })
    }

    pub fn checked_add(self, rhs: Amount) -> Result<Amount, ArithmeticError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(ArithmeticError::Overflow(self, rhs))
    }

    /// Amount left after paying `fee`, classified by sign.
    ///
    /// A fee at or above the amount yields [`NetAmount::NonPositive`] with
    /// the shortfall; it never wraps around.
    pub fn net_of(self, fee: Amount) -> NetAmount {
        match self.checked_sub(fee) {
            Ok(rest) if rest.is_positive() => NetAmount::Positive(rest),
            Ok(_) => NetAmount::NonPositive {
                shortfall: Amount::ZERO,
            },
            Err(_) => NetAmount::NonPositive {
                shortfall: Amount(fee.0 - self.0),
            },
        }
    }

    /// Minimal big-endian bytes. Zero encodes as a single `0x00`.
    pub fn to_be_bytes_trimmed(&self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes_trimmed_vec();
        if bytes.is_empty() {
            vec![0]
        } else {
            bytes
        }
    }

    pub fn from_be_slice(bytes: &[u8]) -> Result<Self, ArithmeticError> {
        U256::try_from_be_slice(bytes)
            .map(Amount)
            .ok_or_else(|| ArithmeticError::Parse(format!("{} byte integer", bytes.len())))
    }

    /// Renders the amount in AE with every significant decimal kept.
    pub fn to_ae_string(&self) -> String {
        let digits = self.0.to_string();
        let (int_part, frac_part) = if digits.len() > AE_DECIMALS {
            let split = digits.len() - AE_DECIMALS;
            (digits[..split].to_string(), digits[split..].to_string())
        } else {
            (
                "0".to_string(),
                format!("{:0>width$}", digits, width = AE_DECIMALS),
            )
        };
        let frac_part = frac_part.trim_end_matches('0');
        if frac_part.is_empty() {
            format!("{} AE", int_part)
        } else {
            format!("{}.{} AE", int_part, frac_part)
        }
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl FromStr for Amount {
    type Err = ArithmeticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ArithmeticError::Parse(s.to_string()));
        }
        U256::from_str_radix(trimmed, 10)
            .map(Amount)
            .map_err(|_| ArithmeticError::Parse(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reads a JSON number of any length without passing through `f64`.
pub fn deserialize_json_number<'de, D>(deserializer: D) -> Result<Amount, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    number
        .to_string()
        .parse()
        .map_err(serde::de::Error::custom)
}

/// Result of subtracting a fee from an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetAmount {
    /// Something is left to send.
    Positive(Amount),
    /// Nothing is left; `shortfall` is how much the fee exceeds the amount.
    NonPositive { shortfall: Amount },
}
