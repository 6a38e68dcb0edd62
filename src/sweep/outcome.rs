//! What a single sweep decided.

use std::fmt;

use crate::chain::{Amount, TransactionReceipt};

/// Step of the sweep that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStage {
    Balance,
    BuildTemplate,
    ExtractFee,
    Submit,
}

impl fmt::Display for SweepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepStage::Balance => "balance",
            SweepStage::BuildTemplate => "build_template",
            SweepStage::ExtractFee => "extract_fee",
            SweepStage::Submit => "submit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sender holds nothing.
    NoBalance,
    /// The fee would consume the whole balance.
    InsufficientAfterFee {
        balance: Amount,
        fee: Amount,
        shortfall: Amount,
    },
    /// A transfer of `balance - fee` was accepted by the node.
    Submitted { receipt: TransactionReceipt },
    /// A chain call failed; the next block retries.
    Failed { stage: SweepStage, error: String },
    /// Another sweep was still running.
    Skipped,
}

impl SweepOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            SweepOutcome::NoBalance => "no_balance",
            SweepOutcome::InsufficientAfterFee { .. } => "insufficient_after_fee",
            SweepOutcome::Submitted { .. } => "submitted",
            SweepOutcome::Failed { .. } => "failed",
            SweepOutcome::Skipped => "skipped",
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, SweepOutcome::Submitted { .. })
    }
}
