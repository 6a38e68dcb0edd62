//! Signing approval policies.
//!
//! The wallet consults a [`SigningPolicy`] before every signature. The agent
//! runs unattended, so the default policy approves everything; a stricter
//! policy can be swapped in without touching the sweep loop.

use std::collections::HashSet;
use std::fmt::Debug;

use crate::chain::amount::Amount;
use crate::chain::types::Address;

/// A transfer waiting for a signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub sender: &'a Address,
    pub recipient: &'a Address,
    pub amount: Amount,
    pub fee: Amount,
}

/// Decision returned by a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    Approved,
    Rejected(String),
}

/// Decides whether the wallet may sign a request.
pub trait SigningPolicy: Send + Sync + Debug {
    fn review(&self, request: &SigningRequest<'_>) -> Approval;
}

/// Approves every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

impl SigningPolicy for AlwaysApprove {
    fn review(&self, request: &SigningRequest<'_>) -> Approval {
        tracing::debug!(
            recipient = %request.recipient,
            amount = %request.amount,
            "Signing request auto-approved"
        );
        Approval::Approved
    }
}

/// Approves transfers only to listed recipients.
#[derive(Debug, Clone, Default)]
pub struct RecipientAllowList {
    allowed: HashSet<Address>,
}

impl RecipientAllowList {
    pub fn new(allowed: impl IntoIterator<Item = Address>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl SigningPolicy for RecipientAllowList {
    fn review(&self, request: &SigningRequest<'_>) -> Approval {
        if self.allowed.contains(request.recipient) {
            Approval::Approved
        } else {
            Approval::Rejected(format!("recipient {} is not allow-listed", request.recipient))
        }
    }
}
