//! Balance inspection and fee-aware transfer.
//!
//! # Flow
//! ```text
//! balance(sender) ── 0 ──────────────────────────▶ NoBalance
//!     │ > 0
//!     ▼
//! template(sender → recipient, balance) → fee
//!     │
//! balance - fee ── ≤ 0 ──────────────────────────▶ InsufficientAfterFee
//!     │ > 0
//!     ▼
//! submit(balance - fee, recipient) ──────────────▶ Submitted
//! ```
//! Any chain error ends the sweep as `Failed`; nothing is retried until the
//! next block.

use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::chain::{ChainError, NetAmount};
use crate::config::SweepConfig;
use crate::listener::BlockEvent;
use crate::observability::metrics;
use crate::sweep::outcome::{SweepOutcome, SweepStage};
use crate::sweep::session::SweepSession;

/// Optional logging around the core decision.
#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    pub log_pending_transactions: bool,
    pub log_recipient_balance: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            log_pending_transactions: true,
            log_recipient_balance: true,
        }
    }
}

impl From<&SweepConfig> for SweepOptions {
    fn from(config: &SweepConfig) -> Self {
        Self {
            log_pending_transactions: config.log_pending_transactions,
            log_recipient_balance: config.log_recipient_balance,
        }
    }
}

/// Runs sweeps for one session, at most one at a time.
#[derive(Debug)]
pub struct SweepExecutor {
    session: SweepSession,
    options: SweepOptions,
    in_flight: Mutex<()>,
}

impl SweepExecutor {
    pub fn new(session: SweepSession, options: SweepOptions) -> Self {
        Self {
            session,
            options,
            in_flight: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &SweepSession {
        &self.session
    }

    /// Sweeps in response to a key block notification.
    pub async fn on_block(&self, event: &BlockEvent) -> SweepOutcome {
        let span = tracing::info_span!("block", height = event.height, hash = %event.hash);
        self.sweep().instrument(span).await
    }

    /// Moves everything above the fee from sender to recipient.
    ///
    /// Returns [`SweepOutcome::Skipped`] without touching the chain when a
    /// sweep is already running.
    pub async fn sweep(&self) -> SweepOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("Sweep already in progress, skipping trigger");
            metrics::record_sweep(SweepOutcome::Skipped.label());
            return SweepOutcome::Skipped;
        };

        let sweep_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "sweep",
            sweep_id = %sweep_id,
            sender = %self.session.sender,
            recipient = %self.session.recipient
        );

        let outcome = self.run().instrument(span.clone()).await;
        metrics::record_sweep(outcome.label());

        if self.options.log_recipient_balance {
            self.log_recipient_balance().instrument(span).await;
        }
        outcome
    }

    async fn run(&self) -> SweepOutcome {
        let SweepSession {
            client,
            sender,
            recipient,
        } = &self.session;

        if self.options.log_pending_transactions {
            match client.pending_transactions(sender).await {
                Ok(count) => tracing::info!(pending = count, "Pending transactions of sender"),
                Err(e) => tracing::debug!(error = %e, "Could not list pending transactions"),
            }
        }

        let balance = match client.get_balance(sender).await {
            Ok(balance) => balance,
            Err(e) => return failed(SweepStage::Balance, e),
        };
        metrics::record_balance(balance);
        tracing::info!(balance = %balance, balance_ae = %balance.to_ae_string(), "Sender balance");

        if !balance.is_positive() {
            tracing::info!(balance = %balance, "No balance");
            return SweepOutcome::NoBalance;
        }

        let template = match client
            .build_unsigned_transfer(sender, recipient, balance)
            .await
        {
            Ok(template) => template,
            Err(e) => return failed(SweepStage::BuildTemplate, e),
        };
        let fee = match client.extract_fee(&template) {
            Ok(fee) => fee,
            Err(e) => return failed(SweepStage::ExtractFee, e),
        };

        let sendable = match balance.net_of(fee) {
            NetAmount::Positive(sendable) => sendable,
            NetAmount::NonPositive { shortfall } => {
                tracing::info!(
                    balance = %balance,
                    fee = %fee,
                    shortfall = %shortfall,
                    "Insufficient balance after fee"
                );
                return SweepOutcome::InsufficientAfterFee {
                    balance,
                    fee,
                    shortfall,
                };
            }
        };

        tracing::info!(
            balance = %balance,
            fee = %fee,
            amount = %sendable,
            "Submitting transfer"
        );
        match client.submit_transfer(sendable, recipient).await {
            Ok(receipt) => {
                tracing::info!(
                    tx_hash = %receipt.tx_hash,
                    amount = %receipt.amount,
                    fee = %receipt.fee,
                    nonce = receipt.nonce,
                    status = ?receipt.status,
                    "Transfer submitted"
                );
                SweepOutcome::Submitted { receipt }
            }
            Err(e) => failed(SweepStage::Submit, e),
        }
    }

    async fn log_recipient_balance(&self) {
        let recipient = &self.session.recipient;
        match self.session.client.get_balance(recipient).await {
            Ok(balance) => tracing::info!(
                recipient = %recipient,
                balance = %balance,
                balance_ae = %balance.to_ae_string(),
                "Recipient balance"
            ),
            Err(e) => tracing::warn!(recipient = %recipient, error = %e, "Could not read recipient balance"),
        }
    }
}

fn failed(stage: SweepStage, error: ChainError) -> SweepOutcome {
    tracing::error!(stage = %stage, error = %error, "Sweep failed");
    SweepOutcome::Failed {
        stage,
        error: error.to_string(),
    }
}
