//! æternity balance sweeper library.
//!
//! Derives a signing key from a recovery phrase, listens for new key blocks
//! and forwards the sender's balance, minus the fee, to a fixed recipient.

pub mod chain;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod listener;
pub mod observability;
pub mod resilience;
pub mod sweep;

pub use config::SweeperConfig;
pub use lifecycle::Shutdown;
pub use sweep::{SweepExecutor, SweepOutcome, SweepSession};
