//! æternity chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Recovery phrase (CLI argument or SWEEPER_MNEMONIC)
//!     → wallet.rs (derivation, signing behind a policy)
//!     → client.rs (node HTTP API with timeouts and failover)
//!     → transaction.rs (build, sign, broadcast, confirm)
//! ```
//!
//! # Security Constraints
//! - The phrase is read once at startup and never logged
//! - Every node call has a deadline
//! - Balances and fees stay in exact integer arithmetic

pub mod amount;
pub mod client;
pub mod encoding;
pub mod policy;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use amount::{Amount, NetAmount};
pub use client::{ChainClient, NodeClient, NodeClientConfig};
pub use policy::{AlwaysApprove, RecipientAllowList, SigningPolicy};
pub use types::{Address, ChainError, ChainResult, TransactionReceipt, ValidationError};
pub use wallet::Wallet;
