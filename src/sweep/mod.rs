//! Sweep subsystem.
//!
//! # Data Flow
//! ```text
//! BlockEvent (listener)
//!     → executor.rs (single-flight guard, balance → fee → transfer)
//!     → session.rs (client + fixed sender/recipient)
//!     → outcome.rs (decision reported to caller, logs and metrics)
//! ```
//!
//! # Design Decisions
//! - Amounts never leave exact integer arithmetic
//! - The fee comes from a freshly built template on every sweep
//! - Failures end the sweep; the next block is the retry

pub mod executor;
pub mod outcome;
pub mod session;

pub use executor::{SweepExecutor, SweepOptions};
pub use outcome::{SweepOutcome, SweepStage};
pub use session::SweepSession;
