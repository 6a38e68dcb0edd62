//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to node or event stream:
//!     → timeouts.rs (enforce connect/subscribe/request deadline)
//!     → On failure: backoff.rs (wait, then reconnect up to a bound)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Failed sweeps are not retried; the next block is the retry

pub mod backoff;
pub mod timeouts;

pub use backoff::{calculate_backoff, Backoff};
pub use timeouts::{with_deadline, DeadlineExceeded};
