//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Derive wallet → Build client/executor → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Close event stream → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then keys, then network
//! - An in-flight sweep finishes before the listener observes shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{StartupArgs, StartupError};
