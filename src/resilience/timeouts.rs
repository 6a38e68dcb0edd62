//! Timeout enforcement.
//!
//! Every external call the agent makes has a deadline. Timeout errors carry
//! the name of the operation so logs say what stalled.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// An operation did not finish in time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} timed out after {}ms", .after.as_millis())]
pub struct DeadlineExceeded {
    pub operation: &'static str,
    pub after: Duration,
}

/// Runs `fut`, failing with [`DeadlineExceeded`] once `limit` elapses.
pub async fn with_deadline<F: Future>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        tracing::warn!(operation = operation, timeout_ms = limit.as_millis() as u64, "Deadline exceeded");
        DeadlineExceeded {
            operation,
            after: limit,
        }
    })
}
