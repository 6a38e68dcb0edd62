//! The fixed parties of a sweeping run.

use std::sync::Arc;

use crate::chain::{Address, ChainClient};

/// Client, sender and recipient for the lifetime of the process.
///
/// Built once at startup and shared with the listener callback; none of
/// its fields change afterwards.
#[derive(Clone)]
pub struct SweepSession {
    pub client: Arc<dyn ChainClient>,
    pub sender: Address,
    pub recipient: Address,
}

impl SweepSession {
    pub fn new(client: Arc<dyn ChainClient>, sender: Address, recipient: Address) -> Self {
        Self {
            client,
            sender,
            recipient,
        }
    }
}

impl std::fmt::Debug for SweepSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepSession")
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}
