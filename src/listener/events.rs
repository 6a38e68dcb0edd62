//! Frames received from the middleware event stream.
//!
//! ```text
//! ["KeyBlocks"]                                              subscription ack
//! {"subscription":"KeyBlocks","payload":{"height":..,"hash":"kh_.."}}   block
//! {"subscription":"MicroBlocks",...}                         other
//! ```

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::chain::encoding::{self, Alphabet, KEY_BLOCK_HASH_PREFIX};

/// Subscription channel for new key blocks.
pub const KEY_BLOCKS_CHANNEL: &str = "KeyBlocks";

/// Control frame sent once after connecting.
pub fn subscribe_frame() -> String {
    serde_json::json!({ "op": "Subscribe", "payload": KEY_BLOCKS_CHANNEL }).to_string()
}

/// A newly generated key block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    pub height: u64,
    pub hash: String,
}

/// Classified inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Block(BlockEvent),
    /// Channels the server confirmed we are subscribed to.
    SubscriptionAck(Vec<String>),
    /// Well-formed but irrelevant (other channels, server notices).
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame is not JSON: {0}")]
    NotJson(String),

    #[error("malformed key block payload: {0}")]
    MalformedBlock(String),
}

#[derive(Deserialize)]
struct KeyBlockPayload {
    height: u64,
    hash: String,
}

/// Classifies one text frame. Only a complete key block notification
/// becomes [`InboundFrame::Block`].
pub fn parse_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value = serde_json::from_str(text).map_err(|e| FrameError::NotJson(e.to_string()))?;

    match value {
        Value::Array(items) => {
            let channels = items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect();
            Ok(InboundFrame::SubscriptionAck(channels))
        }
        Value::Object(mut fields) => {
            let is_key_block = fields.get("subscription").and_then(Value::as_str)
                == Some(KEY_BLOCKS_CHANNEL);
            if !is_key_block {
                return Ok(InboundFrame::Other);
            }
            let payload = fields
                .remove("payload")
                .ok_or_else(|| FrameError::MalformedBlock("missing payload".to_string()))?;
            let block: KeyBlockPayload = serde_json::from_value(payload)
                .map_err(|e| FrameError::MalformedBlock(e.to_string()))?;
            encoding::decode_prefixed(KEY_BLOCK_HASH_PREFIX, &block.hash, Alphabet::Base58)
                .map_err(|e| FrameError::MalformedBlock(format!("hash {}: {}", block.hash, e)))?;

            Ok(InboundFrame::Block(BlockEvent {
                height: block.height,
                hash: block.hash,
            }))
        }
        _ => Ok(InboundFrame::Other),
    }
}
