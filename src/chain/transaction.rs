//! Spend transaction building, fee discovery and signing.
//!
//! # Responsibilities
//! - Encode/decode spend transactions (`tx_...`)
//! - Compute the minimum fee for a spend
//! - Wrap a spend in a signed envelope ready for broadcast
//! - Poll the node until a broadcast spend is mined

use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::chain::amount::Amount;
use crate::chain::client::NodeClient;
use crate::chain::encoding::{self, Alphabet, Field, TX_PREFIX};
use crate::chain::policy::SigningRequest;
use crate::chain::types::{
    Address, ChainError, ChainResult, ConfirmationStatus, TransactionTemplate, TxHash,
};
use crate::chain::wallet::Wallet;

/// Object tag of a signed transaction envelope.
pub const SIGNED_TX_TAG: u64 = 11;
/// Object tag of a spend transaction.
pub const SPEND_TX_TAG: u64 = 12;
const OBJECT_VERSION: u64 = 1;
/// Account id tag inside serialized ids.
const ACCOUNT_ID_TAG: u8 = 1;

const FEE_ITERATIONS: usize = 8;

/// A coin transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendTx {
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub fee: Amount,
    /// Absolute block height after which the spend is invalid; 0 disables.
    pub ttl: u64,
    pub nonce: u64,
    pub payload: Vec<u8>,
}

impl SpendTx {
    /// A spend with the minimum fee already filled in.
    pub fn new(
        sender: Address,
        recipient: Address,
        amount: Amount,
        ttl: u64,
        nonce: u64,
    ) -> Self {
        let mut tx = Self {
            sender,
            recipient,
            amount,
            fee: Amount::ZERO,
            ttl,
            nonce,
            payload: Vec::new(),
        };
        tx.fee = tx.min_fee();
        tx
    }

    fn to_field(&self) -> Field {
        Field::List(vec![
            Field::int(SPEND_TX_TAG),
            Field::int(OBJECT_VERSION),
            account_id(&self.sender),
            account_id(&self.recipient),
            Field::amount(self.amount),
            Field::amount(self.fee),
            Field::int(self.ttl),
            Field::int(self.nonce),
            Field::Bytes(self.payload.clone()),
        ])
    }

    /// RLP bytes of the unsigned spend.
    pub fn to_bytes(&self) -> Vec<u8> {
        encoding::rlp_encode(&self.to_field())
    }

    pub fn from_bytes(bytes: &[u8]) -> ChainResult<Self> {
        let root = encoding::rlp_decode(bytes)?;
        let fields = root.as_list()?;
        let [tag, version, sender, recipient, amount, fee, ttl, nonce, payload] = fields else {
            return Err(ChainError::Decode(format!(
                "spend tx has {} fields, expected 9",
                fields.len()
            )));
        };
        if tag.as_u64()? != SPEND_TX_TAG {
            return Err(ChainError::Decode(format!(
                "object tag {} is not a spend",
                tag.as_u64()?
            )));
        }
        if version.as_u64()? != OBJECT_VERSION {
            return Err(ChainError::Decode(format!(
                "unsupported spend version {}",
                version.as_u64()?
            )));
        }

        Ok(Self {
            sender: parse_account_id(sender)?,
            recipient: parse_account_id(recipient)?,
            amount: amount.as_amount()?,
            fee: fee.as_amount()?,
            ttl: ttl.as_u64()?,
            nonce: nonce.as_u64()?,
            payload: payload.as_bytes()?.to_vec(),
        })
    }

    pub fn to_template(&self) -> TransactionTemplate {
        TransactionTemplate::new(encoding::encode_prefixed(
            TX_PREFIX,
            &self.to_bytes(),
            Alphabet::Base64,
        ))
    }

    pub fn from_template(template: &TransactionTemplate) -> ChainResult<Self> {
        let bytes = encoding::decode_prefixed(TX_PREFIX, template.encoded(), Alphabet::Base64)?;
        Self::from_bytes(&bytes)
    }

    /// Smallest fee the node accepts for this spend.
    ///
    /// The fee is part of the encoding, so the size is recomputed until the
    /// fee stops changing it.
    pub fn min_fee(&self) -> Amount {
        let mut sized = self.clone();
        sized.fee = Amount::ZERO;
        for _ in 0..FEE_ITERATIONS {
            let size = signed_envelope(&[[0u8; 64]], &sized.to_bytes()).len();
            let fee = encoding::fee_for_size(size);
            if fee == sized.fee {
                break;
            }
            sized.fee = fee;
        }
        sized.fee
    }
}

fn account_id(address: &Address) -> Field {
    let mut id = Vec::with_capacity(33);
    id.push(ACCOUNT_ID_TAG);
    id.extend_from_slice(address.public_key());
    Field::Bytes(id)
}

fn parse_account_id(field: &Field) -> ChainResult<Address> {
    let bytes = field.as_bytes()?;
    match bytes.split_first() {
        Some((&ACCOUNT_ID_TAG, key)) if key.len() == 32 => {
            let mut public_key = [0u8; 32];
            public_key.copy_from_slice(key);
            Ok(Address::from_public_key(public_key))
        }
        _ => Err(ChainError::Decode("malformed account id".to_string())),
    }
}

fn signed_envelope(signatures: &[[u8; 64]], tx_bytes: &[u8]) -> Vec<u8> {
    encoding::rlp_encode(&Field::List(vec![
        Field::int(SIGNED_TX_TAG),
        Field::int(OBJECT_VERSION),
        Field::List(
            signatures
                .iter()
                .map(|s| Field::Bytes(s.to_vec()))
                .collect(),
        ),
        Field::Bytes(tx_bytes.to_vec()),
    ]))
}

/// Bytes covered by the signature: `network_id || blake2b(tx)`.
pub fn signing_message(network_id: &str, tx_bytes: &[u8]) -> Vec<u8> {
    let mut message = network_id.as_bytes().to_vec();
    message.extend_from_slice(&encoding::blake2b_256(tx_bytes));
    message
}

/// A signed spend ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedSpend {
    pub tx: SpendTx,
    pub encoded: String,
    pub hash: TxHash,
}

/// Signs `tx` with `wallet` for the given network.
pub fn sign_spend(wallet: &Wallet, network_id: &str, tx: SpendTx) -> ChainResult<SignedSpend> {
    let tx_bytes = tx.to_bytes();
    let request = SigningRequest {
        sender: &tx.sender,
        recipient: &tx.recipient,
        amount: tx.amount,
        fee: tx.fee,
    };
    let signature = wallet.sign(&request, &signing_message(network_id, &tx_bytes))?;
    let envelope = signed_envelope(&[signature], &tx_bytes);

    Ok(SignedSpend {
        hash: TxHash::from_signed_tx(&envelope),
        encoded: encoding::encode_prefixed(TX_PREFIX, &envelope, Alphabet::Base64),
        tx,
    })
}

/// Polls until the transaction is mined or `timeout_secs` elapses.
///
/// Running out of time is not an error: the spend stays in the mempool and
/// the receipt reports it as pending.
pub async fn wait_for_confirmation(
    client: &NodeClient,
    tx_hash: &TxHash,
    timeout_secs: u64,
    poll_interval: Duration,
) -> ChainResult<ConfirmationStatus> {
    if timeout_secs == 0 {
        return Ok(ConfirmationStatus::Pending);
    }

    let result = timeout(Duration::from_secs(timeout_secs), async {
        let mut ticker = interval(poll_interval);
        loop {
            ticker.tick().await;
            match client.transaction_height(tx_hash).await {
                Ok(Some(block_height)) => return ConfirmationStatus::Mined { block_height },
                Ok(None) => tracing::debug!(tx_hash = %tx_hash, "Transaction pending"),
                Err(e) => tracing::debug!(tx_hash = %tx_hash, error = %e, "Confirmation poll failed"),
            }
        }
    })
    .await;

    match result {
        Ok(status) => {
            tracing::info!(tx_hash = %tx_hash, status = ?status, "Transaction mined");
            Ok(status)
        }
        Err(_) => {
            tracing::warn!(
                tx_hash = %tx_hash,
                timeout_secs = timeout_secs,
                "Transaction not mined before timeout"
            );
            Ok(ConfirmationStatus::Pending)
        }
    }
}
