//! Wire encodings used by the æternity node.
//!
//! # Identifiers
//! ```text
//! ak_<base58check(pubkey)>      account
//! th_<base58check(hash)>        transaction hash
//! kh_<base58check(hash)>        key block hash
//! tx_<base64check(rlp bytes)>   serialized transaction
//! ```
//! The check suffix is the first 4 bytes of `sha256(sha256(payload))`.
//!
//! # Fees
//! The minimum fee of a spend is `(15000 + 20 * size) * 1e9` aettos, where
//! `size` is the byte length of the transaction wrapped in a signed envelope.

use alloy_rlp::{Encodable, Header};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use sha2::Sha256;

use crate::chain::amount::Amount;
use crate::chain::types::{ChainError, ChainResult};

pub const ACCOUNT_PREFIX: &str = "ak";
pub const TX_HASH_PREFIX: &str = "th";
pub const KEY_BLOCK_HASH_PREFIX: &str = "kh";
pub const TX_PREFIX: &str = "tx";

/// Base gas charged for every spend transaction.
pub const TX_BASE_GAS: u64 = 15_000;
/// Gas charged per byte of the signed transaction.
pub const GAS_PER_BYTE: u64 = 20;
/// Minimum gas price accepted by nodes, in aettos.
pub const MIN_GAS_PRICE: u64 = 1_000_000_000;

type Blake2b256 = Blake2b<U32>;

/// Payload alphabet of a prefixed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    Base58,
    Base64,
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Encodes `payload` as `<prefix>_<check-encoded payload>`.
pub fn encode_prefixed(prefix: &str, payload: &[u8], alphabet: Alphabet) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum(payload));
    let body = match alphabet {
        Alphabet::Base58 => bs58::encode(&data).into_string(),
        Alphabet::Base64 => STANDARD.encode(&data),
    };
    format!("{}_{}", prefix, body)
}

/// Reverses [`encode_prefixed`], verifying prefix and checksum.
pub fn decode_prefixed(prefix: &str, encoded: &str, alphabet: Alphabet) -> ChainResult<Vec<u8>> {
    let body = encoded
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(|| ChainError::Decode(format!("expected '{}_' prefix", prefix)))?;

    let mut data = match alphabet {
        Alphabet::Base58 => bs58::decode(body)
            .into_vec()
            .map_err(|e| ChainError::Decode(format!("invalid base58: {}", e)))?,
        Alphabet::Base64 => STANDARD
            .decode(body)
            .map_err(|e| ChainError::Decode(format!("invalid base64: {}", e)))?,
    };

    if data.len() < 4 {
        return Err(ChainError::Decode("payload shorter than checksum".to_string()));
    }
    let check = data.split_off(data.len() - 4);
    if check != checksum(&data) {
        return Err(ChainError::Decode("checksum mismatch".to_string()));
    }
    Ok(data)
}

/// Blake2b with a 32-byte digest.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Blake2b256::digest(data));
    out
}

/// Minimum fee for a transaction whose signed envelope is `signed_size` bytes.
pub fn fee_for_size(signed_size: usize) -> Amount {
    let gas = u128::from(TX_BASE_GAS) + u128::from(GAS_PER_BYTE) * signed_size as u128;
    Amount::from(gas * u128::from(MIN_GAS_PRICE))
}

// ---------------------------------------------------------------------------
// RLP helpers
// ---------------------------------------------------------------------------

/// One RLP field of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Bytes(Vec<u8>),
    List(Vec<Field>),
}

impl Field {
    pub fn int(value: u64) -> Self {
        Field::Bytes(Amount::from(value).to_be_bytes_trimmed())
    }

    pub fn amount(value: Amount) -> Self {
        Field::Bytes(value.to_be_bytes_trimmed())
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Field::Bytes(bytes) => bytes.as_slice().encode(out),
            Field::List(items) => {
                let mut payload = Vec::new();
                for item in items {
                    item.encode_into(&mut payload);
                }
                Header {
                    list: true,
                    payload_length: payload.len(),
                }
                .encode(out);
                out.extend_from_slice(&payload);
            }
        }
    }

    pub fn as_bytes(&self) -> ChainResult<&[u8]> {
        match self {
            Field::Bytes(bytes) => Ok(bytes),
            Field::List(_) => Err(ChainError::Decode("expected bytes, found list".to_string())),
        }
    }

    pub fn as_list(&self) -> ChainResult<&[Field]> {
        match self {
            Field::List(items) => Ok(items),
            Field::Bytes(_) => Err(ChainError::Decode("expected list, found bytes".to_string())),
        }
    }

    pub fn as_u64(&self) -> ChainResult<u64> {
        let bytes = self.as_bytes()?;
        if bytes.len() > 8 {
            return Err(ChainError::Decode(format!("{} byte integer overflows u64", bytes.len())));
        }
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn as_amount(&self) -> ChainResult<Amount> {
        Amount::from_be_slice(self.as_bytes()?).map_err(ChainError::from)
    }
}

/// Serializes a field tree to RLP.
pub fn rlp_encode(field: &Field) -> Vec<u8> {
    let mut out = Vec::new();
    field.encode_into(&mut out);
    out
}

/// Parses a complete RLP item; trailing bytes are an error.
pub fn rlp_decode(mut data: &[u8]) -> ChainResult<Field> {
    let field = decode_item(&mut data)?;
    if !data.is_empty() {
        return Err(ChainError::Decode(format!("{} trailing bytes", data.len())));
    }
    Ok(field)
}

fn decode_item(buf: &mut &[u8]) -> ChainResult<Field> {
    let header = Header::decode(buf).map_err(|e| ChainError::Decode(format!("rlp: {}", e)))?;
    if buf.len() < header.payload_length {
        return Err(ChainError::Decode("rlp: payload truncated".to_string()));
    }
    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;

    if !header.list {
        return Ok(Field::Bytes(payload.to_vec()));
    }

    let mut items = Vec::new();
    let mut inner = payload;
    while !inner.is_empty() {
        items.push(decode_item(&mut inner)?);
    }
    Ok(Field::List(items))
}
