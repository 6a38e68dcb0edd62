//! Key derivation and transaction signing.
//!
//! # Derivation
//! ```text
//! recovery phrase (BIP39)
//!     → 64-byte seed (PBKDF2, empty passphrase)
//!     → SLIP-0010 ed25519, path m/44'/457'/{account}'/0'/0'
//!     → ed25519 keypair → ak_ address
//! ```
//!
//! # Security
//! - The phrase and derived secret are zeroized after use
//! - Keys are never logged or serialized
//! - Every signature goes through the wallet's [`SigningPolicy`]

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::sync::Arc;
use zeroize::{Zeroize, Zeroizing};

use crate::chain::policy::{AlwaysApprove, Approval, SigningPolicy, SigningRequest};
use crate::chain::types::{Address, ChainError, ChainResult, ValidationError};

/// Environment variable read when the phrase is not passed on the command line.
pub const MNEMONIC_ENV_VAR: &str = "SWEEPER_MNEMONIC";

/// SLIP-0044 coin type registered for æternity.
pub const AE_COIN_TYPE: u32 = 457;

const HARDENED_OFFSET: u32 = 0x8000_0000;
const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";

type HmacSha512 = Hmac<Sha512>;

/// Output of key derivation.
pub struct DerivedKeypair {
    pub secret_key: Zeroizing<[u8; 32]>,
    pub public_key: [u8; 32],
}

fn parse_phrase(phrase: &str) -> Result<bip39::Mnemonic, ValidationError> {
    let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
    bip39::Mnemonic::parse_normalized(&normalized)
        .map_err(|e| ValidationError::Mnemonic(e.to_string()))
}

/// Checks word list and checksum without deriving anything.
pub fn check_phrase(phrase: &str) -> Result<(), ValidationError> {
    parse_phrase(phrase).map(|_| ())
}

/// Derives the account keypair for `account_index` from a recovery phrase.
pub fn derive_keypair(phrase: &str, account_index: u32) -> ChainResult<DerivedKeypair> {
    let mnemonic = parse_phrase(phrase)?;
    let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));

    let path = [AE_COIN_TYPE, account_index, 0, 0];
    let (mut key, mut chain_code) = master_key_from_seed(&seed[..])?;
    for index in std::iter::once(44).chain(path) {
        let (child_key, child_chain) = derive_hardened_child(&key, &chain_code, index)?;
        key.zeroize();
        chain_code.zeroize();
        key = child_key;
        chain_code = child_chain;
    }
    chain_code.zeroize();

    let secret_key = Zeroizing::new(key);
    key.zeroize();
    let public_key = SigningKey::from_bytes(&secret_key).verifying_key().to_bytes();

    Ok(DerivedKeypair {
        secret_key,
        public_key,
    })
}

fn master_key_from_seed(seed: &[u8]) -> ChainResult<([u8; 32], [u8; 32])> {
    let i = hmac_sha512(MASTER_HMAC_KEY, seed)?;
    Ok(split_halves(&i))
}

fn derive_hardened_child(
    parent_key: &[u8; 32],
    parent_chain_code: &[u8; 32],
    index: u32,
) -> ChainResult<([u8; 32], [u8; 32])> {
    if index >= HARDENED_OFFSET {
        return Err(ChainError::Wallet(format!("derivation index {} out of range", index)));
    }
    // 0x00 || key || ser32(index | hardened)
    let mut data = [0u8; 37];
    data[1..33].copy_from_slice(parent_key);
    data[33..].copy_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());

    let i = hmac_sha512(parent_chain_code, &data);
    data.zeroize();
    Ok(split_halves(&*i?))
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> ChainResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| ChainError::Wallet(format!("HMAC-SHA512 key init failed: {}", e)))?;
    mac.update(data);
    let mut output = Zeroizing::new([0u8; 64]);
    output.copy_from_slice(&mac.finalize().into_bytes());
    Ok(output)
}

fn split_halves(i: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&i[..32]);
    right.copy_from_slice(&i[32..]);
    (left, right)
}

/// The sender account's signing key plus its approval policy.
#[derive(Clone)]
pub struct Wallet {
    signer: SigningKey,
    address: Address,
    policy: Arc<dyn SigningPolicy>,
}

impl Wallet {
    /// Derives the wallet from a BIP39 recovery phrase.
    pub fn from_mnemonic(phrase: &str, account_index: u32) -> ChainResult<Self> {
        let keypair = derive_keypair(phrase, account_index)?;
        let wallet = Self::from_secret_key(&keypair.secret_key);
        tracing::info!(
            address = %wallet.address,
            account_index = account_index,
            "Wallet derived from recovery phrase"
        );
        Ok(wallet)
    }

    pub fn from_secret_key(secret_key: &[u8; 32]) -> Self {
        let signer = SigningKey::from_bytes(secret_key);
        let address = Address::from_public_key(signer.verifying_key().to_bytes());
        Self {
            signer,
            address,
            policy: Arc::new(AlwaysApprove),
        }
    }

    /// Replaces the approval policy.
    pub fn with_policy(mut self, policy: Arc<dyn SigningPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Signs `message` if the policy approves `request`.
    pub fn sign(&self, request: &SigningRequest<'_>, message: &[u8]) -> ChainResult<[u8; 64]> {
        if request.sender != &self.address {
            return Err(ChainError::Wallet(format!(
                "request sender {} does not match wallet {}",
                request.sender, self.address
            )));
        }
        match self.policy.review(request) {
            Approval::Approved => Ok(self.signer.sign(message).to_bytes()),
            Approval::Rejected(reason) => Err(ChainError::Submission(format!(
                "signing rejected by policy: {}",
                reason
            ))),
        }
    }

    /// Checks a signature against an account's public key.
    pub fn verify(address: &Address, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(address.public_key()) else {
            return false;
        };
        key.verify(message, &ed25519_dalek::Signature::from_bytes(signature))
            .is_ok()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::amount::Amount;
    use crate::chain::policy::RecipientAllowList;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_slip10_master_vector() {
        let seed: Vec<u8> = (0u8..16).collect();
        let (key, chain) = master_key_from_seed(&seed).unwrap();
        assert_eq!(
            to_hex(&key),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            to_hex(&chain),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
    }

    #[test]
    fn test_slip10_child_vector() {
        let seed: Vec<u8> = (0u8..16).collect();
        let (key, chain) = master_key_from_seed(&seed).unwrap();
        let (child, _) = derive_hardened_child(&key, &chain, 0).unwrap();
        assert_eq!(
            to_hex(&child),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_keypair(PHRASE, 0).unwrap();
        let b = derive_keypair(&format!("  {}  ", PHRASE.replace(' ', "\n")), 0).unwrap();
        assert_eq!(a.public_key, b.public_key);

        let other = derive_keypair(PHRASE, 1).unwrap();
        assert_ne!(a.public_key, other.public_key);
    }

    #[test]
    fn test_invalid_phrase() {
        let err = derive_keypair("not a valid phrase", 0).err().unwrap();
        assert!(matches!(err, ChainError::Validation(ValidationError::Mnemonic(_))));
    }

    #[test]
    fn test_check_phrase() {
        assert!(check_phrase(PHRASE).is_ok());
        assert!(matches!(
            check_phrase("abandon abandon abandon"),
            Err(ValidationError::Mnemonic(_))
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let wallet = Wallet::from_mnemonic(PHRASE, 0).unwrap();
        let recipient = Address::from_public_key([5u8; 32]);
        let request = SigningRequest {
            sender: wallet.address(),
            recipient: &recipient,
            amount: Amount::from(1u64),
            fee: Amount::from(1u64),
        };
        let signature = wallet.sign(&request, b"payload").unwrap();
        assert!(Wallet::verify(wallet.address(), b"payload", &signature));
        assert!(!Wallet::verify(wallet.address(), b"other", &signature));
    }

    #[test]
    fn test_policy_rejection() {
        let allowed = Address::from_public_key([6u8; 32]);
        let wallet = Wallet::from_secret_key(&[1u8; 32])
            .with_policy(Arc::new(RecipientAllowList::new([allowed])));
        let stranger = Address::from_public_key([7u8; 32]);
        let request = SigningRequest {
            sender: wallet.address(),
            recipient: &stranger,
            amount: Amount::from(1u64),
            fee: Amount::from(1u64),
        };
        let err = wallet.sign(&request, b"payload").unwrap_err();
        assert!(matches!(err, ChainError::Submission(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = Wallet::from_secret_key(&[1u8; 32]);
        let rendered = format!("{:?}", wallet);
        assert!(rendered.contains("ak_"));
        assert!(!rendered.contains("signer"));
    }
}
