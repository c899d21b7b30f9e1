//! Signing keystore and signed envelopes
//!
//! - Ed25519 keys loaded from a 32-byte seed
//! - Account address = last 20 bytes of SHA-256(public key)
//! - Envelope hash = SHA-256 of the canonical bincode bytes

use crate::error::{Error, Result, SigningError, SubmissionError};
use crate::ports::Signer;
use crate::types::{Address, Operation, Params, TransactionHandle};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive the account address of a public key
pub fn address_from_public_key(public_key: &[u8; 32]) -> Address {
    let digest = hash_bytes(public_key);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::from_bytes(bytes)
}

#[derive(Serialize)]
struct UnsignedEnvelope<'a> {
    operation: Operation,
    params: &'a Params,
    signer: Address,
    public_key: [u8; 32],
    nonce: Uuid,
    issued_at: i64,
}

/// A signed, ready-to-submit mutation
#[derive(Debug, Clone, Serialize)]
pub struct SignedEnvelope {
    /// Operation being requested
    pub operation: Operation,
    /// Final parameters (after derivation and composition)
    pub params: Params,
    /// Signing account
    pub signer: Address,
    /// Ed25519 public key of the signer
    pub public_key: [u8; 32],
    /// Unique per envelope
    pub nonce: Uuid,
    /// Unix milliseconds
    pub issued_at: i64,
    /// Ed25519 signature over the unsigned bytes
    pub signature: Vec<u8>,
}

impl SignedEnvelope {
    fn unsigned(&self) -> UnsignedEnvelope<'_> {
        UnsignedEnvelope {
            operation: self.operation,
            params: &self.params,
            signer: self.signer,
            public_key: self.public_key,
            nonce: self.nonce,
            issued_at: self.issued_at,
        }
    }

    /// Bytes covered by the signature
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.unsigned())?)
    }

    /// Canonical bytes including the signature
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Transaction hash
    pub fn transaction_hash(&self) -> Result<TransactionHandle> {
        Ok(TransactionHandle::from_bytes(hash_bytes(&self.canonical_bytes()?)))
    }

    /// Check the signature and that the signer address matches the key
    pub fn verify(&self) -> std::result::Result<(), SubmissionError> {
        if address_from_public_key(&self.public_key) != self.signer {
            return Err(SubmissionError::Rejected(format!(
                "signer {} does not match public key",
                self.signer
            )));
        }

        let key = VerifyingKey::from_bytes(&self.public_key)
            .map_err(|e| SubmissionError::Rejected(format!("invalid public key: {}", e)))?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|e| SubmissionError::Rejected(format!("invalid signature: {}", e)))?;
        let message = self
            .signing_bytes()
            .map_err(|e| SubmissionError::Rejected(e.to_string()))?;

        key.verify(&message, &signature)
            .map_err(|e| SubmissionError::Rejected(format!("signature verification failed: {}", e)))
    }
}

/// Local Ed25519 keystore.
///
/// Starts locked unless built from a seed. A locked keystore reports
/// [`SigningError::Unavailable`] for every call.
#[derive(Default)]
pub struct Keystore {
    key: RwLock<Option<SigningKey>>,
}

impl Keystore {
    /// Keystore with no credentials
    pub fn locked() -> Self {
        Self::default()
    }

    /// Deterministic keystore from a seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: RwLock::new(Some(SigningKey::from_bytes(seed))),
        }
    }

    /// Load a hex-encoded 32-byte seed from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let seed = parse_seed(&contents)?;
        Ok(Self::from_seed(&seed))
    }

    /// Replace the loaded key
    pub fn unlock(&self, seed: &[u8; 32]) {
        *self.key.write() = Some(SigningKey::from_bytes(seed));
    }

    /// Drop the loaded key
    pub fn lock(&self) {
        *self.key.write() = None;
    }

    /// True if a key is loaded
    pub fn is_unlocked(&self) -> bool {
        self.key.read().is_some()
    }

    /// Public key of the loaded key
    pub fn public_key(&self) -> Option<[u8; 32]> {
        self.key.read().as_ref().map(|k| k.verifying_key().to_bytes())
    }
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}

fn parse_seed(contents: &str) -> Result<[u8; 32]> {
    let digits = contents.trim();
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    let mut seed = [0u8; 32];
    hex::decode_to_slice(digits, &mut seed)
        .map_err(|e| Error::Config(format!("keystore seed must be 32 hex-encoded bytes: {}", e)))?;
    Ok(seed)
}

#[async_trait]
impl Signer for Keystore {
    fn account(&self) -> std::result::Result<Address, SigningError> {
        self.public_key()
            .map(|pk| address_from_public_key(&pk))
            .ok_or(SigningError::Unavailable)
    }

    async fn authorize(
        &self,
        operation: Operation,
        params: &Params,
    ) -> std::result::Result<SignedEnvelope, SigningError> {
        let key = self.key.read().clone().ok_or(SigningError::Unavailable)?;
        let public_key = key.verifying_key().to_bytes();

        let mut envelope = SignedEnvelope {
            operation,
            params: params.clone(),
            signer: address_from_public_key(&public_key),
            public_key,
            nonce: Uuid::new_v4(),
            issued_at: chrono::Utc::now().timestamp_millis(),
            signature: Vec::new(),
        };

        let message = envelope
            .signing_bytes()
            .map_err(|e| SigningError::Unauthorized(e.to_string()))?;
        envelope.signature = key.sign(&message).to_bytes().to_vec();

        Ok(envelope)
    }
}
