//! Ed25519 private signing keys.
//!
//! A key's identifier is derived deterministically from its public key, so
//! the same key material always maps to the same identifier regardless of
//! which store holds it.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{CustodyError, Result};

/// Algorithm tag for Ed25519 keys.
pub const ALGORITHM_ED25519: &str = "ed25519";

/// An Ed25519 private signing key with its derived identifier.
///
/// Immutable once constructed. The signing key bytes are zeroized on drop.
pub struct PrivateKey {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    id: String,
}

impl PrivateKey {
    /// Generate a new random private key.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::thread_rng());
        Self::from_signing_key(signing_key)
    }

    /// Reconstruct a private key from raw signing key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(bytes))
    }

    /// Reconstruct a private key from a byte slice that must be 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CustodyError::InvalidKey("signing key must be 32 bytes".to_string()))?;
        Ok(Self::from_bytes(&arr))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let id = key_id(&verifying_key);
        Self {
            signing_key,
            verifying_key,
            id,
        }
    }

    /// The stable identifier: lowercase hex SHA-256 of the public key bytes.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Algorithm tag.
    pub fn algorithm(&self) -> &'static str {
        ALGORITHM_ED25519
    }

    /// The corresponding public key bytes.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// The raw signing key bytes. Caller must zeroize after use.
    pub fn private_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message with this key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

/// Derive the stable key identifier from a public key.
pub fn key_id(verifying_key: &VerifyingKey) -> String {
    let digest = Sha256::digest(verifying_key.to_bytes());
    hex::encode(digest)
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
            verifying_key: self.verifying_key,
            id: self.id.clone(),
        }
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        // Identifier is a digest of the public key; equal ids mean equal keys
        // for all custody purposes.
        self.id == other.id
    }
}

impl Eq for PrivateKey {}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("id", &self.id)
            .field("algorithm", &ALGORITHM_ED25519)
            .finish_non_exhaustive()
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        // SigningKey stores bytes internally; zeroize via conversion
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}
