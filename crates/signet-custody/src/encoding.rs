//! Password-encrypted key encoding.
//!
//! A key encoding is the portable, text-safe form of one private key: a
//! JSON envelope carrying the associated role as plaintext metadata and the
//! signing key bytes encrypted with ChaCha20-Poly1305 under a key derived
//! from a passphrase via Argon2id + HKDF-SHA256.
//!
//! Envelope format (JSON):
//! ```json
//! {
//!     "version": 1,
//!     "format": "signet-key-v1",
//!     "role": "root",
//!     "algorithm": "ed25519",
//!     "encryption": {
//!         "algorithm": "chacha20-poly1305",
//!         "kdf": "argon2id",
//!         "salt": "<base64-16-bytes>",
//!         "nonce": "<base64-12-bytes>"
//!     },
//!     "encrypted_key": "<base64-ciphertext>"
//! }
//! ```
//!
//! The role is deliberately outside the ciphertext so listings can recover
//! it without a passphrase. A wrong passphrase fails with
//! `PassphraseInvalid` (AEAD authentication); a malformed envelope fails
//! with `EncodingInvalid` — the two are always distinguishable.

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::keys::ALGORITHM_ED25519;
use crate::crypto::{encryption, random, PrivateKey};
use crate::error::{CustodyError, Result};
use crate::passphrase::{Retriever, MAX_ATTEMPTS};
use crate::role::Role;

// ── Envelope format constants ─────────────────────────────────────────────────

const KEY_VERSION: u32 = 1;
const KEY_FORMAT: &str = "signet-key-v1";
const KEY_ALGORITHM: &str = "chacha20-poly1305";
const KEY_KDF: &str = "argon2id";

/// HKDF context string for deriving the envelope encryption key from the
/// Argon2id master key. Must remain stable across versions.
const KEY_ENCRYPTION_CONTEXT: &str = "signet-custody/key-encryption";

// ── On-disk structures ────────────────────────────────────────────────────────

/// Top-level envelope structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyEnvelope {
    /// Format version number.
    pub version: u32,
    /// Format identifier string.
    pub format: String,
    /// Trust role the key is bound to (plaintext metadata).
    pub role: Role,
    /// Signing algorithm of the enclosed key.
    pub algorithm: String,
    /// Encryption parameters needed for decryption.
    pub encryption: EncryptionMetadata,
    /// Base64-encoded ciphertext of the signing key bytes.
    pub encrypted_key: String,
}

/// Encryption metadata stored alongside the ciphertext.
#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    /// Symmetric cipher used.
    pub algorithm: String,
    /// Key derivation function used.
    pub kdf: String,
    /// Base64-encoded Argon2id salt (16 bytes).
    pub salt: String,
    /// Base64-encoded ChaCha20-Poly1305 nonce (12 bytes).
    pub nonce: String,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encrypt a private key into an encoding bound to `role`.
pub fn encrypt_key(key: &PrivateKey, role: &Role, passphrase: &str) -> Result<Vec<u8>> {
    let salt = random::random_salt_16();
    let mut encryption_key =
        encryption::derive_envelope_key(passphrase.as_bytes(), &salt, KEY_ENCRYPTION_CONTEXT)?;

    let mut plaintext = key.private_bytes();
    let (nonce, ciphertext) = encryption::encrypt(&encryption_key, &plaintext)?;
    encryption_key.zeroize();
    plaintext.zeroize();

    let envelope = KeyEnvelope {
        version: KEY_VERSION,
        format: KEY_FORMAT.to_string(),
        role: role.clone(),
        algorithm: ALGORITHM_ED25519.to_string(),
        encryption: EncryptionMetadata {
            algorithm: KEY_ALGORITHM.to_string(),
            kdf: KEY_KDF.to_string(),
            salt: b64_encode(&salt),
            nonce: b64_encode(&nonce),
        },
        encrypted_key: b64_encode(&ciphertext),
    };

    let json = serde_json::to_string_pretty(&envelope)
        .map_err(|e| CustodyError::SerializationError(e.to_string()))?;

    Ok(json.into_bytes())
}

/// Decrypt a key encoding back into its private key and role.
///
/// # Errors
///
/// Returns `PassphraseInvalid` if the passphrase is wrong and
/// `EncodingInvalid` if the envelope is malformed.
pub fn decrypt_key(encoded: &[u8], passphrase: &str) -> Result<(PrivateKey, Role)> {
    let envelope = parse_envelope(encoded)?;

    let salt_bytes = b64_decode(&envelope.encryption.salt, "salt")?;
    let salt: [u8; 16] = salt_bytes
        .try_into()
        .map_err(|_| CustodyError::EncodingInvalid("salt must be 16 bytes".to_string()))?;

    let nonce = b64_decode(&envelope.encryption.nonce, "nonce")?;
    let ciphertext = b64_decode(&envelope.encrypted_key, "encrypted_key")?;

    let mut encryption_key =
        encryption::derive_envelope_key(passphrase.as_bytes(), &salt, KEY_ENCRYPTION_CONTEXT)?;
    let decrypted = encryption::decrypt(&encryption_key, &nonce, &ciphertext);
    encryption_key.zeroize();
    let mut key_bytes = decrypted?;

    let key = PrivateKey::from_slice(&key_bytes);
    key_bytes.zeroize();

    Ok((key?, envelope.role))
}

/// Read the role metadata from an encoding without decrypting it.
pub fn read_role(encoded: &[u8]) -> Result<Role> {
    Ok(parse_envelope(encoded)?.role)
}

/// Decrypt an encoding by asking `retriever` for the passphrase, retrying
/// wrong passphrases up to [`MAX_ATTEMPTS`] times or until the retriever
/// gives up.
///
/// This is the bounded retry loop shared by the file and hardware backends.
pub fn decrypt_with_retriever(
    encoded: &[u8],
    key_id: &str,
    alias: &str,
    retriever: &dyn Retriever,
) -> Result<(PrivateKey, Role)> {
    for attempt in 0..MAX_ATTEMPTS {
        let (passphrase, give_up) = retriever.get_passphrase(key_id, alias, attempt)?;
        match decrypt_key(encoded, &passphrase) {
            Err(CustodyError::PassphraseInvalid) if !give_up => continue,
            other => return other,
        }
    }
    Err(CustodyError::PassphraseInvalid)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn parse_envelope(encoded: &[u8]) -> Result<KeyEnvelope> {
    let envelope: KeyEnvelope = serde_json::from_slice(encoded)
        .map_err(|e| CustodyError::EncodingInvalid(format!("failed to parse envelope: {e}")))?;

    if envelope.version != KEY_VERSION || envelope.format != KEY_FORMAT {
        return Err(CustodyError::EncodingInvalid(format!(
            "unsupported envelope version={} format={}",
            envelope.version, envelope.format,
        )));
    }

    if envelope.algorithm != ALGORITHM_ED25519 {
        return Err(CustodyError::EncodingInvalid(format!(
            "unsupported key algorithm: {}",
            envelope.algorithm,
        )));
    }

    Ok(envelope)
}

fn b64_encode(data: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, data)
}

fn b64_decode(data: &str, field: &str) -> Result<Vec<u8>> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
        .map_err(|e| CustodyError::EncodingInvalid(format!("invalid {field} base64: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passphrase::ConstantRetriever;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_encoding_round_trip() {
        let key = PrivateKey::generate();
        let encoded = encrypt_key(&key, &Role::Targets, "passphrase").unwrap();

        let (decrypted, role) = decrypt_key(&encoded, "passphrase").unwrap();
        assert_eq!(decrypted, key);
        assert_eq!(role, Role::Targets);
    }

    #[test]
    fn test_encoding_embeds_role_in_plaintext() {
        let key = PrivateKey::generate();
        let encoded = encrypt_key(&key, &Role::Delegated("targets/qa".to_string()), "p").unwrap();

        // Role is recoverable without the passphrase.
        let role = read_role(&encoded).unwrap();
        assert_eq!(role, Role::Delegated("targets/qa".to_string()));
    }

    #[test]
    fn test_encoding_does_not_leak_key_material() {
        let key = PrivateKey::generate();
        let encoded = encrypt_key(&key, &Role::Root, "passphrase").unwrap();

        let text = String::from_utf8(encoded).unwrap();
        let private_b64 = b64_encode(&key.private_bytes());
        assert!(!text.contains(&private_b64));
        assert!(!text.contains(&hex::encode(key.private_bytes())));
    }

    #[test]
    fn test_wrong_passphrase_distinguishable_from_malformed() {
        let key = PrivateKey::generate();
        let encoded = encrypt_key(&key, &Role::Root, "correct").unwrap();

        let wrong = decrypt_key(&encoded, "wrong");
        assert!(matches!(wrong, Err(CustodyError::PassphraseInvalid)));

        let malformed = decrypt_key(b"{\"not\": \"an envelope\"}", "correct");
        assert!(matches!(malformed, Err(CustodyError::EncodingInvalid(_))));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let key = PrivateKey::generate();
        let encoded = encrypt_key(&key, &Role::Root, "p").unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        value["version"] = serde_json::json!(99);
        let tampered = serde_json::to_vec(&value).unwrap();

        let result = decrypt_key(&tampered, "p");
        assert!(matches!(result, Err(CustodyError::EncodingInvalid(_))));
    }

    /// Retriever that yields wrong passphrases a fixed number of times
    /// before the correct one, counting calls.
    struct FlakyRetriever {
        correct: String,
        wrong_first: u32,
        calls: AtomicU32,
    }

    impl Retriever for FlakyRetriever {
        fn get_passphrase(
            &self,
            _key_id: &str,
            _alias: &str,
            num_attempts: u32,
        ) -> Result<(String, bool)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if num_attempts < self.wrong_first {
                Ok(("not it".to_string(), false))
            } else {
                Ok((self.correct.clone(), false))
            }
        }
    }

    #[test]
    fn test_retry_loop_recovers_within_bound() {
        let key = PrivateKey::generate();
        let encoded = encrypt_key(&key, &Role::Snapshot, "correct").unwrap();

        let retriever = FlakyRetriever {
            correct: "correct".to_string(),
            wrong_first: 2,
            calls: AtomicU32::new(0),
        };

        let (decrypted, role) =
            decrypt_with_retriever(&encoded, key.id(), "file", &retriever).unwrap();
        assert_eq!(decrypted, key);
        assert_eq!(role, Role::Snapshot);
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_loop_exhausts_attempts() {
        let key = PrivateKey::generate();
        let encoded = encrypt_key(&key, &Role::Snapshot, "correct").unwrap();

        let retriever = FlakyRetriever {
            correct: "correct".to_string(),
            wrong_first: MAX_ATTEMPTS, // never reaches the correct one
            calls: AtomicU32::new(0),
        };

        let result = decrypt_with_retriever(&encoded, key.id(), "file", &retriever);
        assert!(matches!(result, Err(CustodyError::PassphraseInvalid)));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[test]
    fn test_retry_loop_honors_give_up() {
        let key = PrivateKey::generate();
        let encoded = encrypt_key(&key, &Role::Root, "correct").unwrap();

        // ConstantRetriever signals give-up once an attempt has failed, so
        // the loop stops well before MAX_ATTEMPTS.
        let retriever = ConstantRetriever::new("wrong");
        let result = decrypt_with_retriever(&encoded, key.id(), "file", &retriever);
        assert!(matches!(result, Err(CustodyError::PassphraseInvalid)));
    }
}
