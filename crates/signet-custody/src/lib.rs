//! Signet Custody — key custody and certificate trust for a
//! content-signing platform.
//!
//! One [`KeyStore`](keystore::KeyStore) contract over three storage
//! substrates — encrypted files on disk, transient memory, and a
//! finite-slot hardware token driven through a session protocol — plus a
//! durable X.509 [`CertificateStore`](certs::CertificateStore) that
//! authorizes keys for trust roles.
//!
//! Key material is encrypted at rest with ChaCha20-Poly1305 under a key
//! derived from a caller-supplied passphrase
//! ([`passphrase::Retriever`]) via Argon2id and HKDF-SHA256.

pub mod certs;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod keystore;
pub mod passphrase;
pub mod role;
pub mod token;

mod fsutil;

// Re-export primary types
pub use certs::{Certificate, CertificateStore};
pub use crypto::PrivateKey;
pub use error::{CustodyError, Result};
pub use keystore::{
    FileKeyStore, HardwareConfig, HardwareKeyStore, KeyInfo, KeyStore, MemoryKeyStore,
};
pub use passphrase::{ConstantRetriever, Retriever};
pub use role::Role;
pub use token::{SlotId, SoftToken, Token};
