//! Pluggable key storage.
//!
//! One [`KeyStore`] contract, three backends with divergent failure and
//! capacity behavior:
//!
//! - [`MemoryKeyStore`] — volatile, process-local.
//! - [`FileKeyStore`] — one encrypted envelope file per key.
//! - [`HardwareKeyStore`] — finite-slot hardware token with an optional
//!   backup store.
//!
//! Within one store a key identifier maps to at most one (key, role) pair.
//! Backend-specific outcomes (`StoreFull`, `Hardware`) are additional error
//! variants on [`CustodyError`](crate::error::CustodyError), not separate
//! error types.

use std::collections::HashMap;

use crate::crypto::PrivateKey;
use crate::error::Result;
use crate::role::Role;

pub mod file;
pub mod hardware;
pub mod memory;

pub use file::FileKeyStore;
pub use hardware::{HardwareConfig, HardwareKeyStore};
pub use memory::MemoryKeyStore;

/// Listing entry: the role a key is bound to and a human-readable hint for
/// where the key lives. Never exposes key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub role: Role,
    pub location: String,
}

/// Common contract over all key storage backends.
///
/// All backends fail `add_key` with `KeyExists` when the identifier is
/// already present, including re-adding the identical key — no backend
/// silently rebinds a role. `remove_key` of an absent identifier fails
/// with `KeyNotFound`; removal is not idempotent.
///
/// Operations that trigger decryption or token authentication may block on
/// the store's passphrase retriever with no internal timeout.
pub trait KeyStore: Send + Sync {
    /// Store `key` under `key_id` bound to `role`.
    fn add_key(&self, key_id: &str, role: &Role, key: &PrivateKey) -> Result<()>;

    /// Retrieve the key and its role.
    fn get_key(&self, key_id: &str) -> Result<(PrivateKey, Role)>;

    /// Remove the key. The second removal of the same id is an error.
    fn remove_key(&self, key_id: &str) -> Result<()>;

    /// Snapshot of the store's contents. Later mutations do not
    /// retroactively invalidate a returned listing.
    fn list_keys(&self) -> HashMap<String, KeyInfo>;

    /// Install an already-encrypted key encoding under `key_id`,
    /// decrypting only to validate structure and identity.
    fn import_key(&self, encoded: &[u8], key_id: &str) -> Result<()>;

    /// Return the password-protected encoding of a stored key without
    /// exposing plaintext key material. Not every backend supports export;
    /// unsupported backends fail with `ExportUnsupported`.
    fn export_key(&self, key_id: &str) -> Result<Vec<u8>>;

    /// Short backend name for logs and error context.
    fn name(&self) -> &'static str;
}
