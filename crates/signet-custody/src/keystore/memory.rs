//! Volatile in-memory key storage.
//!
//! Keys live decrypted in a process-local map and vanish on process exit.
//! Used as an ephemeral store in tests and as the backup target beneath
//! the hardware backend.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::crypto::PrivateKey;
use crate::encoding;
use crate::error::{CustodyError, Result};
use crate::keystore::{KeyInfo, KeyStore};
use crate::passphrase::Retriever;
use crate::role::Role;

const STORE_NAME: &str = "memory";

/// Process-local key store; no persistence.
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, (PrivateKey, Role)>>,
    retriever: Arc<dyn Retriever>,
}

impl MemoryKeyStore {
    /// Create an empty store. The retriever is used only to encrypt
    /// exports and decrypt imports; resident keys are held decrypted.
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            retriever,
        }
    }
}

impl KeyStore for MemoryKeyStore {
    fn add_key(&self, key_id: &str, role: &Role, key: &PrivateKey) -> Result<()> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.contains_key(key_id) {
            return Err(CustodyError::KeyExists(key_id.to_string()));
        }
        keys.insert(key_id.to_string(), (key.clone(), role.clone()));
        Ok(())
    }

    fn get_key(&self, key_id: &str) -> Result<(PrivateKey, Role)> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(key_id)
            .cloned()
            .ok_or_else(|| CustodyError::KeyNotFound(key_id.to_string()))
    }

    fn remove_key(&self, key_id: &str) -> Result<()> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.remove(key_id)
            .map(|_| ())
            .ok_or_else(|| CustodyError::KeyNotFound(key_id.to_string()))
    }

    fn list_keys(&self) -> HashMap<String, KeyInfo> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.iter()
            .map(|(id, (_, role))| {
                (
                    id.clone(),
                    KeyInfo {
                        role: role.clone(),
                        location: STORE_NAME.to_string(),
                    },
                )
            })
            .collect()
    }

    fn import_key(&self, encoded: &[u8], key_id: &str) -> Result<()> {
        let (key, role) =
            encoding::decrypt_with_retriever(encoded, key_id, STORE_NAME, self.retriever.as_ref())?;
        if key.id() != key_id {
            return Err(CustodyError::InvalidKey(format!(
                "encoded key has id {}, expected {key_id}",
                key.id(),
            )));
        }
        self.add_key(key_id, &role, &key)
    }

    fn export_key(&self, key_id: &str) -> Result<Vec<u8>> {
        let (key, role) = self.get_key(key_id)?;
        let (passphrase, _) = self.retriever.get_passphrase(key_id, STORE_NAME, 0)?;
        encoding::encrypt_key(&key, &role, &passphrase)
    }

    fn name(&self) -> &'static str {
        STORE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passphrase::ConstantRetriever;

    fn store() -> MemoryKeyStore {
        MemoryKeyStore::new(ConstantRetriever::shared("passphrase"))
    }

    #[test]
    fn test_memory_add_get_round_trip() {
        let store = store();
        let key = PrivateKey::generate();
        store.add_key(key.id(), &Role::Targets, &key).unwrap();

        let (got, role) = store.get_key(key.id()).unwrap();
        assert_eq!(got, key);
        assert_eq!(role, Role::Targets);
    }

    #[test]
    fn test_memory_add_existing_fails() {
        let store = store();
        let key = PrivateKey::generate();
        store.add_key(key.id(), &Role::Root, &key).unwrap();

        // Re-adding the identical key is still KeyExists; the role binding
        // never changes silently.
        let result = store.add_key(key.id(), &Role::Targets, &key);
        assert!(matches!(result, Err(CustodyError::KeyExists(_))));
        let (_, role) = store.get_key(key.id()).unwrap();
        assert_eq!(role, Role::Root);
    }

    #[test]
    fn test_memory_remove_twice_fails() {
        let store = store();
        let key = PrivateKey::generate();
        store.add_key(key.id(), &Role::Snapshot, &key).unwrap();

        store.remove_key(key.id()).unwrap();
        assert!(matches!(
            store.get_key(key.id()),
            Err(CustodyError::KeyNotFound(_))
        ));
        assert!(matches!(
            store.remove_key(key.id()),
            Err(CustodyError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_memory_list_is_snapshot() {
        let store = store();
        let key = PrivateKey::generate();
        store.add_key(key.id(), &Role::Timestamp, &key).unwrap();

        let listing = store.list_keys();
        store.remove_key(key.id()).unwrap();

        // The earlier snapshot still shows the key.
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[key.id()].role, Role::Timestamp);
        assert!(store.list_keys().is_empty());
    }

    #[test]
    fn test_memory_export_import_round_trip() {
        let store = store();
        let key = PrivateKey::generate();
        store.add_key(key.id(), &Role::Targets, &key).unwrap();

        let encoded = store.export_key(key.id()).unwrap();

        let other = self::store();
        other.import_key(&encoded, key.id()).unwrap();
        let (got, role) = other.get_key(key.id()).unwrap();
        assert_eq!(got, key);
        assert_eq!(role, Role::Targets);
    }

    #[test]
    fn test_memory_import_id_mismatch_rejected() {
        let store = store();
        let key = PrivateKey::generate();
        let encoded = encoding::encrypt_key(&key, &Role::Root, "passphrase").unwrap();

        let result = store.import_key(&encoded, "not-the-right-id");
        assert!(matches!(result, Err(CustodyError::InvalidKey(_))));
    }

    #[test]
    fn test_memory_export_unknown_key() {
        let store = store();
        assert!(matches!(
            store.export_key("missing"),
            Err(CustodyError::KeyNotFound(_))
        ));
    }
}
