//! File-backed key storage.
//!
//! One password-encrypted envelope file per key identifier under a
//! caller-supplied root directory: `{root}/{key_id}.key`. The role is
//! recovered from envelope metadata at read time, never inferred from the
//! path. Writes are atomic (sibling temp file + rename).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use log::warn;

use crate::crypto::PrivateKey;
use crate::encoding;
use crate::error::{CustodyError, Result};
use crate::fsutil::write_atomic;
use crate::keystore::{KeyInfo, KeyStore};
use crate::passphrase::Retriever;
use crate::role::Role;

const STORE_NAME: &str = "file";

/// File extension for key envelope files.
const KEY_EXTENSION: &str = "key";

/// Persistent key store: one encrypted envelope file per key.
///
/// A listing cache (id → role) is built by scanning the root directory at
/// construction and kept current by this instance's own mutations, so
/// `list_keys` never needs a passphrase.
pub struct FileKeyStore {
    root: PathBuf,
    retriever: Arc<dyn Retriever>,
    cache: RwLock<HashMap<String, Role>>,
}

impl FileKeyStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Scans existing envelope files to build the listing cache. Files that
    /// cannot be parsed are skipped with a warning rather than failing the
    /// whole store.
    ///
    /// # Errors
    ///
    /// Returns `CustodyError::Io` if the root directory cannot be created
    /// or read.
    pub fn new(root: impl Into<PathBuf>, retriever: Arc<dyn Retriever>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let mut cache = HashMap::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_EXTENSION) {
                continue;
            }
            let Some(key_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read(&path).map_err(CustodyError::from) {
                Ok(encoded) => match encoding::read_role(&encoded) {
                    Ok(role) => {
                        cache.insert(key_id.to_string(), role);
                    }
                    Err(e) => warn!("skipping unreadable key file {}: {e}", path.display()),
                },
                Err(e) => warn!("skipping unreadable key file {}: {e}", path.display()),
            }
        }

        Ok(Self {
            root,
            retriever,
            cache: RwLock::new(cache),
        })
    }

    /// Filesystem path for a key id: `{root}/{key_id}.key`.
    fn key_path(&self, key_id: &str) -> PathBuf {
        self.root.join(format!("{key_id}.{KEY_EXTENSION}"))
    }

    /// Read an envelope file, mapping a missing file to `KeyNotFound`.
    fn read_envelope(&self, key_id: &str) -> Result<Vec<u8>> {
        std::fs::read(self.key_path(key_id)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CustodyError::KeyNotFound(key_id.to_string())
            } else {
                CustodyError::Io(e)
            }
        })
    }

    /// Install envelope bytes for `key_id` and record its role, refusing
    /// to overwrite an existing entry.
    fn install(&self, key_id: &str, role: Role, encoded: &[u8]) -> Result<()> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let path = self.key_path(key_id);
        if cache.contains_key(key_id) || path.exists() {
            return Err(CustodyError::KeyExists(key_id.to_string()));
        }
        write_atomic(&path, encoded)?;
        cache.insert(key_id.to_string(), role);
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn add_key(&self, key_id: &str, role: &Role, key: &PrivateKey) -> Result<()> {
        let (passphrase, _) = self.retriever.get_passphrase(key_id, STORE_NAME, 0)?;
        let encoded = encoding::encrypt_key(key, role, &passphrase)?;
        self.install(key_id, role.clone(), &encoded)
    }

    fn get_key(&self, key_id: &str) -> Result<(PrivateKey, Role)> {
        let encoded = self.read_envelope(key_id)?;
        encoding::decrypt_with_retriever(&encoded, key_id, STORE_NAME, self.retriever.as_ref())
    }

    fn remove_key(&self, key_id: &str) -> Result<()> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let path = self.key_path(key_id);
        if !path.exists() {
            return Err(CustodyError::KeyNotFound(key_id.to_string()));
        }
        std::fs::remove_file(&path)?;
        cache.remove(key_id);
        Ok(())
    }

    fn list_keys(&self) -> HashMap<String, KeyInfo> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache
            .iter()
            .map(|(id, role)| {
                (
                    id.clone(),
                    KeyInfo {
                        role: role.clone(),
                        location: self.key_path(id).display().to_string(),
                    },
                )
            })
            .collect()
    }

    fn import_key(&self, encoded: &[u8], key_id: &str) -> Result<()> {
        // Decrypt only to validate structure and identity; the encoding is
        // installed as supplied, under its original passphrase.
        let (key, role) =
            encoding::decrypt_with_retriever(encoded, key_id, STORE_NAME, self.retriever.as_ref())?;
        if key.id() != key_id {
            return Err(CustodyError::InvalidKey(format!(
                "encoded key has id {}, expected {key_id}",
                key.id(),
            )));
        }
        self.install(key_id, role, encoded)
    }

    fn export_key(&self, key_id: &str) -> Result<Vec<u8>> {
        self.read_envelope(key_id)
    }

    fn name(&self) -> &'static str {
        STORE_NAME
    }
}

impl std::fmt::Debug for FileKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
