//! Hardware-token key storage.
//!
//! Wraps a finite-slot [`Token`](crate::token::Token): every private key
//! lives on the token, optionally mirrored (encrypted) into a backup key
//! store at add time. An in-process cache maps key identifiers to slot
//! locations and roles so listings do not re-enumerate the whole token on
//! every call.
//!
//! The token is the source of truth and the cache is only a hint: any
//! lookup miss or stale entry triggers a full re-enumeration. Another
//! process (or another store instance over the same token) may mutate
//! slots at any time; this backend detects that through re-enumeration
//! rather than assuming exclusive ownership.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::crypto::PrivateKey;
use crate::encoding;
use crate::error::{CustodyError, Result};
use crate::keystore::{KeyInfo, KeyStore};
use crate::passphrase::{Retriever, HARDWARE_PIN_ALIAS, MAX_ATTEMPTS};
use crate::role::Role;
use crate::token::{ManagedKey, Session, SlotContents, SlotId, Token};

const STORE_NAME: &str = "hardware";

/// Default conservative slot ceiling.
const DEFAULT_NUM_SLOTS: u8 = 4;

/// Hardware backend configuration, fixed at construction.
///
/// `num_slots` is a conservative policy ceiling on how many keys this
/// store manages, not a hardware fact: the physical token may hold more,
/// and is never assumed to reject writes beyond the ceiling.
/// `require_touch` is recorded on every key this store writes; it replaces
/// the process-wide key-mode switch older systems used, so a test that
/// needs touchless keys constructs a differently-configured store instead
/// of mutating shared state.
#[derive(Debug, Clone, Copy)]
pub struct HardwareConfig {
    pub num_slots: u8,
    pub require_touch: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            num_slots: DEFAULT_NUM_SLOTS,
            require_touch: true,
        }
    }
}

type SlotCache = HashMap<String, (SlotId, Role)>;

/// Key store backed by a session-based hardware token.
pub struct HardwareKeyStore {
    token: Arc<dyn Token>,
    backup: Option<Arc<dyn KeyStore>>,
    retriever: Arc<dyn Retriever>,
    config: HardwareConfig,
    // Also serializes this instance's token traffic: every operation holds
    // the cache lock for its full session.
    cache: Mutex<SlotCache>,
}

impl HardwareKeyStore {
    /// Connect to `token`.
    ///
    /// `backup` receives an encrypted mirror of every key added through
    /// `add_key` (never of imported keys). The retriever supplies the
    /// token PIN under the fixed [`HARDWARE_PIN_ALIAS`], and passphrases
    /// for validating imported encodings.
    ///
    /// A fresh instance always starts with an empty cache; the first
    /// operation re-enumerates the token.
    ///
    /// # Errors
    ///
    /// Returns `Hardware` if the token is not reachable.
    pub fn new(
        token: Arc<dyn Token>,
        backup: Option<Arc<dyn KeyStore>>,
        retriever: Arc<dyn Retriever>,
        config: HardwareConfig,
    ) -> Result<Self> {
        // Probe for token presence; the session closes on drop.
        token.open_session()?;
        Ok(Self {
            token,
            backup,
            retriever,
            config,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn lock_cache(&self) -> MutexGuard<'_, SlotCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open and authenticate a session, retrying the PIN up to
    /// [`MAX_ATTEMPTS`] times or until the retriever gives up.
    fn open_authenticated(&self) -> Result<Box<dyn Session + '_>> {
        let mut session = self.token.open_session()?;
        for attempt in 0..MAX_ATTEMPTS {
            let (pin, give_up) = self
                .retriever
                .get_passphrase(HARDWARE_PIN_ALIAS, STORE_NAME, attempt)
                .map_err(|_| CustodyError::AuthenticationFailed)?;
            match session.authenticate(&pin) {
                Ok(()) => return Ok(session),
                Err(CustodyError::AuthenticationFailed) if !give_up => continue,
                Err(e) => return Err(e),
            }
        }
        Err(CustodyError::AuthenticationFailed)
    }

    /// Re-enumerate every physical slot and rebuild the cache from what is
    /// actually on the token.
    fn refresh_cache(&self, session: &mut dyn Session, cache: &mut SlotCache) -> Result<()> {
        cache.clear();
        for i in 0..session.num_slots() {
            let slot = SlotId(i);
            if let SlotContents::Managed(key) = session.read_slot(slot)? {
                cache.insert(key.key_id.clone(), (slot, key.role.clone()));
            }
        }
        Ok(())
    }

    /// Locate a managed key, consulting the cache first and falling back
    /// to re-enumeration when the cache misses or turns out stale.
    fn locate(
        &self,
        session: &mut dyn Session,
        cache: &mut SlotCache,
        key_id: &str,
    ) -> Result<(SlotId, ManagedKey)> {
        if let Some((slot, _)) = cache.get(key_id) {
            let slot = *slot;
            if let SlotContents::Managed(key) = session.read_slot(slot)? {
                if key.key_id == key_id {
                    return Ok((slot, key));
                }
            }
            // Stale entry: another instance moved or removed the key.
            debug!("cache entry for key {key_id} is stale; re-enumerating token");
        }

        self.refresh_cache(session, cache)?;
        if let Some((slot, _)) = cache.get(key_id) {
            let slot = *slot;
            if let SlotContents::Managed(key) = session.read_slot(slot)? {
                if key.key_id == key_id {
                    return Ok((slot, key));
                }
            }
        }
        Err(CustodyError::KeyNotFound(key_id.to_string()))
    }

    /// Write a key into the first free slot within the configured ceiling,
    /// skipping occupied and foreign slots.
    ///
    /// Re-enumerates first so a concurrent instance's writes are seen
    /// before choosing a slot.
    fn write_to_token(
        &self,
        session: &mut dyn Session,
        cache: &mut SlotCache,
        key_id: &str,
        role: &Role,
        key: &PrivateKey,
    ) -> Result<SlotId> {
        self.refresh_cache(session, cache)?;
        if cache.contains_key(key_id) {
            return Err(CustodyError::KeyExists(key_id.to_string()));
        }

        let ceiling = self.config.num_slots.min(session.num_slots());
        let mut free = None;
        for i in 0..ceiling {
            if let SlotContents::Empty = session.read_slot(SlotId(i))? {
                free = Some(SlotId(i));
                break;
            }
        }
        let slot = free.ok_or(CustodyError::StoreFull)?;

        let managed = ManagedKey {
            key_id: key_id.to_string(),
            role: role.clone(),
            secret: key.private_bytes(),
            touch_required: self.config.require_touch,
        };
        session.write_slot(slot, &managed)?;
        cache.insert(key_id.to_string(), (slot, role.clone()));
        debug!("wrote key {key_id} to token {slot}");
        Ok(slot)
    }
}

impl KeyStore for HardwareKeyStore {
    fn add_key(&self, key_id: &str, role: &Role, key: &PrivateKey) -> Result<()> {
        let mut cache = self.lock_cache();
        let mut session = self.open_authenticated()?;
        let slot = self.write_to_token(session.as_mut(), &mut cache, key_id, role, key)?;

        // Mirror an encrypted copy into the backup store. If the mirror
        // fails the token write is rolled back: a key that was requested
        // with a backup must not exist only on the token.
        if let Some(backup) = &self.backup {
            if let Err(e) = backup.add_key(key_id, role, key) {
                warn!("backup of key {key_id} failed; rolling back token write");
                if let Err(erase_err) = session.erase_slot(slot) {
                    warn!("rollback erase of {slot} failed: {erase_err}");
                }
                cache.remove(key_id);
                return Err(e);
            }
        }
        Ok(())
    }

    fn get_key(&self, key_id: &str) -> Result<(PrivateKey, Role)> {
        let mut cache = self.lock_cache();
        let mut session = self.open_authenticated()?;
        let (_, managed) = self.locate(session.as_mut(), &mut cache, key_id)?;
        Ok((
            PrivateKey::from_bytes(&managed.secret),
            managed.role.clone(),
        ))
    }

    fn remove_key(&self, key_id: &str) -> Result<()> {
        let mut cache = self.lock_cache();
        let mut session = self.open_authenticated()?;
        let (slot, _) = self.locate(session.as_mut(), &mut cache, key_id)?;
        session.erase_slot(slot)?;
        cache.remove(key_id);
        debug!("erased key {key_id} from token {slot}");
        // The backup copy, if any, is left in place; removing it is a
        // separate, explicit operation on the backup store.
        Ok(())
    }

    fn list_keys(&self) -> HashMap<String, KeyInfo> {
        let mut cache = self.lock_cache();
        let result = self
            .open_authenticated()
            .and_then(|mut session| self.refresh_cache(session.as_mut(), &mut cache));
        if let Err(e) = result {
            warn!("token enumeration failed, returning empty listing: {e}");
            return HashMap::new();
        }
        cache
            .iter()
            .map(|(id, (slot, role))| {
                (
                    id.clone(),
                    KeyInfo {
                        role: role.clone(),
                        location: slot.to_string(),
                    },
                )
            })
            .collect()
    }

    fn import_key(&self, encoded: &[u8], key_id: &str) -> Result<()> {
        // Decrypt only to validate structure and identity. An imported key
        // is treated as already backed up by the importer, so it goes onto
        // the token and deliberately never into the backup store.
        let (key, role) =
            encoding::decrypt_with_retriever(encoded, key_id, STORE_NAME, self.retriever.as_ref())?;
        if key.id() != key_id {
            return Err(CustodyError::InvalidKey(format!(
                "encoded key has id {}, expected {key_id}",
                key.id(),
            )));
        }

        let mut cache = self.lock_cache();
        let mut session = self.open_authenticated()?;
        self.write_to_token(session.as_mut(), &mut cache, key_id, &role, &key)?;
        Ok(())
    }

    fn export_key(&self, _key_id: &str) -> Result<Vec<u8>> {
        // Keys do not leave the token through this store.
        Err(CustodyError::ExportUnsupported(STORE_NAME))
    }

    fn name(&self) -> &'static str {
        STORE_NAME
    }
}
