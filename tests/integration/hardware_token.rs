//! Hardware-backend workflows against a shared token: capacity, backup
//! mirroring, and import semantics across store instances.

use std::sync::Arc;

use signet_custody::encoding;
use signet_custody::{
    ConstantRetriever, CustodyError, FileKeyStore, HardwareConfig, HardwareKeyStore, KeyStore,
    PrivateKey, Role, SoftToken,
};

const PIN: &str = "123456";

fn config() -> HardwareConfig {
    HardwareConfig {
        num_slots: 4,
        require_touch: false,
    }
}

fn open_store(token: Arc<SoftToken>, backup: Option<Arc<dyn KeyStore>>) -> HardwareKeyStore {
    HardwareKeyStore::new(token, backup, ConstantRetriever::shared(PIN), config()).unwrap()
}

#[test]
fn capacity_listing_never_exceeds_live_adds() {
    let token = Arc::new(SoftToken::new(4, PIN));
    let store = open_store(token, None);

    let mut ids = Vec::new();
    for _ in 0..4 {
        let key = PrivateKey::generate();
        store.add_key(key.id(), &Role::Root, &key).unwrap();
        ids.push(key.id().to_string());
    }

    // Every successful add appears exactly once with its role.
    let listing = store.list_keys();
    assert_eq!(listing.len(), 4);
    for id in &ids {
        assert_eq!(listing[id].role, Role::Root);
    }

    // Beyond capacity the operation fails, not the process, and the
    // listing stays at adds minus removals.
    let extra = PrivateKey::generate();
    assert!(matches!(
        store.add_key(extra.id(), &Role::Root, &extra),
        Err(CustodyError::StoreFull)
    ));
    assert_eq!(store.list_keys().len(), 4);

    store.remove_key(&ids[0]).unwrap();
    assert_eq!(store.list_keys().len(), 3);

    // The freed slot is reusable.
    store.add_key(extra.id(), &Role::Targets, &extra).unwrap();
    assert_eq!(store.list_keys().len(), 4);
}

#[test]
fn import_bypasses_file_backup_and_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let token = Arc::new(SoftToken::new(4, PIN));
    let backup: Arc<dyn KeyStore> =
        Arc::new(FileKeyStore::new(dir.path(), ConstantRetriever::shared(PIN)).unwrap());
    let store = open_store(token.clone(), Some(backup.clone()));

    // An added key is mirrored into the backup store...
    let added = PrivateKey::generate();
    store.add_key(added.id(), &Role::Targets, &added).unwrap();
    assert!(backup.get_key(added.id()).is_ok());

    // ...but an imported key is not: the importer is presumed to hold its
    // own backup already.
    let imported = PrivateKey::generate();
    let encoded = encoding::encrypt_key(&imported, &Role::Root, PIN).unwrap();
    store.import_key(&encoded, imported.id()).unwrap();
    assert!(matches!(
        backup.get_key(imported.id()),
        Err(CustodyError::KeyNotFound(_))
    ));

    // A fresh store over the same token (empty cache) recovers the
    // imported key and its role from the token alone.
    let fresh = open_store(token, None);
    let (got, role) = fresh.get_key(imported.id()).unwrap();
    assert_eq!(got, imported);
    assert_eq!(role, Role::Root);
}

#[test]
fn two_instances_share_one_token() {
    let token = Arc::new(SoftToken::new(4, PIN));
    let store_a = open_store(token.clone(), None);
    let store_b = open_store(token, None);

    let key = PrivateKey::generate();
    store_a.add_key(key.id(), &Role::Snapshot, &key).unwrap();

    // B never saw the add but finds the key by enumerating the token.
    let (got, role) = store_b.get_key(key.id()).unwrap();
    assert_eq!(got, key);
    assert_eq!(role, Role::Snapshot);

    // B removes it; A's stale cache must not resurrect it.
    store_b.remove_key(key.id()).unwrap();
    assert!(matches!(
        store_a.get_key(key.id()),
        Err(CustodyError::KeyNotFound(_))
    ));
    assert!(store_a.list_keys().is_empty());
}
