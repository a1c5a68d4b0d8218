//! End-to-end custody workflows across backends and the certificate
//! trust store.

use signet_custody::{
    CertificateStore, ConstantRetriever, CustodyError, FileKeyStore, KeyStore, MemoryKeyStore,
    PrivateKey, Role,
};

fn mint_cert(cn: &str) -> Vec<u8> {
    let mut params = rcgen::CertificateParams::default();
    params.distinguished_name = rcgen::DistinguishedName::new();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, cn);
    let key = rcgen::KeyPair::generate().unwrap();
    params.self_signed(&key).unwrap().der().to_vec()
}

#[test]
fn full_key_lifecycle_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileKeyStore::new(dir.path(), ConstantRetriever::shared("passphrase")).unwrap();

    // Generate a root key and add it.
    let key = PrivateKey::generate();
    let id = key.id().to_string();
    store.add_key(&id, &Role::Root, &key).unwrap();

    // Listing shows exactly that key with its role.
    let listing = store.list_keys();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[&id].role, Role::Root);

    // Remove it; the listing is empty and the key is gone.
    store.remove_key(&id).unwrap();
    assert!(store.list_keys().is_empty());
    assert!(matches!(
        store.get_key(&id),
        Err(CustodyError::KeyNotFound(_))
    ));
}

#[test]
fn export_from_file_import_into_memory() {
    let dir = tempfile::tempdir().unwrap();
    let retriever = ConstantRetriever::shared("shared-secret");
    let file_store = FileKeyStore::new(dir.path(), retriever.clone()).unwrap();
    let memory_store = MemoryKeyStore::new(retriever);

    let key = PrivateKey::generate();
    file_store
        .add_key(key.id(), &Role::Targets, &key)
        .unwrap();

    // The exported encoding moves between backends without ever exposing
    // plaintext key material in transit.
    let encoded = file_store.export_key(key.id()).unwrap();
    memory_store.import_key(&encoded, key.id()).unwrap();

    let (imported, role) = memory_store.get_key(key.id()).unwrap();
    assert_eq!(imported, key);
    assert_eq!(role, Role::Targets);
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = PrivateKey::generate();
    let delegated = Role::Delegated("targets/releases".to_string());
    {
        let store =
            FileKeyStore::new(dir.path(), ConstantRetriever::shared("passphrase")).unwrap();
        store.add_key(key.id(), &delegated, &key).unwrap();
    }

    let reopened = FileKeyStore::new(dir.path(), ConstantRetriever::shared("passphrase")).unwrap();
    let listing = reopened.list_keys();
    assert_eq!(listing[key.id()].role, delegated);

    let (got, role) = reopened.get_key(key.id()).unwrap();
    assert_eq!(got, key);
    assert_eq!(role, delegated);
}

#[test]
fn trust_removal_by_skid() {
    let dir = tempfile::tempdir().unwrap();
    let store = CertificateStore::new(dir.path().join("trust.json")).unwrap();

    let der = mint_cert("registry.example.com/library/app");
    let added = store.add_cert(&der).unwrap();
    let skid = added.skid().to_string();

    // The remove-trust flow: look the certificate up by SKID, then remove
    // exactly that certificate.
    let cert = store.get_certificate_by_skid(&skid).unwrap();
    store.remove_cert(&cert).unwrap();

    assert!(matches!(
        store.get_certificate_by_skid(&skid),
        Err(CustodyError::CertificateNotFound(_))
    ));

    // Removal is durable.
    let reopened = CertificateStore::new(dir.path().join("trust.json")).unwrap();
    assert!(reopened.is_empty());
}

#[test]
fn trust_set_durable_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trust.json");
    let skid;
    {
        let store = CertificateStore::new(&path).unwrap();
        skid = store
            .add_cert(&mint_cert("durable.example.com"))
            .unwrap()
            .skid()
            .to_string();
        store.add_cert(&mint_cert("second.example.com")).unwrap();
    }

    let reopened = CertificateStore::new(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    let found = reopened.get_certificate_by_skid(&skid).unwrap();
    assert_eq!(found.common_name(), "durable.example.com");
}
