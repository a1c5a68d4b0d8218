//! Concurrency test: parallel key store mutation.
//!
//! Validates that store instances are safe to share across threads and
//! that the per-identifier semantics hold under contention.

use std::sync::Arc;
use std::thread;

use signet_custody::{
    ConstantRetriever, CustodyError, HardwareConfig, HardwareKeyStore, KeyStore, MemoryKeyStore,
    PrivateKey, Role, SoftToken,
};

#[test]
fn stress_concurrent_memory_store_adds() {
    let store = Arc::new(MemoryKeyStore::new(ConstantRetriever::shared("pass")));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let key = PrivateKey::generate();
                store.add_key(key.id(), &Role::Targets, &key).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.list_keys().len(), 400);
}

#[test]
fn stress_concurrent_add_same_id_exactly_one_wins() {
    let store = Arc::new(MemoryKeyStore::new(ConstantRetriever::shared("pass")));
    let key = Arc::new(PrivateKey::generate());

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        let key = Arc::clone(&key);
        let role = if i % 2 == 0 { Role::Root } else { Role::Targets };
        handles.push(thread::spawn(move || {
            store.add_key(key.id(), &role, &key).is_ok()
        }));
    }

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&ok| ok)
        .count();
    assert_eq!(successes, 1);
    // Whichever role won, the binding exists exactly once.
    assert_eq!(store.list_keys().len(), 1);
}

#[test]
fn stress_concurrent_hardware_adds_respect_capacity() {
    let token = Arc::new(SoftToken::new(4, "123456"));
    let store = Arc::new(
        HardwareKeyStore::new(
            token,
            None,
            ConstantRetriever::shared("123456"),
            HardwareConfig {
                num_slots: 4,
                require_touch: false,
            },
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let key = PrivateKey::generate();
            match store.add_key(key.id(), &Role::Root, &key) {
                Ok(()) => true,
                Err(CustodyError::StoreFull) => false,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }));
    }

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&ok| ok)
        .count();

    // Exactly the ceiling's worth of adds succeed; the rest fail cleanly.
    assert_eq!(successes, 4);
    assert_eq!(store.list_keys().len(), 4);
}
