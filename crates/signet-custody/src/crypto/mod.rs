//! Cryptographic primitives: signing keys, passphrase-based encryption,
//! and secure randomness.

pub mod encryption;
pub mod keys;
pub mod random;

pub use keys::PrivateKey;
