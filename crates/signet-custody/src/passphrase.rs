//! Passphrase retrieval capability.
//!
//! Key stores never prompt for passphrases themselves. A caller-supplied
//! [`Retriever`] produces passphrases (and hardware PINs) on demand, with a
//! give-up signal that bounds retry loops. Prompting UI is the caller's
//! concern; this crate only defines the seam.

use std::sync::Arc;

use crate::error::Result;

/// Number of passphrase or PIN attempts a store makes before surfacing a
/// terminal error. The retriever can give up earlier via its second return
/// value.
pub const MAX_ATTEMPTS: u32 = 3;

/// Alias passed to the retriever when requesting the hardware token PIN.
/// The PIN is keyed by this fixed well-known alias, not a per-key id.
pub const HARDWARE_PIN_ALIAS: &str = "hardware";

/// A capability that produces passphrases on demand.
///
/// `key_id` identifies what the passphrase protects (a key identifier, or a
/// fixed alias such as [`HARDWARE_PIN_ALIAS`]). `alias` names the store
/// asking. `num_attempts` is how many attempts have already failed; a value
/// greater than zero tells the retriever the previous passphrase was wrong.
///
/// Returns `(passphrase, give_up)`. When `give_up` is true the caller must
/// not ask again for this operation. An `Err` means no passphrase is
/// available at all.
pub trait Retriever: Send + Sync {
    fn get_passphrase(&self, key_id: &str, alias: &str, num_attempts: u32)
        -> Result<(String, bool)>;
}

/// A retriever that always returns the same passphrase.
///
/// Gives up after the first failed attempt: returning the same wrong
/// passphrase again can never succeed.
pub struct ConstantRetriever {
    passphrase: String,
}

impl ConstantRetriever {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    /// Convenience constructor returning the trait object form stores take.
    pub fn shared(passphrase: impl Into<String>) -> Arc<dyn Retriever> {
        Arc::new(Self::new(passphrase))
    }
}

impl Retriever for ConstantRetriever {
    fn get_passphrase(
        &self,
        _key_id: &str,
        _alias: &str,
        num_attempts: u32,
    ) -> Result<(String, bool)> {
        Ok((self.passphrase.clone(), num_attempts > 0))
    }
}
