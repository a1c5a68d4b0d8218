//! Hardware token boundary.
//!
//! The hardware key store consumes a session-based token API: open a
//! session, authenticate with a PIN, then read, write, or erase individual
//! key slots. This module defines that boundary ([`Token`] / [`Session`])
//! and a process-local reference token ([`SoftToken`]) used by tests and
//! by deployments without real hardware.
//!
//! A session is a scoped acquisition: it is closed when the guard is
//! dropped, on every exit path including authentication failure. The
//! physical token accepts one command at a time, which [`SoftToken`]
//! models with an internal lock.

use std::sync::{Mutex, PoisonError};

use zeroize::Zeroize;

use crate::error::{CustodyError, Result};
use crate::role::Role;

/// One physical key-storage location on a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u8);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// A key resident in a token slot and managed by this system.
#[derive(Clone)]
pub struct ManagedKey {
    pub key_id: String,
    pub role: Role,
    pub secret: [u8; 32],
    /// Whether using this key requires a physical touch confirmation.
    pub touch_required: bool,
}

impl Drop for ManagedKey {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl std::fmt::Debug for ManagedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedKey")
            .field("key_id", &self.key_id)
            .field("role", &self.role)
            .field("touch_required", &self.touch_required)
            .finish_non_exhaustive()
    }
}

/// Contents of one token slot.
///
/// Foreign slots hold keys written by some other system; they are skipped
/// during allocation and never overwritten or erased.
#[derive(Debug, Clone)]
pub enum SlotContents {
    Empty,
    Managed(ManagedKey),
    Foreign,
}

/// An open token session.
///
/// Reads, writes, and erases require prior authentication; the slot count
/// is readable at any time. Dropping the session closes it.
pub trait Session {
    /// Authenticate the session with the operator PIN.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailed` on a wrong PIN; the session stays
    /// open and may be retried by the caller's policy.
    fn authenticate(&mut self, pin: &str) -> Result<()>;

    /// Physical slot count reported by the token.
    fn num_slots(&self) -> u8;

    /// Read the contents of a slot.
    fn read_slot(&mut self, slot: SlotId) -> Result<SlotContents>;

    /// Write a managed key into an empty slot.
    ///
    /// # Errors
    ///
    /// Returns `Hardware` if the slot is occupied; occupied slots are
    /// never overwritten.
    fn write_slot(&mut self, slot: SlotId, key: &ManagedKey) -> Result<()>;

    /// Erase a managed key from a slot. Erasing an empty slot is a no-op;
    /// foreign slots are refused.
    fn erase_slot(&mut self, slot: SlotId) -> Result<()>;
}

/// A hardware token reachable from this process.
pub trait Token: Send + Sync {
    /// Open a session with the token.
    ///
    /// # Errors
    ///
    /// Returns `Hardware` if the token is not present or not responding.
    fn open_session(&self) -> Result<Box<dyn Session + '_>>;
}

// ── SoftToken ─────────────────────────────────────────────────────────────────

/// In-process reference token.
///
/// Behaves like the hardware: sessions must authenticate before touching
/// slots, one command at a time, foreign slots are opaque. Sharing one
/// `SoftToken` behind an `Arc` across several store instances reproduces
/// the cross-instance slot races the hardware backend must tolerate.
pub struct SoftToken {
    pin: String,
    slots: Mutex<Vec<SlotContents>>,
}

impl SoftToken {
    /// Create a token with `num_slots` empty slots protected by `pin`.
    pub fn new(num_slots: u8, pin: impl Into<String>) -> Self {
        Self {
            pin: pin.into(),
            slots: Mutex::new(vec![SlotContents::Empty; num_slots as usize]),
        }
    }

    /// Mark a slot as holding a foreign key (written by another system).
    pub fn occupy_foreign(&self, slot: SlotId) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(contents) = slots.get_mut(slot.0 as usize) {
            *contents = SlotContents::Foreign;
        }
    }
}

impl Token for SoftToken {
    fn open_session(&self) -> Result<Box<dyn Session + '_>> {
        Ok(Box::new(SoftSession {
            token: self,
            authenticated: false,
        }))
    }
}

struct SoftSession<'a> {
    token: &'a SoftToken,
    authenticated: bool,
}

impl SoftSession<'_> {
    fn require_auth(&self) -> Result<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(CustodyError::Hardware(
                "session not authenticated".to_string(),
            ))
        }
    }
}

impl Session for SoftSession<'_> {
    fn authenticate(&mut self, pin: &str) -> Result<()> {
        if pin == self.token.pin {
            self.authenticated = true;
            Ok(())
        } else {
            Err(CustodyError::AuthenticationFailed)
        }
    }

    fn num_slots(&self) -> u8 {
        let slots = self
            .token
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slots.len() as u8
    }

    fn read_slot(&mut self, slot: SlotId) -> Result<SlotContents> {
        self.require_auth()?;
        let slots = self
            .token
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slots
            .get(slot.0 as usize)
            .cloned()
            .ok_or_else(|| CustodyError::Hardware(format!("no such slot: {slot}")))
    }

    fn write_slot(&mut self, slot: SlotId, key: &ManagedKey) -> Result<()> {
        self.require_auth()?;
        let mut slots = self
            .token
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let contents = slots
            .get_mut(slot.0 as usize)
            .ok_or_else(|| CustodyError::Hardware(format!("no such slot: {slot}")))?;
        match contents {
            SlotContents::Empty => {
                *contents = SlotContents::Managed(key.clone());
                Ok(())
            }
            _ => Err(CustodyError::Hardware(format!("{slot} is occupied"))),
        }
    }

    fn erase_slot(&mut self, slot: SlotId) -> Result<()> {
        self.require_auth()?;
        let mut slots = self
            .token
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let contents = slots
            .get_mut(slot.0 as usize)
            .ok_or_else(|| CustodyError::Hardware(format!("no such slot: {slot}")))?;
        match contents {
            SlotContents::Foreign => Err(CustodyError::Hardware(format!(
                "refusing to erase foreign key in {slot}"
            ))),
            _ => {
                *contents = SlotContents::Empty;
                Ok(())
            }
        }
    }
}
