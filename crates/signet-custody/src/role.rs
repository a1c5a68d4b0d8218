//! Trust roles.
//!
//! A key or certificate is meaningful only in association with exactly one
//! role at a time within a given store. The four canonical roles come from
//! the delegation-based signing scheme; everything else is a named
//! delegated role.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CustodyError;

/// Canonical string form of the root role.
pub const ROLE_ROOT: &str = "root";
/// Canonical string form of the targets role.
pub const ROLE_TARGETS: &str = "targets";
/// Canonical string form of the snapshot role.
pub const ROLE_SNAPSHOT: &str = "snapshot";
/// Canonical string form of the timestamp role.
pub const ROLE_TIMESTAMP: &str = "timestamp";

/// A trust role a key or certificate is authorized for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Root,
    Targets,
    Snapshot,
    Timestamp,
    /// A named delegated role, e.g. `targets/releases`.
    Delegated(String),
}

impl Role {
    /// Canonical lowercase string form.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Root => ROLE_ROOT,
            Role::Targets => ROLE_TARGETS,
            Role::Snapshot => ROLE_SNAPSHOT,
            Role::Timestamp => ROLE_TIMESTAMP,
            Role::Delegated(name) => name,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROLE_ROOT => Ok(Role::Root),
            ROLE_TARGETS => Ok(Role::Targets),
            ROLE_SNAPSHOT => Ok(Role::Snapshot),
            ROLE_TIMESTAMP => Ok(Role::Timestamp),
            "" => Err(CustodyError::InvalidKey("empty role name".to_string())),
            other => Ok(Role::Delegated(other.to_string())),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Role::from_str(&s).map_err(|e| D::Error::custom(e.to_string()))
    }
}
