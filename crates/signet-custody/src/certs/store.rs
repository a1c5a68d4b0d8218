//! Durable certificate trust store.
//!
//! Holds the set of certificates (authorities and leaves) that authorize
//! keys for roles, keyed by SKID. Every mutation rewrites the backing
//! trust file atomically; a failed persist rolls the in-memory set back,
//! so memory and disk never disagree after a call returns.
//!
//! Trust file format (JSON):
//! ```json
//! {
//!     "version": 1,
//!     "certificates": ["<base64-DER>", ...]
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::certs::Certificate;
use crate::error::{CustodyError, Result};
use crate::fsutil::write_atomic;

const TRUST_FILE_VERSION: u32 = 1;

/// On-disk trust set.
#[derive(Debug, Serialize, Deserialize)]
struct TrustFile {
    /// Format version number.
    version: u32,
    /// Base64-encoded DER, sorted by SKID for stable output.
    certificates: Vec<String>,
}

/// SKID-keyed trust set persisted to a single JSON file.
///
/// Entries never expire on their own; explicit removal is the only
/// mutation besides adding.
pub struct CertificateStore {
    path: PathBuf,
    certs: RwLock<HashMap<String, Certificate>>,
}

impl CertificateStore {
    /// Open the trust set backed by `path`, loading it if present.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` for a malformed trust file,
    /// `CertificateInvalid` if a stored entry does not parse, or
    /// `CustodyError::Io` for filesystem errors.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut certs = HashMap::new();

        if path.exists() {
            let bytes = std::fs::read(&path)?;
            let file: TrustFile = serde_json::from_slice(&bytes).map_err(|e| {
                CustodyError::SerializationError(format!(
                    "failed to parse trust file {}: {e}",
                    path.display()
                ))
            })?;
            if file.version != TRUST_FILE_VERSION {
                return Err(CustodyError::SerializationError(format!(
                    "unsupported trust file version {}",
                    file.version
                )));
            }
            for entry in &file.certificates {
                let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, entry)
                    .map_err(|e| {
                        CustodyError::CertificateInvalid(format!("invalid base64 in trust file: {e}"))
                    })?;
                let cert = Certificate::from_der(&der)?;
                certs.insert(cert.skid().to_string(), cert);
            }
        }

        Ok(Self {
            path,
            certs: RwLock::new(certs),
        })
    }

    /// Parse and add a certificate to the trust set.
    ///
    /// Returns the parsed certificate on success.
    ///
    /// # Errors
    ///
    /// Returns `CertificateInvalid` if the bytes do not parse and
    /// `CertificateExists` if a certificate with the same SKID is already
    /// trusted.
    pub fn add_cert(&self, der: &[u8]) -> Result<Certificate> {
        let cert = Certificate::from_der(der)?;
        let skid = cert.skid().to_string();

        let mut certs = self.certs.write().unwrap_or_else(PoisonError::into_inner);
        if certs.contains_key(&skid) {
            return Err(CustodyError::CertificateExists(skid));
        }
        certs.insert(skid.clone(), cert.clone());
        if let Err(e) = self.persist(&certs) {
            certs.remove(&skid);
            return Err(e);
        }
        debug!("added certificate {cert}");
        Ok(cert)
    }

    /// Look up a certificate by its SKID.
    pub fn get_certificate_by_skid(&self, skid: &str) -> Result<Certificate> {
        let certs = self.certs.read().unwrap_or_else(PoisonError::into_inner);
        certs
            .get(skid)
            .cloned()
            .ok_or_else(|| CustodyError::CertificateNotFound(skid.to_string()))
    }

    /// All trusted certificates whose subject Common Name is `name`.
    /// An empty result is not an error.
    pub fn get_certificates_by_cn(&self, name: &str) -> Vec<Certificate> {
        let certs = self.certs.read().unwrap_or_else(PoisonError::into_inner);
        certs
            .values()
            .filter(|c| c.common_name() == name)
            .cloned()
            .collect()
    }

    /// All trusted certificates, sorted by SKID.
    pub fn certificates(&self) -> Vec<Certificate> {
        let certs = self.certs.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<Certificate> = certs.values().cloned().collect();
        all.sort_by(|a, b| a.skid().cmp(b.skid()));
        all
    }

    /// All trusted certificate authorities.
    pub fn ca_certificates(&self) -> Vec<Certificate> {
        let certs = self.certs.read().unwrap_or_else(PoisonError::into_inner);
        certs.values().filter(|c| c.is_ca()).cloned().collect()
    }

    /// Remove trust from a certificate, matched by SKID.
    ///
    /// # Errors
    ///
    /// Returns `CertificateNotFound` if no certificate with that SKID is
    /// trusted.
    pub fn remove_cert(&self, cert: &Certificate) -> Result<()> {
        let mut certs = self.certs.write().unwrap_or_else(PoisonError::into_inner);
        let removed = certs
            .remove(cert.skid())
            .ok_or_else(|| CustodyError::CertificateNotFound(cert.skid().to_string()))?;
        if let Err(e) = self.persist(&certs) {
            certs.insert(removed.skid().to_string(), removed);
            return Err(e);
        }
        debug!("removed certificate {cert}");
        Ok(())
    }

    /// Number of trusted certificates.
    pub fn len(&self) -> usize {
        let certs = self.certs.read().unwrap_or_else(PoisonError::into_inner);
        certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the trust file from the given set.
    fn persist(&self, certs: &HashMap<String, Certificate>) -> Result<()> {
        let mut entries: Vec<(&String, &Certificate)> = certs.iter().collect();
        entries.sort_by_key(|(skid, _)| skid.as_str());

        let file = TrustFile {
            version: TRUST_FILE_VERSION,
            certificates: entries
                .iter()
                .map(|(_, cert)| {
                    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, cert.der())
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| CustodyError::SerializationError(e.to_string()))?;
        write_atomic(&self.path, json.as_bytes())
    }
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
