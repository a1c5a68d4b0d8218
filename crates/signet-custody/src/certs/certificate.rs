//! Parsed X.509 certificate wrapper.

use sha2::{Digest, Sha256};
use x509_parser::prelude::*;

use crate::error::{CustodyError, Result};

/// An X.509 certificate with the attributes derived at parse time.
///
/// Immutable once constructed. The Subject Key Identifier (SKID) is the
/// canonical lookup key: lowercase hex SHA-256 over the DER-encoded
/// SubjectPublicKeyInfo, so it is stable for a given public key no matter
/// who signed the certificate.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    skid: String,
    common_name: String,
    not_before: i64,
    not_after: i64,
    is_ca: bool,
}

impl Certificate {
    /// Parse DER-encoded certificate bytes.
    ///
    /// # Errors
    ///
    /// Returns `CertificateInvalid` if the bytes are not exactly one
    /// well-formed X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (rest, cert) = parse_x509_certificate(der)
            .map_err(|e| CustodyError::CertificateInvalid(format!("DER parse failed: {e}")))?;
        if !rest.is_empty() {
            return Err(CustodyError::CertificateInvalid(format!(
                "{} trailing bytes after certificate",
                rest.len()
            )));
        }

        let skid = hex::encode(Sha256::digest(cert.public_key().raw));

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let is_ca = cert
            .basic_constraints()
            .ok()
            .flatten()
            .map(|bc| bc.value.ca)
            .unwrap_or(false);

        Ok(Self {
            der: der.to_vec(),
            skid,
            common_name,
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            is_ca,
        })
    }

    /// The canonical lookup key for this certificate.
    pub fn skid(&self) -> &str {
        &self.skid
    }

    /// Subject Common Name; empty if the subject carries none.
    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// The raw DER bytes this certificate was parsed from.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Whether the certificate is a certificate authority.
    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// Validity window as unix timestamps `(not_before, not_after)`.
    pub fn validity(&self) -> (i64, i64) {
        (self.not_before, self.not_after)
    }

    /// Whether `unix_time` falls outside the validity window.
    ///
    /// The store never expires entries on its own; this is advisory for
    /// callers that care.
    pub fn is_expired_at(&self, unix_time: i64) -> bool {
        unix_time < self.not_before || unix_time > self.not_after
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl std::fmt::Display for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (CN={}{})",
            self.skid,
            self.common_name,
            if self.is_ca { ", CA" } else { "" },
        )
    }
}
