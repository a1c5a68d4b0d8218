//! Error types for signet-custody.
//!
//! All errors are strongly typed and propagated without panicking.
//! Private key material is never included in error messages.

/// Custody error types covering key stores, key encodings, the hardware
/// token boundary, and the certificate trust store.
///
/// Hardware transport faults (`Hardware`) are deliberately distinct from
/// logical absence (`KeyNotFound`): the former may succeed on retry after
/// operator intervention, the latter will not.
#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key already exists: {0}")]
    KeyExists(String),

    #[error("No free slot on hardware token")]
    StoreFull,

    #[error("Invalid passphrase")]
    PassphraseInvalid,

    #[error("Hardware token authentication failed")]
    AuthenticationFailed,

    #[error("Hardware token error: {0}")]
    Hardware(String),

    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("Certificate already exists: {0}")]
    CertificateExists(String),

    #[error("Invalid certificate: {0}")]
    CertificateInvalid(String),

    #[error("Key export is not supported by the {0} key store")]
    ExportUnsupported(&'static str),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid key encoding: {0}")]
    EncodingInvalid(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CustodyError>;
