//! X.509 certificate trust.
//!
//! [`Certificate`] wraps raw DER with the attributes custody decisions
//! need (SKID, Common Name, validity window, CA flag);
//! [`CertificateStore`] is the durable SKID-keyed trust set.

pub mod certificate;
pub mod store;

pub use certificate::Certificate;
pub use store::CertificateStore;
