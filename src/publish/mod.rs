//! Remote certificate and configuration stores.
//!
//! Publishing talks to two collaborators: a certificate store that imports a
//! certificate, key and chain and returns an opaque identifier, and a
//! hierarchical parameter store the identifier is written to. Both are traits
//! so the workflow can run against stubs; the shipped implementations drive
//! the `aws` CLI.

pub mod aws;
pub mod command;

use crate::error::Result;
use std::path::PathBuf;

/// Files submitted to the certificate store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateImport {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
    pub chain: PathBuf,
}

/// A remote certificate-management service.
pub trait CertificateStore {
    /// Import the certificate and return its identifier.
    ///
    /// An empty identifier is reported as-is; the workflow treats it as an
    /// import failure.
    fn import_certificate(&self, import: &CertificateImport) -> Result<String>;
}

/// A remote hierarchical key-value configuration store.
pub trait ParameterStore {
    /// Write `value` at `path`, replacing any previous value.
    fn put_parameter(&self, path: &str, value: &str) -> Result<()>;

    /// Read the value at `path`, or `None` when it does not exist.
    fn get_parameter(&self, path: &str) -> Result<Option<String>>;
}
