//! Error types for farm-pki.
//!
//! Every failure is fatal to the operation that raised it. Nothing is retried
//! locally; the binary prints the message and exits non-zero.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for PKI operations.
#[derive(Error, Debug)]
pub enum PkiError {
    /// A target artifact is already present; nothing was written.
    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// The authority key or certificate is missing.
    #[error("Certificate authority not found: {} (run `ca` first)", .0.display())]
    AuthorityNotFound(PathBuf),

    /// A file required for publishing is absent.
    #[error("Missing file: {}", .0.display())]
    MissingFile(PathBuf),

    /// The certificate store accepted the request but returned no identifier.
    #[error("Certificate import failed: {0}")]
    ImportFailed(String),

    /// An external program exited unsuccessfully or could not be spawned.
    #[error("External command `{program}` failed ({status}): {stderr}")]
    ExternalCommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// Another operation holds the directory lock.
    #[error("PKI directory is locked by another operation: {}", .0.display())]
    Locked(PathBuf),

    /// Invalid configuration input
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Key generation, encoding or signing failed
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Certificate generation or validation error
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// PEM encoding/decoding error
    #[error("PEM error: {0}")]
    PemError(String),

    /// Invalid input data
    #[error("Parse error: {0}")]
    ParseError(String),

    /// PKCS#12 bundle export error
    #[error("Bundle error: {0}")]
    BundleError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for PKI operations.
pub type Result<T> = std::result::Result<T, PkiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PkiError::CryptoError("test error".to_string());
        assert_eq!(err.to_string(), "Cryptographic error: test error");
    }

    #[test]
    fn test_path_errors_name_the_file() {
        let err = PkiError::MissingFile(PathBuf::from("/tmp/pki/server/server.crt"));
        assert_eq!(err.to_string(), "Missing file: /tmp/pki/server/server.crt");

        let err = PkiError::AlreadyExists(PathBuf::from("certs/ca.key"));
        assert!(err.to_string().contains("certs/ca.key"));
    }

    #[test]
    fn test_external_command_display() {
        let err = PkiError::ExternalCommandFailed {
            program: "aws".to_string(),
            status: "exit status: 255".to_string(),
            stderr: "Unable to locate credentials".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "External command `aws` failed (exit status: 255): Unable to locate credentials"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PkiError>();
    }
}
