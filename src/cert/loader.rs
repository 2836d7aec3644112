//! Certificate loading and inspection.
//!
//! This module parses PEM certificates back into `x509_cert` structures and
//! extracts the handful of fields the workflow and `status` report on.

use crate::cert::builder::find_extension;
use crate::error::{PkiError, Result};
use const_oid::ObjectIdentifier;
use der::asn1::{PrintableStringRef, Utf8StringRef};
use der::Decode;
use std::fs;
use std::path::Path;
use x509_cert::certificate::Certificate;
use x509_cert::ext::pkix::ExtendedKeyUsage;
use x509_cert::name::Name;

/// Load a Certificate from PEM format.
pub fn cert_from_pem(pem_str: &str) -> Result<Certificate> {
    let pem = pem::parse(pem_str)
        .map_err(|e| PkiError::PemError(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != "CERTIFICATE" {
        return Err(PkiError::PemError(format!(
            "Expected CERTIFICATE, got {}",
            pem.tag()
        )));
    }

    Certificate::from_der(pem.contents())
        .map_err(|e| PkiError::CertificateError(format!("Failed to decode certificate: {}", e)))
}

/// Read and parse a PEM certificate file.
pub fn load_certificate(path: &Path) -> Result<Certificate> {
    let contents = fs::read_to_string(path)?;
    cert_from_pem(&contents)
}

/// The first common name in `name`, if any.
pub fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == const_oid::db::rfc4519::CN)
        .and_then(|atv| {
            atv.value
                .decode_as::<Utf8StringRef<'_>>()
                .map(|s| s.as_str().to_string())
                .or_else(|_| {
                    atv.value
                        .decode_as::<PrintableStringRef<'_>>()
                        .map(|s| s.as_str().to_string())
                })
                .ok()
        })
}

/// Extended-key-usage OIDs carried by `cert`; empty when the extension is absent.
pub fn extended_key_usage(cert: &Certificate) -> Result<Vec<ObjectIdentifier>> {
    Ok(
        find_extension::<ExtendedKeyUsage>(cert, const_oid::db::rfc5280::ID_CE_EXT_KEY_USAGE)?
            .map(|eku| eku.0)
            .unwrap_or_default(),
    )
}

/// Displayable facts about one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub subject_cn: Option<String>,
    pub issuer_cn: Option<String>,
    pub serial_hex: String,
    /// Unix timestamp.
    pub not_before: u64,
    /// Unix timestamp.
    pub not_after: u64,
    pub extended_key_usage: Vec<ObjectIdentifier>,
}

impl CertificateSummary {
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        let tbs = &cert.tbs_certificate;
        Ok(Self {
            subject_cn: common_name(&tbs.subject),
            issuer_cn: common_name(&tbs.issuer),
            serial_hex: hex::encode_upper(tbs.serial_number.as_bytes()),
            not_before: tbs.validity.not_before.to_unix_duration().as_secs(),
            not_after: tbs.validity.not_after.to_unix_duration().as_secs(),
            extended_key_usage: extended_key_usage(cert)?,
        })
    }

    /// Length of the validity window in whole days.
    pub fn validity_days(&self) -> u64 {
        self.not_after.saturating_sub(self.not_before) / 86_400
    }
}
