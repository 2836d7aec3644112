//! PKCS#12 bundles.
//!
//! A bundle packs the leaf certificate, its private key and the authority
//! certificate into one `.pfx` archive for distribution to hosts. Without a
//! password the archive is protected with the empty password, matching
//! `openssl pkcs12 -export -passout pass:`.

use crate::crypto::keys::RsaKeypair;
use crate::error::{PkiError, Result};
use der::Encode;
use x509_cert::certificate::Certificate;

/// Export a PKCS#12 bundle.
///
/// `friendly_name` is stored as the bag attribute most key stores display.
pub fn export_bundle(
    leaf: &Certificate,
    leaf_key: &RsaKeypair,
    authority: &Certificate,
    password: Option<&str>,
    friendly_name: &str,
) -> Result<Vec<u8>> {
    let leaf_der = encode_certificate(leaf)?;
    let authority_der = encode_certificate(authority)?;
    let key_der = leaf_key.to_pkcs8_der()?;

    let pfx = p12::PFX::new(
        &leaf_der,
        &key_der,
        Some(&authority_der),
        password.unwrap_or(""),
        friendly_name,
    )
    .ok_or_else(|| PkiError::BundleError(format!("Failed to build bundle for {}", friendly_name)))?;

    Ok(pfx.to_der())
}

fn encode_certificate(cert: &Certificate) -> Result<Vec<u8>> {
    cert.to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode certificate: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::authority::create_authority_certificate;
    use crate::crypto::keys::generate_rsa_keypair;

    fn fixture() -> (Certificate, RsaKeypair) {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let cert = create_authority_certificate(&keypair, "CA", 365).unwrap();
        (cert, keypair)
    }

    #[test]
    fn test_bundle_without_password_uses_empty_password() {
        let (cert, keypair) = fixture();
        let der = export_bundle(&cert, &keypair, &cert, None, "server").unwrap();

        let pfx = p12::PFX::parse(&der).unwrap();
        assert!(pfx.verify_mac(""));
        assert!(!pfx.verify_mac("secret"));
    }

    #[test]
    fn test_bundle_with_password_applies_it() {
        let (cert, keypair) = fixture();
        let der = export_bundle(&cert, &keypair, &cert, Some("hunter2"), "client").unwrap();

        let pfx = p12::PFX::parse(&der).unwrap();
        assert!(pfx.verify_mac("hunter2"));
        assert!(!pfx.verify_mac(""));
    }

    #[test]
    fn test_bundle_carries_key() {
        let (cert, keypair) = fixture();
        let der = export_bundle(&cert, &keypair, &cert, Some("pw"), "client").unwrap();

        let pfx = p12::PFX::parse(&der).unwrap();
        let keys = pfx.key_bags("pw").unwrap();
        assert_eq!(keys, vec![keypair.to_pkcs8_der().unwrap()]);
    }
}
