//! Chain and key-pair verification.

use crate::crypto::keys::{verify_signature, RsaKeypair};
use crate::error::{PkiError, Result};
use der::Encode;
use x509_cert::certificate::Certificate;

/// Check that `cert` names `issuer` as its issuer and carries a valid signature from it.
pub fn verify_issued_by(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    if cert.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return Err(PkiError::CertificateError(
            "Certificate issuer does not match authority subject".to_string(),
        ));
    }

    if cert.signature_algorithm != cert.tbs_certificate.signature {
        return Err(PkiError::CertificateError(
            "Outer and inner signature algorithms differ".to_string(),
        ));
    }

    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode TBS: {}", e)))?;

    verify_signature(
        &issuer.tbs_certificate.subject_public_key_info,
        &tbs_der,
        cert.signature.raw_bytes(),
    )
}

/// Check that `keypair` holds the private half of the key certified by `cert`.
pub fn verify_key_matches(cert: &Certificate, keypair: &RsaKeypair) -> Result<()> {
    if cert.tbs_certificate.subject_public_key_info != keypair.subject_public_key_info()? {
        return Err(PkiError::CertificateError(
            "Private key does not match certificate public key".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::authority::create_authority_certificate;
    use crate::crypto::keys::generate_rsa_keypair;

    #[test]
    fn test_foreign_authority_rejected() {
        let ours = generate_rsa_keypair(1024).unwrap();
        let theirs = generate_rsa_keypair(1024).unwrap();
        let our_ca = create_authority_certificate(&ours, "CA", 365).unwrap();
        let their_ca = create_authority_certificate(&theirs, "CA", 365).unwrap();

        // Same subject, different key: the name check passes, the signature does not.
        assert!(matches!(
            verify_issued_by(&our_ca, &their_ca),
            Err(PkiError::CryptoError(_))
        ));
    }

    #[test]
    fn test_issuer_name_mismatch() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let ca = create_authority_certificate(&keypair, "CA", 365).unwrap();
        let other = create_authority_certificate(&keypair, "Other CA", 365).unwrap();

        assert!(matches!(
            verify_issued_by(&ca, &other),
            Err(PkiError::CertificateError(_))
        ));
    }

    #[test]
    fn test_key_matches() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let other = generate_rsa_keypair(1024).unwrap();
        let ca = create_authority_certificate(&keypair, "CA", 365).unwrap();

        assert!(verify_key_matches(&ca, &keypair).is_ok());
        assert!(verify_key_matches(&ca, &other).is_err());
    }
}
