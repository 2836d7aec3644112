//! PKCS#10 certificate-signing requests.

use crate::cert::builder::common_name_to_rdn;
use crate::crypto::keys::{sha256_with_rsa_algorithm, verify_signature, RsaKeypair};
use crate::error::{PkiError, Result};
use der::asn1::{BitString, SetOfVec};
use der::{Decode, Encode};
use x509_cert::request::{CertReq, CertReqInfo, Version};

const PEM_TAG: &str = "CERTIFICATE REQUEST";

/// Create a signing request for `subject_cn`, self-signed with `keypair`.
pub fn create_signing_request(keypair: &RsaKeypair, subject_cn: &str) -> Result<CertReq> {
    let info = CertReqInfo {
        version: Version::V1,
        subject: common_name_to_rdn(subject_cn)?,
        public_key: keypair.subject_public_key_info()?,
        attributes: SetOfVec::new(),
    };

    let info_der = info
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode request info: {}", e)))?;
    let signature = BitString::from_bytes(&keypair.sign(&info_der)?).map_err(|e| {
        PkiError::CertificateError(format!("Failed to create signature bitstring: {}", e))
    })?;

    Ok(CertReq {
        info,
        algorithm: sha256_with_rsa_algorithm(),
        signature,
    })
}

/// Check the request's self-signature (proof of possession).
pub fn verify_signing_request(request: &CertReq) -> Result<()> {
    let info_der = request
        .info
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode request info: {}", e)))?;

    verify_signature(
        &request.info.public_key,
        &info_der,
        request.signature.raw_bytes(),
    )
}

/// Convert a signing request to PEM format.
pub fn request_to_pem(request: &CertReq) -> Result<String> {
    let der = request
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode request: {}", e)))?;

    Ok(pem::encode(&pem::Pem::new(PEM_TAG, der)))
}

/// Load a signing request from PEM format.
pub fn request_from_pem(pem_str: &str) -> Result<CertReq> {
    let pem = pem::parse(pem_str)
        .map_err(|e| PkiError::PemError(format!("Failed to parse PEM: {}", e)))?;

    if pem.tag() != PEM_TAG {
        return Err(PkiError::PemError(format!(
            "Expected {}, got {}",
            PEM_TAG,
            pem.tag()
        )));
    }

    CertReq::from_der(pem.contents())
        .map_err(|e| PkiError::CertificateError(format!("Failed to decode request: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::loader::common_name;
    use crate::crypto::keys::generate_rsa_keypair;

    #[test]
    fn test_create_and_verify_request() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let request = create_signing_request(&keypair, "RenderFarmClient").unwrap();

        assert!(verify_signing_request(&request).is_ok());
        assert_eq!(
            common_name(&request.info.subject).as_deref(),
            Some("RenderFarmClient")
        );
    }

    #[test]
    fn test_request_pem_roundtrip() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let request = create_signing_request(&keypair, "farm-lb.example.com").unwrap();

        let pem = request_to_pem(&request).unwrap();
        assert!(pem.contains("BEGIN CERTIFICATE REQUEST"));

        let loaded = request_from_pem(&pem).unwrap();
        assert_eq!(loaded, request);
        assert!(verify_signing_request(&loaded).is_ok());
    }

    #[test]
    fn test_tampered_request_fails_verification() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let mut request = create_signing_request(&keypair, "node-01").unwrap();
        request.info.subject = common_name_to_rdn("node-02").unwrap();

        assert!(verify_signing_request(&request).is_err());
    }

    #[test]
    fn test_request_from_wrong_pem_tag() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let key_pem = keypair.to_pkcs8_pem().unwrap();

        let result = request_from_pem(&key_pem);
        assert!(matches!(result, Err(PkiError::PemError(_))));
    }
}
