//! RSA key operations.
//!
//! Keys are stored on disk as unencrypted PKCS#8 PEM, the same shape
//! `openssl genrsa` produces, and sign with PKCS#1 v1.5 over SHA-256.

use crate::error::{PkiError, Result};
use der::{Decode, Encode};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::fmt;

/// An RSA keypair.
#[derive(Clone)]
pub struct RsaKeypair {
    pub secret: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl fmt::Debug for RsaKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeypair")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl RsaKeypair {
    /// Create a keypair from a private key.
    pub fn from_secret(secret: RsaPrivateKey) -> Self {
        let public = secret.to_public_key();
        Self { secret, public }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    /// Encode the private key as PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        self.secret
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| PkiError::CryptoError(format!("Failed to encode private key: {}", e)))
    }

    /// Encode the private key as PKCS#8 DER.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        self.secret
            .to_pkcs8_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| PkiError::CryptoError(format!("Failed to encode private key: {}", e)))
    }

    /// Decode a PKCS#8 PEM private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let secret = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| PkiError::PemError(format!("Failed to decode private key: {}", e)))?;
        Ok(Self::from_secret(secret))
    }

    /// The SubjectPublicKeyInfo structure embedded in certificates and requests.
    pub fn subject_public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let der = self
            .public
            .to_public_key_der()
            .map_err(|e| PkiError::CryptoError(format!("Failed to encode public key: {}", e)))?;

        SubjectPublicKeyInfoOwned::from_der(der.as_bytes())
            .map_err(|e| PkiError::CryptoError(format!("Failed to decode public key info: {}", e)))
    }

    /// Sign a message with PKCS#1 v1.5 / SHA-256.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::<Sha256>::new(self.secret.clone());
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| PkiError::CryptoError(format!("Signing failed: {}", e)))?;
        Ok(signature.to_vec())
    }
}

/// Generate a new RSA keypair of `bits` modulus size.
pub fn generate_rsa_keypair(bits: usize) -> Result<RsaKeypair> {
    let mut rng = rand::thread_rng();
    let secret = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| PkiError::CryptoError(format!("Failed to generate RSA key: {}", e)))?;
    Ok(RsaKeypair::from_secret(secret))
}

/// Verify a PKCS#1 v1.5 / SHA-256 signature against a SubjectPublicKeyInfo.
pub fn verify_signature(
    spki: &SubjectPublicKeyInfoOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let spki_der = spki
        .to_der()
        .map_err(|e| PkiError::CryptoError(format!("Failed to encode public key info: {}", e)))?;
    let public = RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| PkiError::CryptoError(format!("Not an RSA public key: {}", e)))?;

    let signature = Signature::try_from(signature)
        .map_err(|e| PkiError::CryptoError(format!("Malformed signature: {}", e)))?;

    VerifyingKey::<Sha256>::new(public)
        .verify(message, &signature)
        .map_err(|e| PkiError::CryptoError(format!("Signature verification failed: {}", e)))
}

/// The `sha256WithRSAEncryption` algorithm identifier.
pub fn sha256_with_rsa_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
        parameters: Some(der::asn1::Any::null()),
    }
}
