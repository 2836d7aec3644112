//! Certificate building blocks.
//!
//! Names, validity windows, serial numbers and extensions shared by the
//! authority, request and leaf modules, plus TBS signing.

use crate::crypto::keys::{sha256_with_rsa_algorithm, RsaKeypair};
use crate::error::{PkiError, Result};
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, Ia5String, OctetString, SetOfVec, Utf8StringRef};
use der::{Decode, Encode};
use sha2::{Digest, Sha256};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;

const SECONDS_PER_DAY: u64 = 86_400;

/// Build a single-RDN name holding only a common name.
///
/// A leading `CN=` is accepted and stripped.
pub fn common_name_to_rdn(cn: &str) -> Result<Name> {
    let cn = cn.strip_prefix("CN=").unwrap_or(cn).trim();
    if cn.is_empty() {
        return Err(PkiError::ParseError(
            "Common name cannot be empty".to_string(),
        ));
    }

    let cn_attr = AttributeTypeAndValue {
        oid: const_oid::db::rfc4519::CN,
        value: Utf8StringRef::new(cn)
            .map_err(|e| PkiError::ParseError(format!("Invalid CN: {}", e)))?
            .into(),
    };

    let mut attr_set = SetOfVec::new();
    attr_set
        .insert_ordered(cn_attr)
        .map_err(|e| PkiError::CertificateError(format!("Failed to add attribute: {}", e)))?;

    Ok(RdnSequence(vec![RelativeDistinguishedName::from(attr_set)]))
}

/// A validity window starting now and lasting exactly `days` days.
pub fn validity_for_days(days: u32) -> Result<Validity> {
    Validity::from_now(std::time::Duration::from_secs(
        u64::from(days) * SECONDS_PER_DAY,
    ))
    .map_err(|e| PkiError::CertificateError(format!("Failed to create validity: {}", e)))
}

/// Encode a non-negative integer as a DER serial number.
pub fn serial_number_from_u128(value: u128) -> Result<SerialNumber> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);

    let mut encoded = Vec::with_capacity(17);
    if bytes[first] & 0x80 != 0 {
        encoded.push(0);
    }
    encoded.extend_from_slice(&bytes[first..]);

    SerialNumber::new(&encoded)
        .map_err(|e| PkiError::CertificateError(format!("Failed to create serial number: {}", e)))
}

/// Key identifier per RFC 7093 method 1: leftmost 160 bits of SHA-256 over the key bits.
pub fn key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    let digest = Sha256::digest(spki.subject_public_key.raw_bytes());
    digest[..20].to_vec()
}

/// Encode an extension value.
pub fn extension<T: Encode>(oid: ObjectIdentifier, critical: bool, value: &T) -> Result<Extension> {
    let der = value.to_der().map_err(|e| {
        PkiError::CertificateError(format!("Failed to encode extension {}: {}", oid, e))
    })?;
    let extn_value = OctetString::new(der)
        .map_err(|e| PkiError::CertificateError(format!("Failed to wrap extension: {}", e)))?;

    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value,
    })
}

/// Decode the value of the extension with `oid`, if present.
pub fn find_extension<'a, T: Decode<'a>>(cert: &'a Certificate, oid: ObjectIdentifier) -> Result<Option<T>> {
    let Some(extensions) = cert.tbs_certificate.extensions.as_ref() else {
        return Ok(None);
    };

    match extensions.iter().find(|ext| ext.extn_id == oid) {
        Some(ext) => T::from_der(ext.extn_value.as_bytes())
            .map(Some)
            .map_err(|e| PkiError::CertificateError(format!("Malformed extension {}: {}", oid, e))),
        None => Ok(None),
    }
}

/// Extensions for the self-signed authority.
pub fn authority_extensions(spki: &SubjectPublicKeyInfoOwned) -> Result<Vec<Extension>> {
    let key_id = key_identifier(spki);

    Ok(vec![
        extension(
            const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS,
            true,
            &BasicConstraints {
                ca: true,
                path_len_constraint: Some(0),
            },
        )?,
        extension(
            const_oid::db::rfc5280::ID_CE_KEY_USAGE,
            true,
            &KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign),
        )?,
        subject_key_identifier(&key_id)?,
        authority_key_identifier(&key_id)?,
    ])
}

/// Extensions for a leaf certificate.
///
/// `dns_name`, when given, becomes the only subjectAltName entry.
pub fn leaf_extensions(
    subject_spki: &SubjectPublicKeyInfoOwned,
    issuer_spki: &SubjectPublicKeyInfoOwned,
    extended_key_usage: Vec<ObjectIdentifier>,
    dns_name: Option<&str>,
) -> Result<Vec<Extension>> {
    let mut extensions = vec![
        extension(
            const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS,
            true,
            &BasicConstraints {
                ca: false,
                path_len_constraint: None,
            },
        )?,
        extension(
            const_oid::db::rfc5280::ID_CE_KEY_USAGE,
            true,
            &KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
        )?,
        extension(
            const_oid::db::rfc5280::ID_CE_EXT_KEY_USAGE,
            false,
            &ExtendedKeyUsage(extended_key_usage),
        )?,
    ];

    if let Some(dns_name) = dns_name {
        let name = Ia5String::new(dns_name)
            .map_err(|e| PkiError::ParseError(format!("Invalid DNS name '{}': {}", dns_name, e)))?;
        extensions.push(extension(
            const_oid::db::rfc5280::ID_CE_SUBJECT_ALT_NAME,
            false,
            &SubjectAltName(vec![GeneralName::DnsName(name)]),
        )?);
    }

    extensions.push(subject_key_identifier(&key_identifier(subject_spki))?);
    extensions.push(authority_key_identifier(&key_identifier(issuer_spki))?);

    Ok(extensions)
}

fn subject_key_identifier(key_id: &[u8]) -> Result<Extension> {
    let ski = SubjectKeyIdentifier(
        OctetString::new(key_id)
            .map_err(|e| PkiError::CertificateError(format!("Invalid key identifier: {}", e)))?,
    );
    extension(const_oid::db::rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER, false, &ski)
}

fn authority_key_identifier(key_id: &[u8]) -> Result<Extension> {
    let aki = AuthorityKeyIdentifier {
        key_identifier: Some(
            OctetString::new(key_id)
                .map_err(|e| PkiError::CertificateError(format!("Invalid key identifier: {}", e)))?,
        ),
        authority_cert_issuer: None,
        authority_cert_serial_number: None,
    };
    extension(const_oid::db::rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER, false, &aki)
}

/// Assemble and sign a v3 certificate.
pub fn sign_certificate(
    serial_number: SerialNumber,
    issuer: Name,
    subject: Name,
    validity: Validity,
    subject_public_key_info: SubjectPublicKeyInfoOwned,
    extensions: Vec<Extension>,
    signer: &RsaKeypair,
) -> Result<Certificate> {
    let signature_algorithm = sha256_with_rsa_algorithm();

    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number,
        signature: signature_algorithm.clone(),
        issuer,
        validity,
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };

    let signature = sign_tbs(&tbs, signer)?;

    Ok(Certificate {
        tbs_certificate: tbs,
        signature_algorithm,
        signature,
    })
}

fn sign_tbs(tbs: &TbsCertificate, signer: &RsaKeypair) -> Result<BitString> {
    let tbs_der = tbs
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode TBS: {}", e)))?;

    let signature = signer.sign(&tbs_der)?;

    BitString::from_bytes(&signature).map_err(|e| {
        PkiError::CertificateError(format!("Failed to create signature bitstring: {}", e))
    })
}

/// Convert a Certificate to PEM format.
pub fn cert_to_pem(cert: &Certificate) -> Result<String> {
    let der = cert.to_der().map_err(|e| {
        PkiError::CertificateError(format!("Failed to encode certificate: {}", e))
    })?;

    Ok(pem::encode(&pem::Pem::new("CERTIFICATE", der)))
}
