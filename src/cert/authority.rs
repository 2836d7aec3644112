//! Self-signed certificate authority.

use crate::cert::builder::{
    authority_extensions, common_name_to_rdn, serial_number_from_u128, sign_certificate,
    validity_for_days,
};
use crate::crypto::keys::RsaKeypair;
use crate::error::Result;
use rand::Rng;
use x509_cert::certificate::Certificate;

/// Subject common name of the authority.
pub const AUTHORITY_COMMON_NAME: &str = "CA";

/// Create a self-signed authority certificate.
///
/// # Example
///
/// ```
/// use farm_pki::cert::authority::create_authority_certificate;
/// use farm_pki::crypto::keys::generate_rsa_keypair;
///
/// # fn example() -> farm_pki::error::Result<()> {
/// let keypair = generate_rsa_keypair(1024)?;
/// let cert = create_authority_certificate(&keypair, "CA", 3650)?;
/// assert_eq!(cert.tbs_certificate.issuer, cert.tbs_certificate.subject);
/// # Ok(())
/// # }
/// ```
pub fn create_authority_certificate(
    keypair: &RsaKeypair,
    subject_cn: &str,
    validity_days: u32,
) -> Result<Certificate> {
    let subject = common_name_to_rdn(subject_cn)?;
    let issuer = subject.clone();
    let spki = keypair.subject_public_key_info()?;
    let extensions = authority_extensions(&spki)?;
    let serial = serial_number_from_u128(rand::thread_rng().gen::<u128>() >> 1)?;

    sign_certificate(
        serial,
        issuer,
        subject,
        validity_for_days(validity_days)?,
        spki,
        extensions,
        keypair,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::builder::find_extension;
    use crate::cert::verify::verify_issued_by;
    use crate::crypto::keys::generate_rsa_keypair;
    use x509_cert::ext::pkix::BasicConstraints;

    #[test]
    fn test_authority_is_self_signed() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let cert = create_authority_certificate(&keypair, AUTHORITY_COMMON_NAME, 3650).unwrap();

        assert_eq!(cert.tbs_certificate.issuer, cert.tbs_certificate.subject);
        assert!(verify_issued_by(&cert, &cert).is_ok());
    }

    #[test]
    fn test_authority_is_ca() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let cert = create_authority_certificate(&keypair, AUTHORITY_COMMON_NAME, 3650).unwrap();

        let constraints: BasicConstraints =
            find_extension(&cert, const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS)
                .unwrap()
                .unwrap();
        assert!(constraints.ca);
    }

    #[test]
    fn test_authority_serials_differ() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        let first = create_authority_certificate(&keypair, "CA", 365).unwrap();
        let second = create_authority_certificate(&keypair, "CA", 365).unwrap();

        assert_ne!(
            first.tbs_certificate.serial_number,
            second.tbs_certificate.serial_number
        );
    }

    #[test]
    fn test_authority_invalid_subject() {
        let keypair = generate_rsa_keypair(1024).unwrap();
        assert!(create_authority_certificate(&keypair, "", 365).is_err());
    }
}
