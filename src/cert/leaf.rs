//! Leaf certificates signed by the authority.
//!
//! Mirrors `openssl x509 -req -CA ... -extfile usage.cnf -extensions <profile>`:
//! the request's subject and key are certified, the profile's extended key
//! usages are applied, and the serial comes from the caller.

use crate::cert::builder::{leaf_extensions, sign_certificate, validity_for_days};
use crate::cert::loader::common_name;
use crate::cert::profile::{UsagePolicy, UsageProfile};
use crate::cert::request::verify_signing_request;
use crate::crypto::keys::RsaKeypair;
use crate::error::Result;
use x509_cert::certificate::Certificate;
use x509_cert::request::CertReq;
use x509_cert::serial_number::SerialNumber;

/// The authority material needed to sign.
#[derive(Debug, Clone)]
pub struct SigningAuthority<'a> {
    pub keypair: &'a RsaKeypair,
    pub certificate: &'a Certificate,
    pub policy: &'a UsagePolicy,
}

/// Sign `request` under `profile`.
///
/// The request's self-signature is checked first. Server certificates also
/// carry the subject common name as a DNS subjectAltName.
pub fn issue_leaf_certificate(
    authority: &SigningAuthority<'_>,
    request: &CertReq,
    profile: UsageProfile,
    serial: SerialNumber,
    validity_days: u32,
) -> Result<Certificate> {
    verify_signing_request(request)?;

    let extended_key_usage = authority.policy.extended_key_usage(profile)?;
    let subject_cn = common_name(&request.info.subject);
    let dns_name = match profile {
        UsageProfile::Server => subject_cn.as_deref(),
        UsageProfile::Client => None,
    };

    let issuer_spki = &authority.certificate.tbs_certificate.subject_public_key_info;
    let extensions = leaf_extensions(
        &request.info.public_key,
        issuer_spki,
        extended_key_usage,
        dns_name,
    )?;

    tracing::debug!(
        subject = subject_cn.as_deref().unwrap_or("<none>"),
        %profile,
        validity_days,
        "signing leaf certificate"
    );

    sign_certificate(
        serial,
        authority.certificate.tbs_certificate.subject.clone(),
        request.info.subject.clone(),
        validity_for_days(validity_days)?,
        request.info.public_key.clone(),
        extensions,
        authority.keypair,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::authority::create_authority_certificate;
    use crate::cert::builder::serial_number_from_u128;
    use crate::cert::loader::{extended_key_usage, CertificateSummary};
    use crate::cert::request::create_signing_request;
    use crate::cert::verify::verify_issued_by;
    use crate::crypto::keys::generate_rsa_keypair;

    fn issue(profile: UsageProfile, cn: &str, days: u32) -> (Certificate, Certificate) {
        let ca_key = generate_rsa_keypair(1024).unwrap();
        let ca_cert = create_authority_certificate(&ca_key, "CA", 3650).unwrap();
        let policy = UsagePolicy::default();
        let authority = SigningAuthority {
            keypair: &ca_key,
            certificate: &ca_cert,
            policy: &policy,
        };

        let leaf_key = generate_rsa_keypair(1024).unwrap();
        let request = create_signing_request(&leaf_key, cn).unwrap();
        let cert = issue_leaf_certificate(
            &authority,
            &request,
            profile,
            serial_number_from_u128(42).unwrap(),
            days,
        )
        .unwrap();
        (cert, ca_cert)
    }

    #[test]
    fn test_server_leaf_verifies_and_has_server_auth_only() {
        let (cert, ca_cert) = issue(UsageProfile::Server, "farm-lb.example.com", 3650);

        assert!(verify_issued_by(&cert, &ca_cert).is_ok());
        assert_eq!(
            extended_key_usage(&cert).unwrap(),
            vec![const_oid::db::rfc5280::ID_KP_SERVER_AUTH]
        );
    }

    #[test]
    fn test_client_leaf_has_client_auth_only() {
        let (cert, ca_cert) = issue(UsageProfile::Client, "RenderFarmClient", 365);

        assert!(verify_issued_by(&cert, &ca_cert).is_ok());
        assert_eq!(
            extended_key_usage(&cert).unwrap(),
            vec![const_oid::db::rfc5280::ID_KP_CLIENT_AUTH]
        );
    }

    #[test]
    fn test_leaf_validity_and_subject() {
        let (cert, _) = issue(UsageProfile::Client, "RenderFarmClient", 730);
        let summary = CertificateSummary::from_certificate(&cert).unwrap();

        assert_eq!(summary.not_after - summary.not_before, 730 * 86_400);
        assert_eq!(summary.subject_cn.as_deref(), Some("RenderFarmClient"));
        assert_eq!(summary.issuer_cn.as_deref(), Some("CA"));
        assert_eq!(summary.serial_hex, "2A");
    }

    #[test]
    fn test_tampered_request_refused() {
        let ca_key = generate_rsa_keypair(1024).unwrap();
        let ca_cert = create_authority_certificate(&ca_key, "CA", 3650).unwrap();
        let policy = UsagePolicy::default();
        let authority = SigningAuthority {
            keypair: &ca_key,
            certificate: &ca_cert,
            policy: &policy,
        };

        let leaf_key = generate_rsa_keypair(1024).unwrap();
        let mut request = create_signing_request(&leaf_key, "node").unwrap();
        request.info.subject = crate::cert::builder::common_name_to_rdn("admin").unwrap();

        let result = issue_leaf_certificate(
            &authority,
            &request,
            UsageProfile::Client,
            serial_number_from_u128(1).unwrap(),
            365,
        );
        assert!(result.is_err());
    }
}
