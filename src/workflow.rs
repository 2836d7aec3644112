//! The certificate issuance workflow.
//!
//! Four operations form a prerequisite chain:
//!
//! ```text
//! create_authority -> { create_server_certificate, create_client_certificate } -> publish_server_certificate
//! ```
//!
//! Preconditions are the presence or absence of artifacts on disk, checked
//! while holding the directory lock. All keys, requests, certificates and
//! bundles are produced in memory before the first file is written, and the
//! files of a failed operation are removed again, so a failure leaves the
//! directory as it was (apart from a consumed serial number).
//!
//! Key generation runs before the lock is taken. The state record is loaded
//! under the lock before the serial is reserved or a remote store is called,
//! so an unreadable record aborts the operation without side effects.

use crate::cert::authority::{create_authority_certificate, AUTHORITY_COMMON_NAME};
use crate::cert::builder::{cert_to_pem, serial_number_from_u128};
use crate::cert::bundle::export_bundle;
use crate::cert::leaf::{issue_leaf_certificate, SigningAuthority};
use crate::cert::loader::{load_certificate, CertificateSummary};
use crate::cert::profile::{UsagePolicy, UsageProfile};
use crate::cert::request::{create_signing_request, request_to_pem};
use crate::cert::verify::{verify_issued_by, verify_key_matches};
use crate::config::PkiConfig;
use crate::crypto::keys::{generate_rsa_keypair, RsaKeypair};
use crate::error::{PkiError, Result};
use crate::publish::{CertificateImport, CertificateStore, ParameterStore};
use crate::storage::layout::{LeafPaths, PkiLayout};
use crate::storage::lock::DirectoryLock;
use crate::storage::serial::{format_serial, SerialFile};
use crate::storage::state::{PublishedCertificate, WorkflowStage, WorkflowState};
use crate::storage::writer::ArtifactWriter;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of a successful leaf issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub role: UsageProfile,
    pub subject: String,
    pub serial_hex: String,
    pub validity_days: u32,
    pub paths: LeafPaths,
}

/// Snapshot of the directory for `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStatus {
    pub stage: WorkflowStage,
    pub authority: Option<CertificateSummary>,
    pub server: Option<CertificateSummary>,
    pub client: Option<CertificateSummary>,
    pub last_serial: Option<String>,
    pub published: Option<PublishedCertificate>,
}

/// Runs the issuance operations against one PKI directory.
#[derive(Debug, Clone)]
pub struct Workflow {
    config: PkiConfig,
    layout: PkiLayout,
}

impl Workflow {
    /// Validate `config` and bind the workflow to its base directory.
    pub fn new(config: PkiConfig) -> Result<Self> {
        config.validate()?;
        let layout = PkiLayout::new(config.base_dir.clone(), config.client_name.clone());
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &PkiConfig {
        &self.config
    }

    pub fn layout(&self) -> &PkiLayout {
        &self.layout
    }

    /// Create the authority key, self-signed certificate and usage policy.
    ///
    /// Fails with `AlreadyExists` if either the key or the certificate is
    /// present. An existing `usage.cnf` is kept as the operator left it.
    pub fn create_authority(&self) -> Result<Vec<PathBuf>> {
        let key_path = self.layout.authority_key();
        let cert_path = self.layout.authority_cert();
        let policy_path = self.layout.usage_policy();

        ensure_absent(&[key_path.as_path(), cert_path.as_path()])?;

        tracing::info!(bits = self.config.authority_key_bits, "generating authority key");
        let keypair = generate_rsa_keypair(self.config.authority_key_bits)?;
        let cert = create_authority_certificate(
            &keypair,
            AUTHORITY_COMMON_NAME,
            self.config.authority_days,
        )?;

        fs::create_dir_all(self.layout.authority_dir())?;
        let _lock = DirectoryLock::acquire(&self.layout.lock_file())?;
        ensure_absent(&[key_path.as_path(), cert_path.as_path()])?;
        let mut state = WorkflowState::load(&self.layout.state_file())?;

        let policy_contents = if policy_path.exists() {
            let existing = fs::read_to_string(&policy_path)?;
            UsagePolicy::parse(&existing)?;
            tracing::info!(path = %policy_path.display(), "keeping existing usage policy");
            None
        } else {
            Some(UsagePolicy::default().render())
        };

        let mut writer = ArtifactWriter::new();
        writer.write_secret(&key_path, keypair.to_pkcs8_pem()?.as_bytes())?;
        writer.write_new(&cert_path, cert_to_pem(&cert)?.as_bytes())?;
        if let Some(contents) = policy_contents {
            writer.write_new(&policy_path, contents.as_bytes())?;
        }

        state.record_authority();
        state.save()?;

        tracing::info!(
            days = self.config.authority_days,
            "certificate authority created"
        );
        Ok(writer.commit())
    }

    /// Issue the load-balancer certificate under the `server` profile.
    ///
    /// The bundle is exported without a password.
    pub fn create_server_certificate(&self) -> Result<IssuedCertificate> {
        let subject = self.config.require_dns_name()?.to_string();
        self.issue_leaf(
            UsageProfile::Server,
            subject,
            self.config.server_key_bits,
            self.config.server_days,
            None,
        )
    }

    /// Issue the render-node client certificate under the `client` profile.
    ///
    /// The bundle is protected with the configured client password, if any.
    pub fn create_client_certificate(&self) -> Result<IssuedCertificate> {
        self.issue_leaf(
            UsageProfile::Client,
            self.config.client_name.clone(),
            self.config.client_key_bits,
            self.config.client_days,
            self.config.client_password.as_deref(),
        )
    }

    fn issue_leaf(
        &self,
        role: UsageProfile,
        subject: String,
        key_bits: usize,
        validity_days: u32,
        bundle_password: Option<&str>,
    ) -> Result<IssuedCertificate> {
        let paths = self.layout.leaf(role);

        self.ensure_authority()?;
        ensure_absent(&paths.all())?;

        tracing::info!(%role, subject = %subject, bits = key_bits, "generating leaf key");
        let keypair = generate_rsa_keypair(key_bits)?;
        let request = create_signing_request(&keypair, &subject)?;

        let _lock = DirectoryLock::acquire(&self.layout.lock_file())?;
        self.ensure_authority()?;
        ensure_absent(&paths.all())?;
        let mut state = WorkflowState::load(&self.layout.state_file())?;

        let authority_key = RsaKeypair::from_pkcs8_pem(&fs::read_to_string(
            self.layout.authority_key(),
        )?)?;
        let authority_cert = load_certificate(&self.layout.authority_cert())?;
        let policy = self.load_policy()?;

        let serial = SerialFile::new(self.layout.serial_file()).advance()?;
        let authority = SigningAuthority {
            keypair: &authority_key,
            certificate: &authority_cert,
            policy: &policy,
        };
        let cert = issue_leaf_certificate(
            &authority,
            &request,
            role,
            serial_number_from_u128(serial)?,
            validity_days,
        )?;
        let bundle = export_bundle(&cert, &keypair, &authority_cert, bundle_password, &subject)?;

        fs::create_dir_all(self.layout.leaf_dir(role))?;
        let mut writer = ArtifactWriter::new();
        writer.write_secret(&paths.key, keypair.to_pkcs8_pem()?.as_bytes())?;
        writer.write_new(&paths.request, request_to_pem(&request)?.as_bytes())?;
        writer.write_new(&paths.certificate, cert_to_pem(&cert)?.as_bytes())?;
        writer.write_secret(&paths.bundle, &bundle)?;

        let serial_hex = format_serial(serial);
        state.record_leaf(role, subject.clone(), serial_hex.clone());
        state.save()?;
        writer.commit();

        tracing::info!(%role, subject = %subject, serial = %serial_hex, validity_days, "leaf certificate issued");
        Ok(IssuedCertificate {
            role,
            subject,
            serial_hex,
            validity_days,
            paths,
        })
    }

    /// Import the server certificate into the certificate store and record
    /// its identifier in the parameter store.
    ///
    /// Returns the identifier.
    pub fn publish_server_certificate(
        &self,
        certificates: &dyn CertificateStore,
        parameters: &dyn ParameterStore,
    ) -> Result<String> {
        let server = self.layout.leaf(UsageProfile::Server);
        let import = CertificateImport {
            certificate: server.certificate,
            private_key: server.key,
            chain: self.layout.authority_cert(),
        };

        for path in [&import.certificate, &import.private_key, &import.chain] {
            if !path.exists() {
                return Err(PkiError::MissingFile(path.clone()));
            }
        }

        let _lock = DirectoryLock::acquire(&self.layout.lock_file())?;
        let mut state = WorkflowState::load(&self.layout.state_file())?;

        let server_cert = load_certificate(&import.certificate)?;
        let authority_cert = load_certificate(&import.chain)?;
        let server_key = RsaKeypair::from_pkcs8_pem(&fs::read_to_string(&import.private_key)?)?;
        verify_issued_by(&server_cert, &authority_cert)?;
        verify_key_matches(&server_cert, &server_key)?;

        let identifier = certificates.import_certificate(&import)?;
        let identifier = identifier.trim().to_string();
        if identifier.is_empty() {
            return Err(PkiError::ImportFailed(
                "certificate store returned an empty identifier".to_string(),
            ));
        }
        tracing::info!(identifier = %identifier, "server certificate imported");

        parameters.put_parameter(&self.config.parameter_path, &identifier)?;
        tracing::info!(
            path = %self.config.parameter_path,
            "certificate identifier recorded"
        );

        state.record_published(identifier.clone(), self.config.parameter_path.clone());
        state.save()?;

        Ok(identifier)
    }

    /// Describe what exists in the directory. Takes no lock and writes nothing.
    pub fn status(&self) -> Result<WorkflowStatus> {
        let state = WorkflowState::load(&self.layout.state_file())?;

        Ok(WorkflowStatus {
            stage: state.stage,
            authority: summarize(&self.layout.authority_cert())?,
            server: summarize(&self.layout.leaf(UsageProfile::Server).certificate)?,
            client: summarize(&self.layout.leaf(UsageProfile::Client).certificate)?,
            last_serial: SerialFile::new(self.layout.serial_file())
                .current()?
                .map(format_serial),
            published: state.published,
        })
    }

    fn ensure_authority(&self) -> Result<()> {
        for path in [self.layout.authority_key(), self.layout.authority_cert()] {
            if !path.exists() {
                return Err(PkiError::AuthorityNotFound(path));
            }
        }
        Ok(())
    }

    fn load_policy(&self) -> Result<UsagePolicy> {
        let path = self.layout.usage_policy();
        if !path.exists() {
            return Err(PkiError::MissingFile(path));
        }
        UsagePolicy::parse(&fs::read_to_string(&path)?)
    }
}

fn ensure_absent(paths: &[&Path]) -> Result<()> {
    match paths.iter().find(|p| p.exists()) {
        Some(existing) => Err(PkiError::AlreadyExists(existing.to_path_buf())),
        None => Ok(()),
    }
}

fn summarize(path: &Path) -> Result<Option<CertificateSummary>> {
    if !path.exists() {
        return Ok(None);
    }
    CertificateSummary::from_certificate(&load_certificate(path)?).map(Some)
}
