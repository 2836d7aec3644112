//! Certificate and parameter stores backed by the `aws` CLI.
//!
//! The CLI picks up credentials the usual way (environment, profile, instance
//! role). Region and profile are passed through when configured.

use crate::error::{PkiError, Result};
use crate::publish::command::ExternalCommand;
use crate::publish::{CertificateImport, CertificateStore, ParameterStore};
use std::ffi::OsString;
use std::path::Path;

const DEFAULT_PROGRAM: &str = "aws";

/// Shared CLI settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCli {
    program: String,
    region: Option<String>,
    profile: Option<String>,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            region: None,
            profile: None,
        }
    }
}

impl AwsCli {
    pub fn new(region: Option<String>, profile: Option<String>) -> Self {
        Self {
            region,
            profile,
            ..Self::default()
        }
    }

    /// Use a different executable, e.g. a pinned CLI path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// `aws <service> <operation> ... [--region R] [--profile P]`
    fn command(&self, service: &str, operation: &str) -> ExternalCommand {
        let mut cmd = ExternalCommand::new(self.program.clone()).args([service, operation]);
        if let Some(region) = &self.region {
            cmd = cmd.arg("--region").arg(region);
        }
        if let Some(profile) = &self.profile {
            cmd = cmd.arg("--profile").arg(profile);
        }
        cmd
    }

    fn import_command(&self, import: &CertificateImport) -> ExternalCommand {
        self.command("acm", "import-certificate")
            .arg("--certificate")
            .arg(file_blob(&import.certificate))
            .arg("--private-key")
            .arg(file_blob(&import.private_key))
            .arg("--certificate-chain")
            .arg(file_blob(&import.chain))
            .args(["--query", "CertificateArn", "--output", "text"])
    }

    fn put_parameter_command(&self, path: &str, value: &str) -> ExternalCommand {
        self.command("ssm", "put-parameter")
            .args(["--name", path, "--value", value])
            .args(["--type", "String", "--overwrite"])
    }

    fn get_parameter_command(&self, path: &str) -> ExternalCommand {
        self.command("ssm", "get-parameter")
            .args(["--name", path])
            .args(["--query", "Parameter.Value", "--output", "text"])
    }
}

fn file_blob(path: &Path) -> OsString {
    let mut arg = OsString::from("fileb://");
    arg.push(path.as_os_str());
    arg
}

/// `--output text` prints `None` for a null query result.
fn text_output(raw: String) -> String {
    if raw == "None" {
        String::new()
    } else {
        raw
    }
}

/// AWS Certificate Manager through the CLI.
#[derive(Debug, Clone, Default)]
pub struct AwsCertificateManager {
    cli: AwsCli,
}

impl AwsCertificateManager {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

impl CertificateStore for AwsCertificateManager {
    fn import_certificate(&self, import: &CertificateImport) -> Result<String> {
        tracing::info!(
            certificate = %import.certificate.display(),
            "importing certificate into ACM"
        );
        self.cli.import_command(import).run().map(text_output)
    }
}

/// SSM Parameter Store through the CLI.
#[derive(Debug, Clone, Default)]
pub struct AwsParameterStore {
    cli: AwsCli,
}

impl AwsParameterStore {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

impl ParameterStore for AwsParameterStore {
    fn put_parameter(&self, path: &str, value: &str) -> Result<()> {
        tracing::info!(path, "writing parameter");
        self.cli.put_parameter_command(path, value).run().map(|_| ())
    }

    fn get_parameter(&self, path: &str) -> Result<Option<String>> {
        match self.cli.get_parameter_command(path).run() {
            Ok(value) => Ok(Some(text_output(value)).filter(|v| !v.is_empty())),
            Err(PkiError::ExternalCommandFailed { stderr, .. })
                if stderr.contains("ParameterNotFound") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
