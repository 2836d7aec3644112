//! Workflow configuration.
//!
//! `PkiConfig` carries every input the issuance workflow reads. The CLI fills
//! it from flags and environment variables; tests build it directly.

use crate::error::{PkiError, Result};
use std::path::PathBuf;

/// Authority certificate lifetime.
pub const AUTHORITY_VALIDITY_DAYS: u32 = 3650;

/// Server certificate lifetime.
pub const SERVER_VALIDITY_DAYS: u32 = 3650;

/// Default client certificate lifetime, overridable with `CLIENT_DAYS`.
pub const DEFAULT_CLIENT_DAYS: u32 = 365;

/// Fixed client identity used as the client certificate subject.
pub const DEFAULT_CLIENT_NAME: &str = "RenderFarmClient";

/// Parameter-store path the published certificate identifier is written to.
pub const DEFAULT_PARAMETER_PATH: &str = "/render-farm/server-certificate-arn";

pub const DEFAULT_AUTHORITY_KEY_BITS: usize = 2048;
pub const DEFAULT_SERVER_KEY_BITS: usize = 4096;
pub const DEFAULT_CLIENT_KEY_BITS: usize = 2048;

const MIN_KEY_BITS: usize = 1024;

/// Configuration for the certificate issuance workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiConfig {
    /// Directory holding `certs/`, `server/` and `client/`.
    pub base_dir: PathBuf,

    /// Load-balancer DNS name, used as the server certificate subject.
    pub dns_name: Option<String>,

    pub client_name: String,
    pub client_days: u32,
    pub server_days: u32,
    pub authority_days: u32,

    /// Export password for the client bundle. `None` exports without one.
    pub client_password: Option<String>,

    pub authority_key_bits: usize,
    pub server_key_bits: usize,
    pub client_key_bits: usize,

    /// Region passed to the remote store calls.
    pub region: Option<String>,

    /// Credentials profile passed to the remote store calls.
    pub profile: Option<String>,

    pub parameter_path: String,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            dns_name: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_days: DEFAULT_CLIENT_DAYS,
            server_days: SERVER_VALIDITY_DAYS,
            authority_days: AUTHORITY_VALIDITY_DAYS,
            client_password: None,
            authority_key_bits: DEFAULT_AUTHORITY_KEY_BITS,
            server_key_bits: DEFAULT_SERVER_KEY_BITS,
            client_key_bits: DEFAULT_CLIENT_KEY_BITS,
            region: None,
            profile: None,
            parameter_path: DEFAULT_PARAMETER_PATH.to_string(),
        }
    }
}

impl PkiConfig {
    /// Create a configuration rooted at `base_dir` with every other value defaulted.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Check the values every operation depends on.
    ///
    /// The DNS name is only required by server issuance and is checked there.
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(PkiError::ConfigError(
                "client name cannot be empty".to_string(),
            ));
        }
        if self.client_name.contains(['/', '\\']) {
            return Err(PkiError::ConfigError(format!(
                "client name '{}' must not contain path separators",
                self.client_name
            )));
        }

        for (name, days) in [
            ("client_days", self.client_days),
            ("server_days", self.server_days),
            ("authority_days", self.authority_days),
        ] {
            if days == 0 {
                return Err(PkiError::ConfigError(format!("{} must be positive", name)));
            }
        }

        for (name, bits) in [
            ("authority_key_bits", self.authority_key_bits),
            ("server_key_bits", self.server_key_bits),
            ("client_key_bits", self.client_key_bits),
        ] {
            if bits < MIN_KEY_BITS {
                return Err(PkiError::ConfigError(format!(
                    "{} must be at least {}, got {}",
                    name, MIN_KEY_BITS, bits
                )));
            }
        }

        if !self.parameter_path.starts_with('/') {
            return Err(PkiError::ConfigError(format!(
                "parameter path '{}' must be absolute",
                self.parameter_path
            )));
        }

        Ok(())
    }

    /// The server subject, or a configuration error when none was given.
    pub fn require_dns_name(&self) -> Result<&str> {
        match self.dns_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(PkiError::ConfigError(
                "load-balancer DNS name is required (--dns-name or LB_DNS_NAME)".to_string(),
            )),
        }
    }
}
