//! On-disk layout of the PKI directory.
//!
//! ```text
//! <base>/certs/ca.key, ca.crt, usage.cnf, ca.srl, state.json
//! <base>/server/server.key, server.crt, server.req.pem, server.pfx
//! <base>/client/<ClientName>.key, .crt, .req.pem, .pfx
//! ```

use crate::cert::profile::UsageProfile;
use std::path::{Path, PathBuf};

const AUTHORITY_DIR: &str = "certs";
const SERVER_DIR: &str = "server";
const CLIENT_DIR: &str = "client";
const SERVER_STEM: &str = "server";

/// Paths of one leaf's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPaths {
    pub key: PathBuf,
    pub request: PathBuf,
    pub certificate: PathBuf,
    pub bundle: PathBuf,
}

impl LeafPaths {
    fn new(dir: PathBuf, stem: &str) -> Self {
        Self {
            key: dir.join(format!("{}.key", stem)),
            request: dir.join(format!("{}.req.pem", stem)),
            certificate: dir.join(format!("{}.crt", stem)),
            bundle: dir.join(format!("{}.pfx", stem)),
        }
    }

    /// Every artifact path, in write order.
    pub fn all(&self) -> [&Path; 4] {
        [&self.key, &self.request, &self.certificate, &self.bundle]
    }
}

/// Resolves artifact paths under a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkiLayout {
    base: PathBuf,
    client_name: String,
}

impl PkiLayout {
    pub fn new(base: impl Into<PathBuf>, client_name: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client_name: client_name.into(),
        }
    }

    pub fn authority_dir(&self) -> PathBuf {
        self.base.join(AUTHORITY_DIR)
    }

    pub fn authority_key(&self) -> PathBuf {
        self.authority_dir().join("ca.key")
    }

    pub fn authority_cert(&self) -> PathBuf {
        self.authority_dir().join("ca.crt")
    }

    pub fn usage_policy(&self) -> PathBuf {
        self.authority_dir().join("usage.cnf")
    }

    pub fn serial_file(&self) -> PathBuf {
        self.authority_dir().join("ca.srl")
    }

    pub fn state_file(&self) -> PathBuf {
        self.authority_dir().join("state.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.authority_dir().join(".lock")
    }

    /// Directory holding the leaf artifacts for `role`.
    pub fn leaf_dir(&self, role: UsageProfile) -> PathBuf {
        match role {
            UsageProfile::Server => self.base.join(SERVER_DIR),
            UsageProfile::Client => self.base.join(CLIENT_DIR),
        }
    }

    pub fn leaf(&self, role: UsageProfile) -> LeafPaths {
        let stem = match role {
            UsageProfile::Server => SERVER_STEM,
            UsageProfile::Client => self.client_name.as_str(),
        };
        LeafPaths::new(self.leaf_dir(role), stem)
    }
}
