//! Usage profiles and the usage-policy file.
//!
//! The authority directory carries `usage.cnf`, an INI-style file with one
//! section per profile:
//!
//! ```text
//! [server]
//! extendedKeyUsage = serverAuth
//!
//! [client]
//! extendedKeyUsage = clientAuth
//! ```
//!
//! Leaf signing reads the file back and applies the section named by the
//! requested profile.

use crate::error::{PkiError, Result};
use const_oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A named set of extended-key-usage values applied at signing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageProfile {
    Server,
    Client,
}

impl UsageProfile {
    /// Every profile, in the order the policy file lists them.
    pub const ALL: [UsageProfile; 2] = [UsageProfile::Server, UsageProfile::Client];

    /// Section name in the policy file.
    pub fn section(&self) -> &'static str {
        match self {
            UsageProfile::Server => "server",
            UsageProfile::Client => "client",
        }
    }

    fn default_usage(&self) -> &'static str {
        match self {
            UsageProfile::Server => "serverAuth",
            UsageProfile::Client => "clientAuth",
        }
    }
}

impl fmt::Display for UsageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// Map an OpenSSL short name to its extended-key-usage OID.
pub fn usage_oid(name: &str) -> Result<ObjectIdentifier> {
    match name {
        "serverAuth" => Ok(const_oid::db::rfc5280::ID_KP_SERVER_AUTH),
        "clientAuth" => Ok(const_oid::db::rfc5280::ID_KP_CLIENT_AUTH),
        "codeSigning" => Ok(const_oid::db::rfc5280::ID_KP_CODE_SIGNING),
        "emailProtection" => Ok(const_oid::db::rfc5280::ID_KP_EMAIL_PROTECTION),
        "timeStamping" => Ok(const_oid::db::rfc5280::ID_KP_TIME_STAMPING),
        "OCSPSigning" => Ok(const_oid::db::rfc5280::ID_KP_OCSP_SIGNING),
        other => Err(PkiError::ParseError(format!(
            "Unknown extended key usage: {}",
            other
        ))),
    }
}

/// Parsed contents of `usage.cnf`: section name to extended-key-usage names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsagePolicy {
    sections: BTreeMap<String, Vec<String>>,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        let sections = UsageProfile::ALL
            .iter()
            .map(|p| (p.section().to_string(), vec![p.default_usage().to_string()]))
            .collect();
        Self { sections }
    }
}

impl UsagePolicy {
    /// Parse the policy file.
    ///
    /// Blank lines and `#`/`;` comments are ignored. Keys other than
    /// `extendedKeyUsage` are accepted and ignored.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut sections: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(PkiError::ParseError(format!(
                    "usage.cnf line {}: expected key = value",
                    index + 1
                )));
            };

            let Some(section) = current.as_ref() else {
                return Err(PkiError::ParseError(format!(
                    "usage.cnf line {}: entry outside of a section",
                    index + 1
                )));
            };

            if key.trim() != "extendedKeyUsage" {
                continue;
            }

            let usages = sections.entry(section.clone()).or_default();
            for usage in value.split(',').map(str::trim).filter(|u| !u.is_empty()) {
                usage_oid(usage)?;
                usages.push(usage.to_string());
            }
        }

        Ok(Self { sections })
    }

    /// Render in the same format `parse` reads.
    ///
    /// Profile sections come first in [`UsageProfile::ALL`] order, then any
    /// other sections by name.
    pub fn render(&self) -> String {
        let profiles = UsageProfile::ALL.map(|p| p.section());
        let known = profiles
            .iter()
            .filter_map(|name| self.sections.get_key_value(*name));
        let others = self
            .sections
            .iter()
            .filter(|(name, _)| !profiles.contains(&name.as_str()));

        known
            .chain(others)
            .map(|(name, usages)| format!("[{}]\nextendedKeyUsage = {}\n", name, usages.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Extended-key-usage OIDs for `profile`.
    pub fn extended_key_usage(&self, profile: UsageProfile) -> Result<Vec<ObjectIdentifier>> {
        let usages = self.sections.get(profile.section()).ok_or_else(|| {
            PkiError::ParseError(format!(
                "usage.cnf has no [{}] section",
                profile.section()
            ))
        })?;

        if usages.is_empty() {
            return Err(PkiError::ParseError(format!(
                "usage.cnf section [{}] declares no extendedKeyUsage",
                profile.section()
            )));
        }

        usages.iter().map(|u| usage_oid(u)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_render() {
        let rendered = UsagePolicy::default().render();
        assert_eq!(
            rendered,
            "[server]\nextendedKeyUsage = serverAuth\n\n[client]\nextendedKeyUsage = clientAuth\n"
        );
    }

    #[test]
    fn test_render_orders_profiles_before_other_sections() {
        let contents = "[audit]\nextendedKeyUsage = timeStamping\n\n[client]\nextendedKeyUsage = clientAuth\n\n[server]\nextendedKeyUsage = serverAuth\n";
        let rendered = UsagePolicy::parse(contents).unwrap().render();

        let server = rendered.find("[server]").unwrap();
        let client = rendered.find("[client]").unwrap();
        let audit = rendered.find("[audit]").unwrap();
        assert!(server < client);
        assert!(client < audit);
    }

    #[test]
    fn test_render_parse_identity() {
        let policy = UsagePolicy::default();
        assert_eq!(UsagePolicy::parse(&policy.render()).unwrap(), policy);
    }

    #[test]
    fn test_each_profile_gets_one_usage() {
        let policy = UsagePolicy::default();
        assert_eq!(
            policy.extended_key_usage(UsageProfile::Server).unwrap(),
            vec![const_oid::db::rfc5280::ID_KP_SERVER_AUTH]
        );
        assert_eq!(
            policy.extended_key_usage(UsageProfile::Client).unwrap(),
            vec![const_oid::db::rfc5280::ID_KP_CLIENT_AUTH]
        );
    }

    #[test]
    fn test_parse_openssl_style_file() {
        let contents = "# issued by ops\n[ server ]\nextendedKeyUsage=serverAuth\nbasicConstraints = CA:FALSE\n\n[client]\n; nodes\nextendedKeyUsage = clientAuth, emailProtection\n";
        let policy = UsagePolicy::parse(contents).unwrap();

        assert_eq!(policy.extended_key_usage(UsageProfile::Server).unwrap().len(), 1);
        assert_eq!(policy.extended_key_usage(UsageProfile::Client).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_section() {
        let policy = UsagePolicy::parse("[server]\nextendedKeyUsage = serverAuth\n").unwrap();
        let err = policy.extended_key_usage(UsageProfile::Client).unwrap_err();
        assert!(err.to_string().contains("[client]"));
    }

    #[test]
    fn test_unknown_usage_rejected() {
        let result = UsagePolicy::parse("[server]\nextendedKeyUsage = teleport\n");
        assert!(matches!(result, Err(PkiError::ParseError(_))));
    }

    #[test]
    fn test_entry_outside_section_rejected() {
        assert!(UsagePolicy::parse("extendedKeyUsage = serverAuth\n").is_err());
    }

    #[test]
    fn test_profile_serde_names() {
        assert_eq!(serde_json::to_string(&UsageProfile::Server).unwrap(), "\"server\"");
        assert_eq!(UsageProfile::Client.to_string(), "client");
    }
}
