//! Persisted workflow state.
//!
//! `state.json` records what the workflow has done in this directory. The
//! artifacts themselves remain the source of truth for preconditions; the
//! record adds history (issued serials, the published identifier) and a stage
//! for `status`. It is rewritten atomically under the directory lock.

use crate::cert::profile::UsageProfile;
use crate::error::{PkiError, Result};
use crate::storage::writer::replace_file;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Furthest stage the directory has reached.
///
/// Issuing a leaf after a publish keeps `Published`. Between the two leaf
/// stages the most recent issuance wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    #[default]
    Empty,
    AuthorityReady,
    ServerIssued,
    ClientIssued,
    Published,
}

impl WorkflowStage {
    fn rank(self) -> u8 {
        match self {
            WorkflowStage::Empty => 0,
            WorkflowStage::AuthorityReady => 1,
            WorkflowStage::ServerIssued | WorkflowStage::ClientIssued => 2,
            WorkflowStage::Published => 3,
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStage::Empty => "empty",
            WorkflowStage::AuthorityReady => "authority ready",
            WorkflowStage::ServerIssued => "server issued",
            WorkflowStage::ClientIssued => "client issued",
            WorkflowStage::Published => "published",
        };
        f.write_str(name)
    }
}

/// One issued leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedLeaf {
    pub role: UsageProfile,
    pub subject: String,
    pub serial_hex: String,
    pub issued_at: u64,
}

/// The last successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedCertificate {
    pub identifier: String,
    pub parameter_path: String,
    pub published_at: u64,
}

/// Contents of `state.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(skip)]
    path: PathBuf,

    pub stage: WorkflowStage,

    #[serde(default)]
    pub authority_created_at: Option<u64>,

    #[serde(default)]
    pub issued: Vec<IssuedLeaf>,

    #[serde(default)]
    pub published: Option<PublishedCertificate>,

    #[serde(default)]
    pub updated_at: u64,
}

impl WorkflowState {
    /// Load the record at `path`; a missing file is the `Empty` stage.
    pub fn load(path: &Path) -> Result<Self> {
        let mut state = if path.exists() {
            let contents = fs::read_to_string(path).map_err(PkiError::StorageError)?;
            serde_json::from_str(&contents).map_err(PkiError::JsonError)?
        } else {
            WorkflowState::default()
        };
        state.path = path.to_path_buf();
        Ok(state)
    }

    /// Persist the record.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(PkiError::JsonError)?;
        replace_file(&self.path, json.as_bytes())
    }

    /// A new authority starts a new chain; earlier leaves and the published
    /// identifier stay in the history but the stage restarts.
    pub fn record_authority(&mut self) {
        let now = unix_now();
        self.authority_created_at = Some(now);
        self.stage = WorkflowStage::Empty;
        self.transition(WorkflowStage::AuthorityReady, now);
    }

    pub fn record_leaf(&mut self, role: UsageProfile, subject: String, serial_hex: String) {
        let now = unix_now();
        self.issued.push(IssuedLeaf {
            role,
            subject,
            serial_hex,
            issued_at: now,
        });
        let stage = match role {
            UsageProfile::Server => WorkflowStage::ServerIssued,
            UsageProfile::Client => WorkflowStage::ClientIssued,
        };
        self.transition(stage, now);
    }

    pub fn record_published(&mut self, identifier: String, parameter_path: String) {
        let now = unix_now();
        self.published = Some(PublishedCertificate {
            identifier,
            parameter_path,
            published_at: now,
        });
        self.transition(WorkflowStage::Published, now);
    }

    fn transition(&mut self, stage: WorkflowStage, now: u64) {
        self.updated_at = now;
        if stage.rank() < self.stage.rank() {
            return;
        }
        tracing::debug!(from = %self.stage, to = %stage, "workflow stage transition");
        self.stage = stage;
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let state = WorkflowState::load(&temp_dir.path().join("state.json")).unwrap();

        assert_eq!(state.stage, WorkflowStage::Empty);
        assert!(state.issued.is_empty());
        assert!(state.published.is_none());
    }

    #[test]
    fn test_state_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        {
            let mut state = WorkflowState::load(&path).unwrap();
            state.record_authority();
            state.record_leaf(UsageProfile::Server, "farm-lb".to_string(), "0A".to_string());
            state.save().unwrap();
        }

        let state = WorkflowState::load(&path).unwrap();
        assert_eq!(state.stage, WorkflowStage::ServerIssued);
        assert!(state.authority_created_at.is_some());
        assert_eq!(state.issued.len(), 1);
        assert_eq!(state.issued[0].role, UsageProfile::Server);
        assert_eq!(state.issued[0].serial_hex, "0A");
    }

    #[test]
    fn test_stage_follows_last_operation() {
        let temp_dir = TempDir::new().unwrap();
        let mut state = WorkflowState::load(&temp_dir.path().join("state.json")).unwrap();

        state.record_authority();
        state.record_leaf(UsageProfile::Server, "lb".to_string(), "01".to_string());
        state.record_leaf(UsageProfile::Client, "node".to_string(), "02".to_string());
        assert_eq!(state.stage, WorkflowStage::ClientIssued);

        state.record_published("arn:aws:acm:1".to_string(), "/render-farm/arn".to_string());
        assert_eq!(state.stage, WorkflowStage::Published);
        assert_eq!(state.published.as_ref().unwrap().identifier, "arn:aws:acm:1");
    }

    #[test]
    fn test_leaf_after_publish_keeps_published() {
        let temp_dir = TempDir::new().unwrap();
        let mut state = WorkflowState::load(&temp_dir.path().join("state.json")).unwrap();

        state.record_authority();
        state.record_leaf(UsageProfile::Server, "lb".to_string(), "01".to_string());
        state.record_published("arn:aws:acm:1".to_string(), "/render-farm/arn".to_string());
        state.record_leaf(UsageProfile::Client, "node".to_string(), "02".to_string());

        assert_eq!(state.stage, WorkflowStage::Published);
        assert_eq!(state.issued.len(), 2);
        assert!(state.published.is_some());
    }

    #[test]
    fn test_new_authority_restarts_stage() {
        let temp_dir = TempDir::new().unwrap();
        let mut state = WorkflowState::load(&temp_dir.path().join("state.json")).unwrap();

        state.record_authority();
        state.record_leaf(UsageProfile::Server, "lb".to_string(), "01".to_string());
        state.record_published("arn:aws:acm:1".to_string(), "/render-farm/arn".to_string());
        state.record_authority();

        assert_eq!(state.stage, WorkflowStage::AuthorityReady);
    }

    #[test]
    fn test_stage_serialized_snake_case() {
        let json = serde_json::to_string(&WorkflowStage::AuthorityReady).unwrap();
        assert_eq!(json, "\"authority_ready\"");
    }

    #[test]
    fn test_corrupt_state_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            WorkflowState::load(&path),
            Err(PkiError::JsonError(_))
        ));
    }
}
