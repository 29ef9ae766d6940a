// ABOUTME: Persisted history of completed deployments keyed by version identifier.
// ABOUTME: Read whole, rewritten whole; a single writer is assumed.

use crate::types::{ImageRef, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HistoryError {
    #[snafu(display("cannot read history file {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("history file {} is malformed: {source}", path.display()))]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("cannot encode history: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("cannot write history file {}: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T, E = HistoryError> = std::result::Result<T, E>;

/// Compose-specific facts recorded for a multi-service deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Compose service the image was built for.
    pub service: String,
    /// Descriptor file name inside the remote directory.
    #[serde(default = "default_descriptor_file")]
    pub file: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_env: Option<String>,
}

fn default_descriptor_file() -> String {
    "docker-compose.yml".to_string()
}

/// One completed deployment. Never modified once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub version: VersionId,
    pub revision: String,
    #[serde(default)]
    pub summary: String,
    pub image: ImageRef,
    #[serde(default)]
    pub tag: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ServiceDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
}

/// Everything about a record except its version, which the store assigns.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub revision: String,
    pub summary: String,
    pub image: ImageRef,
    pub services: Option<ServiceDescriptor>,
}

/// In-memory view of the history file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: HashMap<VersionId, DeploymentRecord>,
}

impl History {
    pub fn get(&self, version: &VersionId) -> Option<&DeploymentRecord> {
        self.records.get(version)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, record: DeploymentRecord) {
        self.records.insert(record.version.clone(), record);
    }

    /// Identifiers, newest first.
    pub fn versions(&self) -> Vec<VersionId> {
        let mut versions: Vec<_> = self.records.keys().cloned().collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    /// Records, newest first.
    pub fn records(&self) -> Vec<&DeploymentRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by(|a, b| b.version.cmp(&a.version));
        records
    }
}

/// The history file on disk.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole history. A missing file is an empty history.
    pub fn load(&self) -> Result<History> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(History::default()),
            Err(source) => {
                return Err(HistoryError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(History::default());
        }

        serde_json::from_str(&content).context(ParseSnafu { path: &self.path })
    }

    /// Assign the next version to `draft`, append it, and rewrite the file.
    pub fn append(&self, draft: RecordDraft, now: DateTime<Utc>) -> Result<DeploymentRecord> {
        let mut history = self.load()?;
        let version = VersionId::next_after(now, history.records.keys());

        let record = DeploymentRecord {
            version,
            revision: draft.revision,
            summary: draft.summary,
            tag: draft.image.tag().unwrap_or_default().to_string(),
            image: draft.image,
            created_at: now,
            services: draft.services,
            deployed_by: Some(gethostname::gethostname().to_string_lossy().into_owned()),
        };
        history.insert(record.clone());
        self.save(&history)?;

        tracing::debug!(version = %record.version, path = %self.path.display(), "history updated");
        Ok(record)
    }

    fn save(&self, history: &History) -> Result<()> {
        let json = serde_json::to_string_pretty(history).context(EncodeSnafu)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(WriteSnafu { path: parent })?;
        }

        // Write beside the target, then swap it in.
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, json).context(WriteSnafu { path: &staging })?;
        std::fs::rename(&staging, &self.path).context(WriteSnafu { path: &self.path })
    }
}

/// Version identifiers in the history file at `path`, newest first.
pub fn list_versions(path: &Path) -> Result<Vec<VersionId>> {
    Ok(HistoryStore::new(path).load()?.versions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(tag: &str) -> RecordDraft {
        RecordDraft {
            revision: "abc1234".to_string(),
            summary: "Fix login redirect".to_string(),
            image: ImageRef::parse(&format!("myapp:{tag}")).unwrap(),
            services: None,
        }
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn append_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join(".tugboat/history.json"));
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let record = store.append(draft("20231114221320"), now).unwrap();

        assert_eq!(record.version.as_str(), "1700000000");
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap().get(&record.version), Some(&record));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = HistoryStore::new(&path).load().unwrap_err();
        assert!(matches!(err, HistoryError::Parse { .. }));
        assert!(err.to_string().contains("history.json"));
    }

    #[test]
    fn versions_are_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path);
        for secs in [100, 300, 200] {
            store
                .append(draft("t"), Utc.timestamp_opt(secs, 0).unwrap())
                .unwrap();
        }

        let versions: Vec<String> = list_versions(&path)
            .unwrap()
            .into_iter()
            .map(|v| v.to_string())
            .collect();
        // The third append lands after 300 even though its clock says 200.
        assert_eq!(versions, ["301", "300", "100"]);
    }
}
