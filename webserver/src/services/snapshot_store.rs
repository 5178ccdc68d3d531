//! JSON snapshot persistence
//!
//! The snapshot is written to a sibling temp file and renamed into place so a
//! crash mid-write never leaves a truncated snapshot behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{WebServerError, WebServerResult};
use crate::traits::SnapshotStore;
use crate::types::{SNAPSHOT_VERSION, Snapshot, SnapshotSummary};
use shared::{ProcessId, process_info};

/// Snapshot file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> WebServerResult<SnapshotSummary> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(&snapshot)?;
        let temp = self.temp_path();
        fs::write(&temp, &json).await?;
        fs::rename(&temp, &self.path).await?;

        let summary = SnapshotSummary::of(&snapshot, self.location());
        process_info!(
            ProcessId::current(),
            "💾 Snapshot saved to {} ({} patients, {} analyses)",
            summary.path,
            summary.patients,
            summary.analyses
        );
        Ok(summary)
    }

    async fn load(&self) -> WebServerResult<Snapshot> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WebServerError::FileNotFound(self.location()));
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| WebServerError::Snapshot(format!("{} is not a valid snapshot: {}", self.location(), e)))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(WebServerError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        process_info!(ProcessId::current(), "📂 Snapshot loaded from {}", self.location());
        Ok(snapshot)
    }

    async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeSettings;
    use shared::NewPatient;

    fn snapshot() -> Snapshot {
        let patient = NewPatient {
            full_name: "Ana Torres".to_string(),
            age: 41,
            document_id: "A-1".to_string(),
            email: Some("ana@example.org".to_string()),
            notes: String::new(),
        }
        .into_patient()
        .unwrap();
        Snapshot::new(RuntimeSettings::default(), vec![patient], Vec::new(), Vec::new())
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested").join("state.json"));
        assert!(!store.exists().await);

        let original = snapshot();
        let summary = store.save(original.clone()).await.unwrap();
        assert_eq!(summary.patients, 1);
        assert!(store.exists().await);
        assert!(!store.temp_path().exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load().await, Err(WebServerError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut future = snapshot();
        future.version = SNAPSHOT_VERSION + 1;
        std::fs::write(&path, serde_json::to_vec(&future).unwrap()).unwrap();

        let err = FileSnapshotStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, WebServerError::Snapshot(_)));
    }

    #[tokio::test]
    async fn test_corrupt_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{ truncated").unwrap();

        let err = FileSnapshotStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, WebServerError::Snapshot(_)));
    }
}
