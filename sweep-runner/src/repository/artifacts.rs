//! Artifact store
//!
//! Artifacts live at `<output_dir>/<model>+<technique>+<task>.md`, with an
//! optional `<stem>.meta.json` sidecar. Every write goes to a hidden temp
//! file in the same directory and is renamed into place, so a reader never
//! observes a partial artifact, even after a crash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sweep_core::{BatchId, JobResult, JobSpec, JobStatus, Usage, output_dir};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;

/// Location and size of a written artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub path: PathBuf,
    /// Newline-delimited lines in the content
    pub line_count: usize,
}

/// Per-job metadata stored next to the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMeta {
    pub model: String,
    pub task: String,
    pub technique: String,
    pub status: JobStatus,
    pub duration_secs: f64,
    pub output_lines: Option<usize>,
    pub usage: Option<Usage>,
    pub completed_at: DateTime<Utc>,
}

impl JobMeta {
    pub fn from_result(result: &JobResult) -> Self {
        let spec = result.spec();
        Self {
            model: spec.model().to_string(),
            task: spec.task().to_string(),
            technique: spec.technique().to_string(),
            status: result.status(),
            duration_secs: result.duration().as_secs_f64(),
            output_lines: result.output_lines(),
            usage: result.usage(),
            completed_at: Utc::now(),
        }
    }
}

/// Store for job artifacts of one batch
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Directory receiving this batch's artifacts
    fn output_dir(&self) -> &Path;

    /// Canonical artifact path for a job
    fn path_for(&self, spec: &JobSpec) -> PathBuf {
        self.output_dir().join(spec.file_name())
    }

    /// Creates the output directory tree if absent
    ///
    /// Idempotent.
    async fn ensure_dir(&self) -> Result<(), StoreError>;

    /// True iff a non-empty artifact exists for the job
    async fn exists(&self, spec: &JobSpec) -> bool;

    /// Atomically writes the artifact for a job
    ///
    /// On failure nothing is left at the final path and the temp file is
    /// removed.
    async fn write(&self, spec: &JobSpec, content: &str) -> Result<Written, StoreError>;

    /// Atomically writes the metadata sidecar for a job
    async fn write_meta(&self, spec: &JobSpec, meta: &JobMeta) -> Result<(), StoreError>;

    /// Reads the metadata sidecar, if one exists
    async fn read_meta(&self, spec: &JobSpec) -> Result<Option<JobMeta>, StoreError>;
}

/// Filesystem implementation of [`ArtifactStore`]
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store for `<root>[/<batch>]`
    pub fn new(root: impl AsRef<Path>, batch: Option<&BatchId>) -> Self {
        Self {
            dir: output_dir(root.as_ref(), batch),
        }
    }

    fn meta_path(&self, spec: &JobSpec) -> PathBuf {
        self.dir.join(format!("{}.meta.json", spec.stem()))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn output_dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io("create directory", &self.dir, e))
    }

    async fn exists(&self, spec: &JobSpec) -> bool {
        match tokio::fs::metadata(self.path_for(spec)).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    async fn write(&self, spec: &JobSpec, content: &str) -> Result<Written, StoreError> {
        let path = self.path_for(spec);
        write_atomic(&path, content.as_bytes()).await?;

        let line_count = content.lines().count();
        debug!("Wrote {} line(s) to {}", line_count, path.display());

        Ok(Written { path, line_count })
    }

    async fn write_meta(&self, spec: &JobSpec, meta: &JobMeta) -> Result<(), StoreError> {
        let path = self.meta_path(spec);
        let bytes = serde_json::to_vec_pretty(meta).map_err(|source| StoreError::Metadata {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes).await
    }

    async fn read_meta(&self, spec: &JobSpec) -> Result<Option<JobMeta>, StoreError> {
        let path = self.meta_path(spec);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io("read", &path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Metadata { path, source })
    }
}

/// Temp file for `path`: hidden, same directory, unique per write
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = temp_path(path);

    let result = async {
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| StoreError::io("create", &tmp, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::io("write", &tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io("sync", &tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::io("rename into", path, e))
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove temp file {}: {}", tmp.display(), e);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn spec() -> JobSpec {
        JobSpec::new("sonnet", "task_H", "L8_generative_v2").unwrap()
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_write_then_exists() {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path(), None);
        store.ensure_dir().await.unwrap();

        assert!(!store.exists(&spec()).await);

        let written = store.write(&spec(), "hello\nworld\n").await.unwrap();
        assert_eq!(written.line_count, 2);
        assert_eq!(
            written.path,
            root.path().join("sonnet+L8_generative_v2+task_H.md")
        );
        assert!(store.exists(&spec()).await);
        assert_eq!(
            std::fs::read_to_string(&written.path).unwrap(),
            "hello\nworld\n"
        );
        assert_eq!(entries(root.path()), vec!["sonnet+L8_generative_v2+task_H.md"]);
    }

    #[tokio::test]
    async fn test_line_count_without_trailing_newline() {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path(), None);
        store.ensure_dir().await.unwrap();

        let written = store.write(&spec(), "a\nb\nc").await.unwrap();
        assert_eq!(written.line_count, 3);
    }

    #[tokio::test]
    async fn test_empty_artifact_does_not_count() {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path(), None);
        store.ensure_dir().await.unwrap();

        std::fs::write(store.path_for(&spec()), "").unwrap();
        assert!(!store.exists(&spec()).await);
    }

    #[tokio::test]
    async fn test_leftover_temp_file_is_not_an_artifact() {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path(), None);
        store.ensure_dir().await.unwrap();

        // A crash between temp write and rename leaves only the temp file.
        let final_path = store.path_for(&spec());
        std::fs::write(temp_path(&final_path), "partial output").unwrap();

        assert!(!final_path.exists());
        assert!(!store.exists(&spec()).await);
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_nothing_behind() {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path(), None);
        store.ensure_dir().await.unwrap();

        // A non-empty directory at the final path makes the rename fail.
        let final_path = store.path_for(&spec());
        std::fs::create_dir(&final_path).unwrap();
        std::fs::write(final_path.join("keep"), "x").unwrap();

        let err = store.write(&spec(), "text\n").await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(entries(root.path()), vec!["sonnet+L8_generative_v2+task_H.md"]);
        assert!(!store.exists(&spec()).await);
    }

    #[tokio::test]
    async fn test_write_into_missing_dir_fails() {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path().join("missing"), None);

        assert!(store.write(&spec(), "text\n").await.is_err());
        assert!(!root.path().join("missing").exists());
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let root = tempdir().unwrap();
        let batch = BatchId::new("round21").unwrap();
        let store = FsArtifactStore::new(root.path(), Some(&batch));

        store.ensure_dir().await.unwrap();
        store.ensure_dir().await.unwrap();
        assert!(root.path().join("round21").is_dir());
    }

    #[tokio::test]
    async fn test_meta_roundtrip() {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path(), None);
        store.ensure_dir().await.unwrap();

        assert_eq!(store.read_meta(&spec()).await.unwrap(), None);

        let result = JobResult::succeeded(
            spec(),
            Duration::from_secs(87),
            store.path_for(&spec()),
            406,
            None,
        );
        let meta = JobMeta::from_result(&result);
        store.write_meta(&spec(), &meta).await.unwrap();

        let loaded = store.read_meta(&spec()).await.unwrap().unwrap();
        assert_eq!(loaded, meta);
        assert_eq!(loaded.output_lines, Some(406));
        assert!(root.path().join("sonnet+L8_generative_v2+task_H.meta.json").is_file());
    }

    #[tokio::test]
    async fn test_corrupt_meta_is_reported() {
        let root = tempdir().unwrap();
        let store = FsArtifactStore::new(root.path(), None);
        store.ensure_dir().await.unwrap();

        std::fs::write(store.meta_path(&spec()), "{not json").unwrap();
        assert!(matches!(
            store.read_meta(&spec()).await,
            Err(StoreError::Metadata { .. })
        ));
    }
}
