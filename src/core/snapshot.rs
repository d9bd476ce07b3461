//! The durable snapshot: every folder and document in one JSON file.
//!
//! Writes go to a temporary file in the same directory which is flushed and
//! then renamed over the target, so the file on disk is always either the
//! previous complete snapshot or the new one.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::fs;

use super::store::StoreError;
use crate::domain::{Document, Folder, ProcessingStatus};

/// Complete folder/document graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Folder ID → folder
    #[serde(default)]
    pub folders: BTreeMap<String, Folder>,

    /// Document ID → document
    #[serde(default)]
    pub documents: BTreeMap<String, Document>,
}

impl MetadataSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Backfill documents written before processing status existed.
    ///
    /// A document with a transcription is considered `completed`, anything
    /// else `pending`. Running it twice changes nothing the second time.
    /// Returns the number of documents updated.
    pub fn normalize(&mut self) -> usize {
        let mut fixed = 0;
        for doc in self.documents.values_mut() {
            if doc.processing_status.is_some() {
                continue;
            }
            let status = if doc.transcription.trim().is_empty() {
                ProcessingStatus::Pending
            } else {
                ProcessingStatus::Completed
            };
            doc.processing_status = Some(status);
            fixed += 1;
        }
        fixed
    }

    /// Add a document to a folder's membership list (no-op for unfiled)
    pub(crate) fn attach(&mut self, folder_id: &str, document_id: &str) {
        if folder_id.is_empty() {
            return;
        }
        if let Some(folder) = self.folders.get_mut(folder_id) {
            folder.attach(document_id);
        }
    }

    /// Remove a document from a folder's membership list
    pub(crate) fn detach(&mut self, folder_id: &str, document_id: &str) {
        if folder_id.is_empty() {
            return;
        }
        if let Some(folder) = self.folders.get_mut(folder_id) {
            folder.detach(document_id);
        }
    }
}

/// On-disk location of a snapshot
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

/// A fully written temporary file that has not replaced the snapshot yet
#[derive(Debug)]
pub struct StagedSnapshot {
    temp: NamedTempFile,
}

impl StagedSnapshot {
    /// Path of the temporary file
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Leave the temporary file on disk without committing it.
    ///
    /// This is what an interrupted writer leaves behind.
    pub fn abandon(self) -> io::Result<PathBuf> {
        self.temp.into_temp_path().keep().map_err(|e| e.error)
    }
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot.
    ///
    /// Returns `None` when the file is missing or holds no JSON at all, so the
    /// caller can bootstrap an empty one.
    pub async fn read(&self) -> Result<Option<MetadataSnapshot>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Write the temporary file next to the snapshot and flush it to disk
    pub fn stage(&self, snapshot: &MetadataSnapshot) -> Result<StagedSnapshot, StoreError> {
        let bytes = encode(snapshot)?;
        stage_bytes(&self.path, &bytes)
            .map(|temp| StagedSnapshot { temp })
            .map_err(|source| self.persistence_error(source))
    }

    /// Atomically replace the snapshot with a staged file
    pub fn commit(&self, staged: StagedSnapshot) -> Result<(), StoreError> {
        staged
            .temp
            .persist(&self.path)
            .map_err(|e| e.error)
            .and_then(|_| sync_parent_dir(&self.path))
            .map_err(|source| self.persistence_error(source))
    }

    /// Stage and commit, off the async runtime's worker threads
    pub async fn write(&self, snapshot: &MetadataSnapshot) -> Result<(), StoreError> {
        let bytes = encode(snapshot)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let temp = stage_bytes(&path, &bytes)?;
            temp.persist(&path).map_err(|e| e.error)?;
            sync_parent_dir(&path)
        })
        .await
        .map_err(|join| self.persistence_error(io::Error::new(io::ErrorKind::Other, join)))?
        .map_err(|source| self.persistence_error(source))
    }

    fn persistence_error(&self, source: io::Error) -> StoreError {
        StoreError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

fn encode(snapshot: &MetadataSnapshot) -> Result<Vec<u8>, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(snapshot)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Directory holding `target`
fn parent_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn stage_bytes(target: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let dir = parent_dir(target);

    let mut temp = tempfile::Builder::new()
        .prefix("meta-")
        .suffix(".json")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

/// Flush the directory entry so the rename itself survives a crash
#[cfg(unix)]
fn sync_parent_dir(target: &Path) -> io::Result<()> {
    std::fs::File::open(parent_dir(target))?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_snapshot() -> MetadataSnapshot {
        let mut snapshot = MetadataSnapshot::new();
        let folder = Folder {
            id: "folder-1".to_string(),
            name: "Algebra".to_string(),
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
            document_ids: vec!["doc-1".to_string()],
        };
        let mut doc = Document::new("folder-1", "Week 1");
        doc.id = "doc-1".to_string();
        doc.processing_status = Some(ProcessingStatus::Pending);
        doc.created_at = 1_700_000_000;
        doc.updated_at = 1_700_000_000;
        snapshot.documents.insert(doc.id.clone(), doc);
        snapshot.folders.insert(folder.id.clone(), folder);
        snapshot
    }

    #[test]
    fn test_normalize_backfills_status() {
        let mut snapshot = MetadataSnapshot::new();

        let mut transcribed = Document::new("", "Transcribed");
        transcribed.id = "a".to_string();
        transcribed.transcription = "hello world".to_string();

        let mut blank = Document::new("", "Blank");
        blank.id = "b".to_string();
        blank.transcription = "   ".to_string();

        let mut failed = Document::new("", "Failed");
        failed.id = "c".to_string();
        failed.processing_status = Some(ProcessingStatus::Failed);

        snapshot.documents.insert("a".to_string(), transcribed);
        snapshot.documents.insert("b".to_string(), blank);
        snapshot.documents.insert("c".to_string(), failed);

        assert_eq!(snapshot.normalize(), 2);
        assert_eq!(
            snapshot.documents["a"].processing_status,
            Some(ProcessingStatus::Completed)
        );
        assert_eq!(
            snapshot.documents["b"].processing_status,
            Some(ProcessingStatus::Pending)
        );
        assert_eq!(
            snapshot.documents["c"].processing_status,
            Some(ProcessingStatus::Failed)
        );

        // Idempotent
        let before = snapshot.clone();
        assert_eq!(snapshot.normalize(), 0);
        assert_eq!(snapshot, before);
    }

    #[tokio::test]
    async fn test_read_missing_and_empty_file() {
        let temp = TempDir::new().unwrap();
        let file = SnapshotFile::new(temp.path().join("meta.json"));
        assert!(file.read().await.unwrap().is_none());

        std::fs::write(file.path(), "  \n").unwrap();
        assert!(file.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let file = SnapshotFile::new(temp.path().join("meta.json"));
        std::fs::write(file.path(), "{ not json").unwrap();

        let err = file.read().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_write_uses_two_space_indent() {
        let temp = TempDir::new().unwrap();
        let file = SnapshotFile::new(temp.path().join("meta.json"));
        file.write(&sample_snapshot()).await.unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("{\n  \"folders\": {"));
        assert!(content.contains("\n  \"documents\": {"));
    }

    #[tokio::test]
    async fn test_staged_write_does_not_touch_target_until_commit() {
        let temp = TempDir::new().unwrap();
        let file = SnapshotFile::new(temp.path().join("meta.json"));
        file.write(&MetadataSnapshot::new()).await.unwrap();

        let staged = file.stage(&sample_snapshot()).unwrap();
        assert_eq!(staged.temp_path().parent(), Some(temp.path()));
        assert_eq!(file.read().await.unwrap(), Some(MetadataSnapshot::new()));

        file.commit(staged).unwrap();
        assert_eq!(file.read().await.unwrap(), Some(sample_snapshot()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_syncs_the_directory_entry() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("meta.json");
        assert!(sync_parent_dir(&target).is_ok());

        // The directory is opened for real: a vanished one is an error
        let gone = temp.path().join("gone").join("meta.json");
        assert!(sync_parent_dir(&gone).is_err());

        let file = SnapshotFile::new(&target);
        file.write(&sample_snapshot()).await.unwrap();
        let staged = file.stage(&MetadataSnapshot::new()).unwrap();
        file.commit(staged).unwrap();
        assert_eq!(file.read().await.unwrap(), Some(MetadataSnapshot::new()));
    }
}
