//! Authoritative folder/document store.
//!
//! The whole graph lives in memory behind a single reader/writer lock. Every
//! mutation holds the write lock for its full read-modify-persist sequence and
//! returns only after the snapshot file has been replaced on disk.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::snapshot::{MetadataSnapshot, SnapshotFile};
use crate::domain::{new_id, now_epoch, Document, Folder, ProcessingStatus};
use crate::error::ErrorKind;

/// Name of the snapshot file inside the data directory
pub const SNAPSHOT_FILE_NAME: &str = "meta.json";

/// Entity referenced by a `NotFound` error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Folder,
    Document,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Folder => f.write_str("Folder"),
            Self::Document => f.write_str("Document"),
        }
    }
}

/// Errors that can occur with the metadata store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Failed to persist snapshot {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Data directory is in use by another process: {path}")]
    Locked { path: PathBuf },
}

impl StoreError {
    fn folder_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: EntityKind::Folder,
            id: id.to_string(),
        }
    }

    fn document_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: EntityKind::Document,
            id: id.to_string(),
        }
    }

    /// Coarse category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Persistence { .. } | Self::Serialization(_) => ErrorKind::Persistence,
            Self::Io { .. } | Self::Corrupt { .. } | Self::Locked { .. } => ErrorKind::Io,
        }
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Folder/document store backed by one JSON snapshot file
pub struct MetadataStore {
    /// Snapshot file on disk
    file: SnapshotFile,

    /// In-memory copy, always equal to the last successful write
    state: Arc<RwLock<MetadataSnapshot>>,

    /// Advisory lock held for the lifetime of the store
    _lock: File,
}

impl MetadataStore {
    /// Open (or bootstrap) the store in `base_dir`
    pub async fn open(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref();
        tokio::fs::create_dir_all(base_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: base_dir.to_path_buf(),
                source,
            })?;

        let lock = acquire_lock(&base_dir.join(format!("{}.lock", SNAPSHOT_FILE_NAME)))?;
        let file = SnapshotFile::new(base_dir.join(SNAPSHOT_FILE_NAME));

        let snapshot = match file.read().await? {
            Some(mut snapshot) => {
                let backfilled = snapshot.normalize();
                if backfilled > 0 {
                    info!(count = backfilled, "Backfilled missing processing status");
                    file.write(&snapshot).await?;
                }
                snapshot
            }
            None => {
                debug!(path = %file.path().display(), "Initializing empty snapshot");
                let snapshot = MetadataSnapshot::new();
                file.write(&snapshot).await?;
                snapshot
            }
        };

        info!(
            path = %file.path().display(),
            folders = snapshot.folders.len(),
            documents = snapshot.documents.len(),
            "Metadata store opened"
        );

        Ok(Self {
            file,
            state: Arc::new(RwLock::new(snapshot)),
            _lock: lock,
        })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A copy of the whole graph
    pub async fn snapshot(&self) -> MetadataSnapshot {
        self.state.read().await.clone()
    }

    /// Apply a mutation under the write lock and persist it.
    ///
    /// The mutation runs on a working copy which replaces the in-memory state
    /// only once the write succeeded, so memory never runs ahead of disk.
    /// The write and the swap run in their own task holding the lock, so a
    /// caller that stops waiting cannot leave disk ahead of memory either.
    async fn mutate<T, F>(&self, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut MetadataSnapshot) -> Result<T, StoreError>,
    {
        let mut guard = Arc::clone(&self.state).write_owned().await;
        let mut working = guard.clone();
        let output = apply(&mut working)?;

        let file = self.file.clone();
        let commit = tokio::spawn(async move {
            if let Err(e) = file.write(&working).await {
                warn!(error = %e, "Snapshot write failed, in-memory state left unchanged");
                return Err(e);
            }
            *guard = working;
            Ok(())
        });

        commit.await.map_err(|join| StoreError::Persistence {
            path: self.file.path().to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, join),
        })??;

        Ok(output)
    }

    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    /// Create a folder
    pub async fn create_folder(&self, name: &str) -> Result<Folder, StoreError> {
        let folder = Folder::new(name);
        let created = self
            .mutate(|snapshot| {
                snapshot.folders.insert(folder.id.clone(), folder.clone());
                Ok(folder)
            })
            .await?;

        info!(folder_id = %created.id, "Folder created");
        Ok(created)
    }

    /// All folders, in no particular order
    pub async fn list_folders(&self) -> Vec<Folder> {
        self.state.read().await.folders.values().cloned().collect()
    }

    pub async fn get_folder(&self, id: &str) -> Result<Folder, StoreError> {
        self.state
            .read()
            .await
            .folders
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::folder_not_found(id))
    }

    /// Rename a folder
    pub async fn rename_folder(&self, id: &str, name: &str) -> Result<Folder, StoreError> {
        self.mutate(|snapshot| {
            let folder = snapshot
                .folders
                .get_mut(id)
                .ok_or_else(|| StoreError::folder_not_found(id))?;
            folder.name = name.to_string();
            folder.updated_at = now_epoch();
            Ok(folder.clone())
        })
        .await
    }

    /// Delete a folder and every document it owns
    pub async fn delete_folder(&self, id: &str) -> Result<(), StoreError> {
        let removed = self
            .mutate(|snapshot| {
                let folder = snapshot
                    .folders
                    .remove(id)
                    .ok_or_else(|| StoreError::folder_not_found(id))?;

                let mut removed = 0;
                for doc_id in &folder.document_ids {
                    if snapshot.documents.remove(doc_id).is_some() {
                        removed += 1;
                    }
                }

                // Documents pointing at the folder without being listed
                let before = snapshot.documents.len();
                snapshot.documents.retain(|_, doc| doc.folder_id != id);
                removed += before - snapshot.documents.len();

                Ok(removed)
            })
            .await?;

        info!(folder_id = %id, documents = removed, "Folder deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Store a new document and file it into its folder
    pub async fn create_document(&self, mut doc: Document) -> Result<Document, StoreError> {
        if doc.id.is_empty() {
            doc.id = new_id();
        }
        if doc.processing_status.is_none() {
            doc.processing_status = Some(ProcessingStatus::Pending);
        }
        let now = now_epoch();
        if doc.created_at == 0 {
            doc.created_at = now;
        }
        doc.updated_at = now;
        doc.clear_stale_error();

        let created = self
            .mutate(|snapshot| {
                if !doc.is_unfiled() && !snapshot.folders.contains_key(&doc.folder_id) {
                    return Err(StoreError::folder_not_found(&doc.folder_id));
                }

                if let Some(previous) = snapshot.documents.get(&doc.id) {
                    if previous.folder_id != doc.folder_id {
                        let old_folder = previous.folder_id.clone();
                        snapshot.detach(&old_folder, &doc.id);
                    }
                }

                snapshot.attach(&doc.folder_id, &doc.id);
                snapshot.documents.insert(doc.id.clone(), doc.clone());
                Ok(doc)
            })
            .await?;

        info!(document_id = %created.id, folder_id = %created.folder_id, "Document created");
        Ok(created)
    }

    pub async fn get_document(&self, id: &str) -> Result<Document, StoreError> {
        self.state
            .read()
            .await
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::document_not_found(id))
    }

    /// Documents whose owning folder is `folder_id`, in no particular order
    pub async fn list_documents_by_folder(&self, folder_id: &str) -> Vec<Document> {
        self.state
            .read()
            .await
            .documents
            .values()
            .filter(|doc| doc.folder_id == folder_id)
            .cloned()
            .collect()
    }

    /// Replace an existing document.
    ///
    /// A zero `created_at` keeps the stored one, an unset status keeps the
    /// stored status, and a changed folder moves the membership entry.
    pub async fn update_document(&self, mut doc: Document) -> Result<Document, StoreError> {
        self.mutate(|snapshot| {
            let existing = snapshot
                .documents
                .get(&doc.id)
                .ok_or_else(|| StoreError::document_not_found(&doc.id))?;

            if doc.created_at == 0 {
                doc.created_at = existing.created_at;
            }
            if doc.processing_status.is_none() {
                doc.processing_status = existing.processing_status;
            }

            if doc.folder_id != existing.folder_id {
                if !doc.is_unfiled() && !snapshot.folders.contains_key(&doc.folder_id) {
                    return Err(StoreError::folder_not_found(&doc.folder_id));
                }
                let old_folder = existing.folder_id.clone();
                snapshot.detach(&old_folder, &doc.id);
                snapshot.attach(&doc.folder_id, &doc.id);
            }

            doc.updated_at = now_epoch();
            doc.clear_stale_error();
            snapshot.documents.insert(doc.id.clone(), doc.clone());
            Ok(doc)
        })
        .await
    }

    /// Remove a document and its folder membership entry
    pub async fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|snapshot| {
            let doc = snapshot
                .documents
                .remove(id)
                .ok_or_else(|| StoreError::document_not_found(id))?;
            snapshot.detach(&doc.folder_id, id);
            Ok(())
        })
        .await?;

        info!(document_id = %id, "Document deleted");
        Ok(())
    }
}

/// Take the single-writer lock for a data directory
fn acquire_lock(path: &Path) -> Result<File, StoreError> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    file.try_lock_exclusive().map_err(|_| StoreError::Locked {
        path: path.to_path_buf(),
    })?;

    Ok(file)
}
