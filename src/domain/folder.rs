//! Folders group documents.

use serde::{Deserialize, Serialize};

use super::{new_id, now_epoch};

/// A named collection of documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Server-generated identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Creation time (epoch seconds)
    pub created_at: i64,

    /// Last modification time (epoch seconds)
    pub updated_at: i64,

    /// IDs of the documents filed here. Order carries no meaning.
    #[serde(default)]
    pub document_ids: Vec<String>,
}

impl Folder {
    /// Create an empty folder with a fresh ID and timestamps
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_epoch();
        Self {
            id: new_id(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            document_ids: Vec::new(),
        }
    }

    /// Check whether a document is listed in this folder
    pub fn contains(&self, document_id: &str) -> bool {
        self.document_ids.iter().any(|id| id == document_id)
    }

    /// Add a document ID. Returns false if it was already listed.
    pub fn attach(&mut self, document_id: &str) -> bool {
        if self.contains(document_id) {
            return false;
        }
        self.document_ids.push(document_id.to_string());
        self.updated_at = now_epoch();
        true
    }

    /// Remove a document ID. Returns false if it was not listed.
    pub fn detach(&mut self, document_id: &str) -> bool {
        let before = self.document_ids.len();
        self.document_ids.retain(|id| id != document_id);
        if self.document_ids.len() == before {
            return false;
        }
        self.updated_at = now_epoch();
        true
    }
}
