//! Documents and their processing lifecycle.
//!
//! A document starts `pending`, moves to `processing` when an attempt begins
//! and ends the attempt as `completed` or `failed`. A failed document may be
//! picked up again by a new attempt.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Processing state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Stored, no attempt started yet
    Pending,

    /// An attempt is running
    Processing,

    /// The last attempt succeeded
    Completed,

    /// The last attempt failed (see `processing_error`)
    Failed,
}

impl ProcessingStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Failed, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown processing status: {}", other)),
        }
    }
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid status transition: {from} → {to}")]
pub struct InvalidTransition {
    pub from: ProcessingStatus,
    pub to: ProcessingStatus,
}

/// One uploaded recording and everything derived from it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Identifier (assigned by the store when empty)
    #[serde(default)]
    pub id: String,

    /// Owning folder; empty means unfiled
    #[serde(default)]
    pub folder_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub transcription: String,

    #[serde(default)]
    pub summary: String,

    /// Generated course text
    #[serde(default)]
    pub course: String,

    /// Audio used for processing (usually the compressed copy)
    #[serde(default)]
    pub audio_path: String,

    /// Audio as uploaded, before compression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_audio_path: Option<String>,

    /// `None` means "unset": the store fills in a value on create and keeps
    /// the existing one on update.
    #[serde(
        default,
        deserialize_with = "empty_status_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub processing_status: Option<ProcessingStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,

    /// Where the document came from, e.g. "upload"
    #[serde(default)]
    pub source_type: String,

    /// Epoch seconds; zero means "not set"
    #[serde(default)]
    pub created_at: i64,

    #[serde(default)]
    pub updated_at: i64,
}

/// Legacy files may carry `"processingStatus": ""`
fn empty_status_as_none<'de, D>(deserializer: D) -> Result<Option<ProcessingStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl Document {
    /// Create a document for a folder (empty folder ID = unfiled)
    pub fn new(folder_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the audio paths (processing copy and optional original)
    pub fn with_audio(
        mut self,
        audio_path: impl Into<String>,
        original_audio_path: Option<String>,
    ) -> Self {
        self.audio_path = audio_path.into();
        self.original_audio_path = original_audio_path;
        self
    }

    /// Set the source type tag
    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = source_type.into();
        self
    }

    /// Current status, treating unset as pending
    pub fn status(&self) -> ProcessingStatus {
        self.processing_status.unwrap_or(ProcessingStatus::Pending)
    }

    /// Whether the document belongs to no folder
    pub fn is_unfiled(&self) -> bool {
        self.folder_id.is_empty()
    }

    /// Start a processing attempt (from `pending` or `failed`)
    pub fn begin_processing(&mut self) -> Result<(), InvalidTransition> {
        self.transition(ProcessingStatus::Processing)?;
        self.processing_error = None;
        Ok(())
    }

    /// Finish the current attempt successfully
    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        self.transition(ProcessingStatus::Completed)?;
        self.processing_error = None;
        Ok(())
    }

    /// Finish the current attempt with an error
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(ProcessingStatus::Failed)?;
        self.processing_error = Some(error.into());
        Ok(())
    }

    fn transition(&mut self, to: ProcessingStatus) -> Result<(), InvalidTransition> {
        let from = self.status();
        if !from.can_transition_to(to) {
            return Err(InvalidTransition { from, to });
        }
        self.processing_status = Some(to);
        Ok(())
    }

    /// Drop an error message that no longer applies.
    ///
    /// `processing_error` is only meaningful while the status is `failed`.
    pub(crate) fn clear_stale_error(&mut self) {
        let keep = self.processing_status == Some(ProcessingStatus::Failed)
            && self
                .processing_error
                .as_deref()
                .is_some_and(|e| !e.trim().is_empty());
        if !keep {
            self.processing_error = None;
        }
    }
}
