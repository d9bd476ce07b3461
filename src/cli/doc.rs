//! Document subcommands.
//!
//! `attach` and `fail` drive a document through one processing attempt:
//! `pending`/`failed` → `processing` → `completed` or `failed`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{format_epoch, App};
use crate::domain::{Document, ProcessingStatus};

/// Document-related subcommands
#[derive(Subcommand, Debug)]
pub enum DocCommands {
    /// List documents in a folder (unfiled documents if no folder is given)
    List {
        /// Folder ID
        #[arg(short, long)]
        folder: Option<String>,
    },

    /// Show a document
    Show {
        /// Document ID
        document_id: String,
    },

    /// Delete a document
    Delete {
        /// Document ID
        document_id: String,
    },

    /// Attach processing results and mark the document completed
    Attach {
        /// Document ID
        document_id: String,

        /// Transcription text file
        #[arg(long)]
        transcription: Option<PathBuf>,

        /// Summary text file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Course text file
        #[arg(long)]
        course: Option<PathBuf>,

        /// Rendered PDF
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Record a failed processing attempt
    Fail {
        /// Document ID
        document_id: String,

        /// Error message
        message: String,
    },
}

pub async fn execute(app: &App, command: DocCommands) -> Result<()> {
    match command {
        DocCommands::List { folder } => list_documents(app, folder.unwrap_or_default()).await,
        DocCommands::Show { document_id } => show_document(app, &document_id).await,
        DocCommands::Delete { document_id } => {
            app.store
                .delete_document(&document_id)
                .await
                .with_context(|| format!("Failed to delete document {}", document_id))?;
            println!("Deleted document {}", document_id);
            Ok(())
        }
        DocCommands::Attach {
            document_id,
            transcription,
            summary,
            course,
            pdf,
        } => {
            let results = Attachments {
                transcription,
                summary,
                course,
                pdf,
            };
            attach_results(app, &document_id, results).await
        }
        DocCommands::Fail {
            document_id,
            message,
        } => record_failure(app, &document_id, &message).await,
    }
}

struct Attachments {
    transcription: Option<PathBuf>,
    summary: Option<PathBuf>,
    course: Option<PathBuf>,
    pdf: Option<PathBuf>,
}

impl Attachments {
    fn is_empty(&self) -> bool {
        self.transcription.is_none()
            && self.summary.is_none()
            && self.course.is_none()
            && self.pdf.is_none()
    }
}

async fn load_document(app: &App, document_id: &str) -> Result<Document> {
    app.store
        .get_document(document_id)
        .await
        .with_context(|| format!("Failed to load document {}", document_id))
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn list_documents(app: &App, folder_id: String) -> Result<()> {
    let mut docs = app.store.list_documents_by_folder(&folder_id).await;
    if docs.is_empty() {
        println!("No documents found");
        return Ok(());
    }
    docs.sort_by_key(|doc| doc.created_at);

    println!("{:<38} {:<12} {:<30}", "DOCUMENT ID", "STATUS", "TITLE");
    println!("{}", "-".repeat(80));
    for doc in docs {
        println!("{:<38} {:<12} {:<30}", doc.id, doc.status(), doc.title);
    }

    Ok(())
}

async fn show_document(app: &App, document_id: &str) -> Result<()> {
    let doc = load_document(app, document_id).await?;

    println!("Document ID: {}", doc.id);
    println!("Title:       {}", doc.title);
    println!(
        "Folder:      {}",
        if doc.is_unfiled() { "(unfiled)" } else { doc.folder_id.as_str() }
    );
    println!("Status:      {}", doc.status());
    if let Some(ref error) = doc.processing_error {
        println!("Error:       {}", error);
    }
    println!("Source:      {}", doc.source_type);
    println!("Audio:       {}", doc.audio_path);
    if let Some(ref original) = doc.original_audio_path {
        println!("Original:    {}", original);
    }
    if let Some(ref pdf) = doc.pdf_path {
        println!("PDF:         {}", pdf);
    }
    println!("Created:     {}", format_epoch(doc.created_at));
    println!("Updated:     {}", format_epoch(doc.updated_at));
    println!();
    println!("Transcription: {} chars", doc.transcription.chars().count());
    println!("Summary:       {} chars", doc.summary.chars().count());
    println!("Course:        {} chars", doc.course.chars().count());

    Ok(())
}

/// Run one processing attempt that ends in `completed`
async fn attach_results(app: &App, document_id: &str, results: Attachments) -> Result<()> {
    if results.is_empty() {
        anyhow::bail!("Nothing to attach. Use --transcription, --summary, --course or --pdf");
    }

    let mut doc = load_document(app, document_id).await?;

    // Read inputs before touching the status
    let transcription = match results.transcription {
        Some(ref path) => Some(read_text(path).await?),
        None => None,
    };
    let summary = match results.summary {
        Some(ref path) => Some(read_text(path).await?),
        None => None,
    };
    let course = match results.course {
        Some(ref path) => Some(read_text(path).await?),
        None => None,
    };

    doc.begin_processing()
        .with_context(|| format!("Cannot process document {}", document_id))?;

    if let Some(text) = transcription {
        doc.transcription = text;
    }
    if let Some(text) = summary {
        doc.summary = text;
    }
    if let Some(text) = course {
        doc.course = text;
    }
    if let Some(ref path) = results.pdf {
        let input = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open PDF: {}", path.display()))?;
        let stored = app
            .media
            .save_pdf(&doc.id, input)
            .await
            .context("Failed to store PDF")?;
        doc.pdf_path = Some(stored.to_string_lossy().into_owned());
    }

    doc.complete()?;
    let doc = app
        .store
        .update_document(doc)
        .await
        .context("Failed to update document")?;

    println!("Document {} is {}", doc.id, doc.status());
    Ok(())
}

/// Mark the current (or a fresh) attempt as failed
async fn record_failure(app: &App, document_id: &str, message: &str) -> Result<()> {
    let mut doc = load_document(app, document_id).await?;

    if doc.status() != ProcessingStatus::Processing {
        doc.begin_processing()
            .with_context(|| format!("Cannot process document {}", document_id))?;
    }
    doc.fail(message)?;

    let doc = app
        .store
        .update_document(doc)
        .await
        .context("Failed to update document")?;

    println!("Document {} is {}", doc.id, doc.status());
    Ok(())
}
