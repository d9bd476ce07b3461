//! Command-line interface for professor.
//!
//! Provides commands for managing folders and documents, ingesting lecture
//! audio, and issuing or checking share links.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::adapters::FfmpegEncoder;
use crate::config::{self, Settings};
use crate::core::MetadataStore;
use crate::domain::Document;
use crate::ingest::MediaIngestor;
use crate::share::{LinkRejection, ShareService};

pub mod doc;
pub mod folder;

/// Source type recorded for documents created from a local file
const SOURCE_UPLOAD: &str = "upload";

/// professor - lecture audio store with signed share links
#[derive(Parser, Debug)]
#[command(name = "professor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage folders
    Folder {
        #[command(subcommand)]
        command: folder::FolderCommands,
    },

    /// Manage documents
    Doc {
        #[command(subcommand)]
        command: doc::DocCommands,
    },

    /// Store an audio file, compress it and create a document for it
    Ingest {
        /// Audio file to ingest
        file: PathBuf,

        /// Folder to file the document into (unfiled if omitted)
        #[arg(short, long)]
        folder: Option<String>,

        /// Document title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Issue a share link for a document's PDF
    Share {
        /// Document ID
        document_id: String,
    },

    /// Check a share link
    Verify {
        /// Full URL or /path?exp=..&sig=..
        url: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Folder { command } => {
                let app = App::open().await?;
                folder::execute(&app, command).await
            }
            Commands::Doc { command } => {
                let app = App::open().await?;
                doc::execute(&app, command).await
            }
            Commands::Ingest { file, folder, title } => {
                let app = App::open().await?;
                ingest_file(&app, &file, folder, title).await
            }
            Commands::Share { document_id } => {
                let app = App::open().await?;
                share_document(&app, &document_id).await
            }
            Commands::Verify { url } => verify_link(&url),
            Commands::Config => show_config(),
        }
    }
}

/// Services wired from the resolved configuration
pub struct App {
    pub settings: Settings,
    pub store: MetadataStore,
    pub media: MediaIngestor,
    pub share: ShareService,
}

impl App {
    /// Open the store and media directories under the configured data dir
    pub async fn open() -> Result<Self> {
        let settings = config::settings()?.clone();
        Self::with_settings(settings).await
    }

    pub async fn with_settings(settings: Settings) -> Result<Self> {
        let store = MetadataStore::open(&settings.data_dir)
            .await
            .with_context(|| {
                format!("Failed to open metadata store in {}", settings.data_dir.display())
            })?;

        let encoder = FfmpegEncoder::with_binary_path(settings.transcoder_binary.clone())
            .with_timeout(settings.transcoder_timeout);
        let media = MediaIngestor::open(&settings.data_dir, settings.max_upload_bytes)
            .await
            .context("Failed to prepare media directories")?
            .with_encoder(Arc::new(encoder));

        let share = build_share_service(&settings);

        Ok(Self {
            settings,
            store,
            media,
            share,
        })
    }
}

fn build_share_service(settings: &Settings) -> ShareService {
    ShareService::new(
        settings.share_secret.clone(),
        settings.base_url.clone(),
        settings.share_ttl,
    )
}

/// Render epoch seconds for humans
pub(crate) fn format_epoch(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => secs.to_string(),
    }
}

/// Save, compress and register an audio file
async fn ingest_file(
    app: &App,
    file: &Path,
    folder: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let folder_id = folder.unwrap_or_default();
    if !folder_id.is_empty() {
        // Fail before copying anything
        app.store
            .get_folder(&folder_id)
            .await
            .with_context(|| format!("Unknown folder: {}", folder_id))?;
    }

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.clone())
    });

    let input = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("Failed to open audio file: {}", file.display()))?;

    let raw = app
        .media
        .save_upload(input, &filename)
        .await
        .with_context(|| format!("Failed to store {}", file.display()))?;
    let raw_str = raw.to_string_lossy().into_owned();

    let compressed = app.media.compress(&raw).await;

    let doc = Document::new(folder_id, title).with_source_type(SOURCE_UPLOAD);
    let doc = match &compressed {
        Ok(path) => doc.with_audio(path.to_string_lossy(), Some(raw_str)),
        Err(_) => doc.with_audio(raw_str.clone(), Some(raw_str)),
    };
    let mut doc = app
        .store
        .create_document(doc)
        .await
        .context("Failed to create document")?;

    match compressed {
        Ok(path) => {
            println!("Document: {}", doc.id);
            println!("Audio:    {}", path.display());
            println!("Original: {}", raw.display());
            Ok(())
        }
        Err(e) => {
            warn!(document_id = %doc.id, error = %e, "Compression failed");
            doc.begin_processing()?;
            doc.fail(e.to_string())?;
            app.store
                .update_document(doc.clone())
                .await
                .context("Failed to record compression failure")?;
            Err(anyhow::Error::new(e)
                .context(format!("Document {} created but compression failed", doc.id)))
        }
    }
}

/// Issue a share link for a document that has a PDF
async fn share_document(app: &App, document_id: &str) -> Result<()> {
    let doc = app
        .store
        .get_document(document_id)
        .await
        .with_context(|| format!("Failed to load document {}", document_id))?;

    if doc.pdf_path.as_deref().map_or(true, str::is_empty) {
        anyhow::bail!("Document {} has no PDF to share", document_id);
    }

    let link = app.share.issue(&doc.id);
    println!("{}", link.url);
    eprintln!("[Expires {}]", link.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));

    Ok(())
}

/// Check a link against the configured secret
fn verify_link(url: &str) -> Result<()> {
    let settings = config::settings()?;
    let share = build_share_service(settings);

    match share.verify_url(url, Utc::now()) {
        Ok(verified) => {
            println!("valid: {} (expires {})", verified.path, format_epoch(verified.expires_at));
            Ok(())
        }
        Err(LinkRejection::Expired { expired_at }) => {
            println!("expired: {}", format_epoch(expired_at));
            std::process::exit(1);
        }
        Err(rejection) => {
            println!("{}", rejection);
            std::process::exit(1);
        }
    }
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::settings()?;

    println!("Config file: {}", cfg.config_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none - using defaults)".to_string()));
    println!();
    println!("Paths:");
    println!("  Data:     {}", cfg.data_dir.display());
    println!("  Metadata: {}", cfg.data_dir.join(crate::core::SNAPSHOT_FILE_NAME).display());
    println!("  Audio:    {}", cfg.data_dir.join("audio").display());
    println!("  PDF:      {}", cfg.data_dir.join("pdf").display());
    println!();
    println!("Sharing:");
    println!("  Base URL: {}", cfg.base_url);
    println!("  TTL:      {}s", cfg.share_ttl.as_secs());
    println!(
        "  Secret:   {}",
        if cfg.uses_default_secret() { "(default - set SHARE_SECRET)" } else { "(set)" }
    );
    println!();
    println!("Uploads:");
    if cfg.max_upload_bytes == 0 {
        println!("  Max size: unlimited");
    } else {
        println!("  Max size: {} bytes", cfg.max_upload_bytes);
    }
    println!();
    println!("Transcoder:");
    println!("  Binary:   {}", cfg.transcoder_binary);
    println!("  Timeout:  {}s", cfg.transcoder_timeout.as_secs());

    Ok(())
}
