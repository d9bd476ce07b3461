//! Folder subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{format_epoch, App};

/// Folder-related subcommands
#[derive(Subcommand, Debug)]
pub enum FolderCommands {
    /// Create a folder
    Create {
        /// Folder name
        name: String,
    },

    /// List folders
    List,

    /// Show a folder and its documents
    Show {
        /// Folder ID
        folder_id: String,
    },

    /// Rename a folder
    Rename {
        /// Folder ID
        folder_id: String,

        /// New name
        name: String,
    },

    /// Delete a folder and every document in it
    Delete {
        /// Folder ID
        folder_id: String,
    },
}

pub async fn execute(app: &App, command: FolderCommands) -> Result<()> {
    match command {
        FolderCommands::Create { name } => {
            let folder = app
                .store
                .create_folder(&name)
                .await
                .context("Failed to create folder")?;
            println!("{}", folder.id);
        }
        FolderCommands::List => {
            let mut folders = app.store.list_folders().await;
            if folders.is_empty() {
                println!("No folders found");
                return Ok(());
            }
            folders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));

            println!("{:<38} {:<30} {:>5}", "FOLDER ID", "NAME", "DOCS");
            println!("{}", "-".repeat(75));
            for folder in folders {
                println!(
                    "{:<38} {:<30} {:>5}",
                    folder.id,
                    folder.name,
                    folder.document_ids.len()
                );
            }
        }
        FolderCommands::Show { folder_id } => {
            let folder = app
                .store
                .get_folder(&folder_id)
                .await
                .with_context(|| format!("Failed to load folder {}", folder_id))?;

            println!("Folder ID: {}", folder.id);
            println!("Name:      {}", folder.name);
            println!("Created:   {}", format_epoch(folder.created_at));
            println!("Updated:   {}", format_epoch(folder.updated_at));
            println!("\nDocuments:");
            if folder.document_ids.is_empty() {
                println!("  (none)");
            }
            for id in &folder.document_ids {
                match app.store.get_document(id).await {
                    Ok(doc) => println!("  {}  {:<10}  {}", doc.id, doc.status(), doc.title),
                    Err(_) => println!("  {}  (missing)", id),
                }
            }
        }
        FolderCommands::Rename { folder_id, name } => {
            let folder = app
                .store
                .rename_folder(&folder_id, &name)
                .await
                .with_context(|| format!("Failed to rename folder {}", folder_id))?;
            println!("Renamed {} to {:?}", folder.id, folder.name);
        }
        FolderCommands::Delete { folder_id } => {
            app.store
                .delete_folder(&folder_id)
                .await
                .with_context(|| format!("Failed to delete folder {}", folder_id))?;
            println!("Deleted folder {}", folder_id);
        }
    }

    Ok(())
}
