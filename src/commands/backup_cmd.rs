//! Backup export/import CLI commands.

use chrono::Utc;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::backup;
use crate::store::LocalStore;

use super::confirm;

/// Export or import a portable snapshot of all data
#[derive(Debug, Args)]
pub struct BackupCommand {
    #[command(subcommand)]
    pub command: BackupSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum BackupSubcommand {
    /// Write a snapshot of all entries and settings to a JSON file
    Export {
        /// Output path (default: fleetfuel-backup-YYYYMMDD.json)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace all local data with a snapshot's contents
    Import {
        file: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

impl BackupCommand {
    pub async fn run(&self, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            BackupSubcommand::Export { output } => {
                let snapshot = backup::backup(store).await;
                let path = output.clone().unwrap_or_else(|| {
                    PathBuf::from(format!(
                        "fleetfuel-backup-{}.json",
                        Utc::now().format("%Y%m%d")
                    ))
                });

                let contents = serde_json::to_string_pretty(&snapshot)?;
                std::fs::write(&path, contents)?;

                println!(
                    "✓ exported {} entries to {}",
                    snapshot.entries.len(),
                    path.display()
                );
                Ok(())
            }
            BackupSubcommand::Import { file, yes } => {
                let contents = std::fs::read_to_string(file)?;
                let data: serde_json::Value = serde_json::from_str(&contents)?;

                let existing = store.get_all_entries().await.len();
                if !yes
                    && !confirm(&format!(
                        "Replace all {} local entries with the snapshot's contents?",
                        existing
                    ))
                {
                    println!("Cancelled.");
                    return Ok(());
                }

                if !backup::restore(store, data).await {
                    return Err("Invalid backup file: nothing restored".into());
                }

                println!(
                    "✓ restored {} entries from {}",
                    store.get_all_entries().await.len(),
                    file.display()
                );
                Ok(())
            }
        }
    }
}
