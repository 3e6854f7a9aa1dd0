//! Sync CLI commands.

use clap::{Args, Subcommand, ValueEnum};
use std::time::Duration;
use tokio::sync::watch;

use crate::config::Config;
use crate::store::LocalStore;
use crate::sync::auto_sync::{auto_sync_enabled, resolve_spreadsheet_id};
use crate::sync::{
    SheetsClient, StoredTokenProvider, SyncCoordinator, SyncError, TokenProvider,
    SETTING_AUTO_SYNC, SETTING_SPREADSHEET_ID, SETTING_SYNC_INTERVAL_MINUTES,
};

/// Sync with the configured spreadsheet
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    pub command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum SyncSubcommand {
    /// Pull remote changes into the local store
    Pull,
    /// Push all local entries to the remote
    Push,
    /// Show sync configuration and state
    Status,
    /// Create the remote spreadsheet and write its header row
    Setup {
        #[arg(long, default_value = "Fleet Fuel Data")]
        title: String,
    },
    /// Sync continuously on an interval until interrupted
    Watch {
        /// Interval in minutes (default: stored setting, then config)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Enable or disable opportunistic auto-sync around commands
    Auto { state: Toggle },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl SyncCommand {
    pub async fn run(&self, store: &LocalStore, config: &Config) -> Result<(), SyncCommandError> {
        match &self.command {
            None => self.bidirectional(store, config).await,
            Some(SyncSubcommand::Pull) => self.pull(store, config).await,
            Some(SyncSubcommand::Push) => self.push(store, config).await,
            Some(SyncSubcommand::Status) => self.status(store, config).await,
            Some(SyncSubcommand::Setup { title }) => self.setup(store, title).await,
            Some(SyncSubcommand::Watch { interval }) => {
                self.watch(store, config, *interval).await
            }
            Some(SyncSubcommand::Auto { state }) => {
                let enabled = matches!(state, Toggle::On);
                store
                    .set_setting(SETTING_AUTO_SYNC, if enabled { "true" } else { "false" })
                    .await;
                println!("✓ auto-sync {}", if enabled { "enabled" } else { "disabled" });
                Ok(())
            }
        }
    }

    async fn coordinator(
        &self,
        store: &LocalStore,
        config: &Config,
    ) -> Result<SyncCoordinator<SheetsClient<StoredTokenProvider>>, SyncCommandError> {
        let spreadsheet_id = resolve_spreadsheet_id(store, config).await;
        let tokens = StoredTokenProvider::new(store.clone());
        let mirror = SheetsClient::new(spreadsheet_id, tokens)?;
        Ok(SyncCoordinator::new(store.clone(), mirror))
    }

    async fn bidirectional(
        &self,
        store: &LocalStore,
        config: &Config,
    ) -> Result<(), SyncCommandError> {
        let coordinator = self.coordinator(store, config).await?;

        println!("Syncing with spreadsheet...");
        let report = coordinator.bidirectional_sync().await?;

        if report.skipped {
            println!("✓ nothing changed since the last sync");
        } else {
            println!(
                "✓ pulled {} new, {} updated",
                report.pulled.new_entries, report.pulled.updated_entries
            );
            println!("✓ pushed {} entries", report.pushed.synced);
        }
        Ok(())
    }

    async fn pull(&self, store: &LocalStore, config: &Config) -> Result<(), SyncCommandError> {
        let coordinator = self.coordinator(store, config).await?;
        let report = coordinator.sync_from_remote().await?;
        println!(
            "✓ pulled {} new, {} updated",
            report.new_entries, report.updated_entries
        );
        Ok(())
    }

    async fn push(&self, store: &LocalStore, config: &Config) -> Result<(), SyncCommandError> {
        let coordinator = self.coordinator(store, config).await?;
        let report = coordinator.sync_to_remote().await?;
        println!("✓ pushed {} entries", report.synced);
        Ok(())
    }

    async fn status(&self, store: &LocalStore, config: &Config) -> Result<(), SyncCommandError> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        match resolve_spreadsheet_id(store, config).await {
            Some(id) => println!("Spreadsheet: {}", id),
            None => {
                println!("Spreadsheet: not configured");
                println!();
                println!("Run 'fleetfuel sync setup' to create one, or set");
                println!("sync.spreadsheet_id in the config file.");
                return Ok(());
            }
        }

        let tokens = StoredTokenProvider::new(store.clone());
        match tokens.access_token().await {
            Ok(_) => println!("Token:       ✓ present"),
            Err(_) => {
                println!("Token:       ✗ missing or expired (run 'fleetfuel auth set-token')")
            }
        }

        let coordinator = self.coordinator(store, config).await?;
        match coordinator.last_sync_time().await {
            Some(at) => println!("Last sync:   {}", at.to_rfc3339()),
            None => println!("Last sync:   never"),
        }
        println!(
            "Interval:    {} minutes",
            effective_interval(store, config).await
        );
        println!(
            "Auto-sync:   {}",
            if auto_sync_enabled(store, config).await {
                "enabled"
            } else {
                "disabled"
            }
        );
        Ok(())
    }

    async fn setup(&self, store: &LocalStore, title: &str) -> Result<(), SyncCommandError> {
        let tokens = StoredTokenProvider::new(store.clone());
        let client = SheetsClient::new(None, tokens)?;

        println!("Creating spreadsheet '{}'...", title);
        let spreadsheet_id = client.create_spreadsheet(title).await?;
        store
            .set_setting(SETTING_SPREADSHEET_ID, &spreadsheet_id)
            .await;

        let tokens = StoredTokenProvider::new(store.clone());
        let client = SheetsClient::new(Some(spreadsheet_id.clone()), tokens)?;
        client.write_header_row().await?;

        println!("✓ created spreadsheet {}", spreadsheet_id);
        Ok(())
    }

    async fn watch(
        &self,
        store: &LocalStore,
        config: &Config,
        interval: Option<u64>,
    ) -> Result<(), SyncCommandError> {
        let minutes = match interval {
            Some(minutes) => {
                store
                    .set_setting(SETTING_SYNC_INTERVAL_MINUTES, &minutes.to_string())
                    .await;
                minutes
            }
            None => effective_interval(store, config).await,
        };

        let coordinator = self.coordinator(store, config).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown_tx.send(true);
        });

        println!("Syncing every {} minutes. Ctrl-C to stop.", minutes);
        coordinator
            .run_auto_sync(Duration::from_secs(minutes * 60), shutdown_rx)
            .await;
        println!("Stopped.");
        Ok(())
    }
}

/// Interval resolution: stored setting first, config file second.
async fn effective_interval(store: &LocalStore, config: &Config) -> u64 {
    store
        .get_setting(SETTING_SYNC_INTERVAL_MINUTES)
        .await
        .and_then(|v| v.parse().ok())
        .unwrap_or(config.sync.interval_minutes)
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    Sync(SyncError),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::Sync(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::Sync(e) => Some(e),
        }
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::Sync(e)
    }
}
