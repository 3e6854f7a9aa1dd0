use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod backup;
mod commands;
mod config;
mod models;
mod notify;
mod store;
mod sync;

use commands::{
    AuthCommand, BackupCommand, BackupSubcommand, ConfigCommand, EntryCommand, EntrySubcommand,
    SyncCommand,
};
use config::Config;
use notify::LogNotifier;
use store::LocalStore;
use sync::try_auto_sync;

#[derive(Parser)]
#[command(name = "fleetfuel")]
#[command(version)]
#[command(about = "A fleet fuel consumption tracker with spreadsheet sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log and manage fuel entries
    Entry(EntryCommand),

    /// Export or import a portable snapshot of all data
    Backup(BackupCommand),

    /// Sync with the configured spreadsheet
    Sync(SyncCommand),

    /// Manage the stored spreadsheet access token
    Auth(AuthCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fleetfuel=warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;
    let store = LocalStore::open(&config.data_dir.value).await;

    // Auto-sync BEFORE read commands
    if is_read_command(&cli.command) {
        try_auto_sync(&store, &config).await;
    }

    let result = execute_command(&cli.command, &store, &config).await;

    // Auto-sync AFTER write commands (only if the command succeeded)
    if result.is_ok() && is_write_command(&cli.command) {
        try_auto_sync(&store, &config).await;
    }

    result
}

async fn execute_command(
    command: &Option<Commands>,
    store: &LocalStore,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Some(Commands::Entry(cmd)) => {
            cmd.run(store, &LogNotifier, config).await?;
        }
        Some(Commands::Backup(cmd)) => {
            cmd.run(store).await?;
        }
        Some(Commands::Sync(cmd)) => {
            cmd.run(store, config).await?;
        }
        Some(Commands::Auth(cmd)) => {
            cmd.run(store).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

/// Returns true if the command is a read operation that should sync before execution.
fn is_read_command(cmd: &Option<Commands>) -> bool {
    matches!(
        cmd,
        Some(Commands::Entry(e)) if matches!(e.command,
            EntrySubcommand::List { .. }
            | EntrySubcommand::Show { .. }
            | EntrySubcommand::Range { .. })
    )
}

/// Returns true if the command is a write operation that should sync after execution.
fn is_write_command(cmd: &Option<Commands>) -> bool {
    matches!(
        cmd,
        Some(Commands::Entry(e)) if matches!(e.command,
            EntrySubcommand::Add { .. }
            | EntrySubcommand::Update { .. }
            | EntrySubcommand::Delete { .. }
            | EntrySubcommand::Clear { .. })
    ) || matches!(
        cmd,
        Some(Commands::Backup(b)) if matches!(b.command, BackupSubcommand::Import { .. })
    )
}
