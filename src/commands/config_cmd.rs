//! Configuration CLI commands.

use clap::{Args, Subcommand};

use crate::config::Config;

/// Manage configuration
#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration and where each value came from
    Show,
    /// Print the config file path
    Path,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show => {
                println!("Configuration");
                println!("=============");
                println!();
                println!(
                    "data_dir: {} ({})",
                    config.data_dir.value.display(),
                    config.data_dir.source
                );
                println!(
                    "operator: {} ({})",
                    config.operator.value, config.operator.source
                );
                println!();
                println!("sync:");
                println!(
                    "  spreadsheet_id: {}",
                    config.sync.spreadsheet_id.as_deref().unwrap_or("(unset)")
                );
                println!("  interval_minutes: {}", config.sync.interval_minutes);
                println!("  auto_sync: {}", config.sync.auto_sync);
                if let Some(path) = &config.config_file {
                    println!();
                    println!("config file: {}", path.display());
                }
                Ok(())
            }
            ConfigSubcommand::Path => {
                let path = config
                    .config_file
                    .clone()
                    .unwrap_or_else(Config::default_config_path);
                println!("{}", path.display());
                Ok(())
            }
        }
    }
}
