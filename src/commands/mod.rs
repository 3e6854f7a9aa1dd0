mod auth;
mod backup_cmd;
mod config_cmd;
mod entry;
mod sync_cmd;

pub use auth::{AuthCommand, AuthSubcommand};
pub use backup_cmd::{BackupCommand, BackupSubcommand};
pub use config_cmd::ConfigCommand;
pub use entry::{EntryCommand, EntrySubcommand};
pub use sync_cmd::{SyncCommand, SyncCommandError, SyncSubcommand};

use std::io::Write;

/// Interactive yes/no confirmation, defaulting to no. Destructive commands
/// call this unless `--yes` was passed.
pub(crate) fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
