//! Opportunistic sync around CLI commands.
//!
//! When auto-sync is enabled, read commands sync first and write commands
//! sync afterwards. Failures degrade to "nothing synced this round": the
//! CLI must keep working offline, so everything here is logged and
//! swallowed.

use crate::config::Config;
use crate::store::LocalStore;
use crate::sync::coordinator::SyncCoordinator;
use crate::sync::sheets::{SheetsClient, StoredTokenProvider};
use crate::sync::{SyncError, SETTING_AUTO_SYNC, SETTING_SPREADSHEET_ID};

/// True when the stored auto-sync flag (or, absent that, the config file)
/// enables opportunistic sync.
pub async fn auto_sync_enabled(store: &LocalStore, config: &Config) -> bool {
    match store.get_setting(SETTING_AUTO_SYNC).await {
        Some(value) => value == "true",
        None => config.sync.auto_sync,
    }
}

/// The spreadsheet id to sync against: the stored setting wins, the config
/// file is the fallback.
pub async fn resolve_spreadsheet_id(store: &LocalStore, config: &Config) -> Option<String> {
    store
        .get_setting(SETTING_SPREADSHEET_ID)
        .await
        .filter(|id| !id.is_empty())
        .or_else(|| config.sync.spreadsheet_id.clone())
}

/// Runs one bidirectional cycle if auto-sync is enabled and a spreadsheet
/// is configured. Never fails the surrounding command.
pub async fn try_auto_sync(store: &LocalStore, config: &Config) {
    if !auto_sync_enabled(store, config).await {
        return;
    }
    let Some(spreadsheet_id) = resolve_spreadsheet_id(store, config).await else {
        return;
    };

    let tokens = StoredTokenProvider::new(store.clone());
    let mirror = match SheetsClient::new(Some(spreadsheet_id), tokens) {
        Ok(mirror) => mirror,
        Err(e) => {
            tracing::warn!("auto-sync unavailable: {}", e);
            return;
        }
    };

    let coordinator = SyncCoordinator::new(store.clone(), mirror);
    match coordinator.bidirectional_sync().await {
        Ok(report) if report.skipped => {}
        Ok(report) => {
            tracing::info!(
                "auto-sync: pulled {} new / {} updated, pushed {}",
                report.pulled.new_entries,
                report.pulled.updated_entries,
                report.pushed.synced
            );
        }
        Err(SyncError::AuthExpired) => {
            tracing::warn!("auto-sync skipped: authentication expired");
        }
        Err(e) => {
            tracing::warn!("auto-sync failed: {}", e);
        }
    }
}
