//! Portable snapshot export/import.
//!
//! A snapshot is a deep point-in-time copy of every entry plus a recognized
//! subset of settings. It exists for manual backup/restore, independent of
//! sync, and deliberately excludes the sync bookkeeping settings (tokens,
//! spreadsheet id, last-sync markers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::FuelEntry;
use crate::store::LocalStore;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Settings carried by a snapshot. Anything outside this list stays put on
/// restore.
pub const BACKED_UP_SETTINGS: [&str; 3] = [
    "theme",
    "notifications_enabled",
    "install_prompt_dismissed",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<FuelEntry>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// Produces a snapshot of the store's current contents.
pub async fn backup(store: &LocalStore) -> Snapshot {
    let entries = store.get_all_entries().await;

    let mut settings = BTreeMap::new();
    for key in BACKED_UP_SETTINGS {
        if let Some(value) = store.get_setting(key).await {
            settings.insert(key.to_string(), value);
        }
    }

    Snapshot {
        version: SNAPSHOT_VERSION,
        timestamp: Utc::now(),
        entries,
        settings,
    }
}

/// Replaces the store's entries with the snapshot's and restores the
/// recognized settings subset.
///
/// Validation happens before any mutation: a snapshot whose `entries` is
/// missing, not an array, or undecodable is rejected with `false` and the
/// store is left untouched. On acceptance the existing entries are wholly
/// discarded (clear-then-reload, never merged); callers must confirm with
/// the user before invoking.
pub async fn restore(store: &LocalStore, data: serde_json::Value) -> bool {
    let Some(entries_value) = data.get("entries") else {
        tracing::warn!("restore rejected: snapshot has no entries field");
        return false;
    };
    if !entries_value.is_array() {
        tracing::warn!("restore rejected: snapshot entries is not an array");
        return false;
    }
    let entries: Vec<FuelEntry> = match serde_json::from_value(entries_value.clone()) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("restore rejected: undecodable entries: {}", e);
            return false;
        }
    };

    let settings: BTreeMap<String, String> = data
        .get("settings")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    if !store.clear_all_entries().await {
        return false;
    }
    for entry in &entries {
        if store.add_entry(entry).await.is_none() {
            tracing::warn!("restore aborted: entry {} could not be written", entry.id);
            return false;
        }
    }

    for key in BACKED_UP_SETTINGS {
        if let Some(value) = settings.get(key) {
            store.set_setting(key, value).await;
        }
    }

    tracing::info!("restored {} entries from snapshot", entries.len());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FlatTextEngine;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    async fn test_store() -> (LocalStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let engine = FlatTextEngine::open(temp.path().join("data.json")).await;
        (LocalStore::from_flat(engine), temp)
    }

    fn entry(id: i64) -> FuelEntry {
        FuelEntry::new(id)
            .with_date("2026-08-06")
            .with_operator("Amadou")
            .with_metrics(8.0, 0.0, 40.0)
    }

    #[tokio::test]
    async fn test_backup_restore_roundtrip() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1)).await.unwrap();
        store.add_entry(&entry(2)).await.unwrap();
        store.set_setting("theme", "dark").await;

        let snapshot = backup(&store).await;
        let value = serde_json::to_value(&snapshot).unwrap();

        // Mutate after the snapshot, then restore.
        store.add_entry(&entry(3)).await.unwrap();
        store.set_setting("theme", "light").await;

        assert!(restore(&store, value).await);

        let ids: BTreeSet<i64> = store.get_all_entries().await.iter().map(|e| e.id).collect();
        assert_eq!(ids, BTreeSet::from([1, 2]));
        assert_eq!(store.get_setting("theme").await.as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn test_restore_rejects_non_array_entries_without_mutation() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1)).await.unwrap();

        let bad = serde_json::json!({ "entries": "not-an-array" });
        assert!(!restore(&store, bad).await);

        assert_eq!(store.get_all_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_rejects_missing_entries_without_mutation() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1)).await.unwrap();

        let bad = serde_json::json!({ "settings": { "theme": "dark" } });
        assert!(!restore(&store, bad).await);
        assert_eq!(store.get_all_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_rejects_undecodable_entry_rows() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(1)).await.unwrap();

        // An entry without an id cannot decode; validation runs before the
        // clear, so the store keeps its contents.
        let bad = serde_json::json!({ "entries": [ { "liters": 4.0 } ] });
        assert!(!restore(&store, bad).await);
        assert_eq!(store.get_all_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_backup_excludes_sync_bookkeeping() {
        let (store, _temp) = test_store().await;
        store.set_setting("theme", "dark").await;
        store.set_setting("sheets_access_token", "secret").await;
        store.set_setting("sheets_last_sync_time", "2026-08-06T00:00:00.000Z").await;

        let snapshot = backup(&store).await;
        assert_eq!(snapshot.settings.get("theme").map(String::as_str), Some("dark"));
        assert!(!snapshot.settings.contains_key("sheets_access_token"));
        assert!(!snapshot.settings.contains_key("sheets_last_sync_time"));
    }

    #[tokio::test]
    async fn test_restore_is_clear_then_reload_not_merge() {
        let (store, _temp) = test_store().await;
        store.add_entry(&entry(10)).await.unwrap();

        let snapshot = serde_json::json!({
            "version": SNAPSHOT_VERSION,
            "timestamp": "2026-08-06T10:00:00Z",
            "entries": [serde_json::to_value(entry(20)).unwrap()],
            "settings": {}
        });
        assert!(restore(&store, snapshot).await);

        let ids: Vec<i64> = store.get_all_entries().await.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![20]);
    }
}
