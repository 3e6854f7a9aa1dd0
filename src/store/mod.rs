//! Local persistence for fuel entries and settings.
//!
//! [`LocalStore`] is the single entry point: it owns one of two storage
//! engines selected at open time. [`StructuredEngine`] keeps an `entries`
//! table keyed by id and a `settings` table keyed by key in SQLite; when the
//! structured engine cannot be opened, the store falls back to
//! [`FlatTextEngine`], a flat key/value file holding one serialized entry
//! array plus one raw string per setting. The fallback is transparent:
//! every public method behaves identically regardless of the active engine,
//! and callers never branch on which one is live.
//!
//! Public methods never fail: storage errors are logged and resolved to a
//! safe default (`None`, `false`, empty vec). The engines themselves return
//! typed [`StoreError`]s, so richer propagation stays available at the seam.

mod flat;
mod structured;

pub use flat::FlatTextEngine;
pub use structured::StructuredEngine;

use chrono::{NaiveDate, Utc};
use std::path::Path;

use crate::models::{FuelEntry, FuelEntryPatch};

/// Errors surfaced by the storage engines.
#[derive(Debug)]
pub enum StoreError {
    /// The engine could not be opened at all.
    Unavailable(String),
    /// The underlying engine rejected an operation.
    Engine(String),
    /// A stored value could not be decoded.
    Serde(String),
    /// An insert collided with an existing entry id.
    DuplicateId(i64),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "storage unavailable: {}", e),
            StoreError::Engine(e) => write!(f, "storage engine error: {}", e),
            StoreError::Serde(e) => write!(f, "stored data could not be decoded: {}", e),
            StoreError::DuplicateId(id) => write!(f, "entry id {} already exists", id),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Engine(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e.to_string())
    }
}

#[derive(Clone)]
enum Engine {
    Structured(StructuredEngine),
    FlatText(FlatTextEngine),
}

impl Engine {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Engine::Structured(e) => e.get_setting(key).await,
            Engine::FlatText(e) => e.get_setting(key).await,
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            Engine::Structured(e) => e.set_setting(key, value).await,
            Engine::FlatText(e) => e.set_setting(key, value).await,
        }
    }

    async fn add_entry(&self, entry: &FuelEntry) -> Result<i64, StoreError> {
        match self {
            Engine::Structured(e) => e.add_entry(entry).await,
            Engine::FlatText(e) => e.add_entry(entry).await,
        }
    }

    async fn get_all_entries(&self) -> Result<Vec<FuelEntry>, StoreError> {
        match self {
            Engine::Structured(e) => e.get_all_entries().await,
            Engine::FlatText(e) => e.get_all_entries().await,
        }
    }

    async fn get_entry_by_id(&self, id: i64) -> Result<Option<FuelEntry>, StoreError> {
        match self {
            Engine::Structured(e) => e.get_entry_by_id(id).await,
            Engine::FlatText(e) => e.get_entry_by_id(id).await,
        }
    }

    async fn put_entry(&self, entry: &FuelEntry) -> Result<(), StoreError> {
        match self {
            Engine::Structured(e) => e.put_entry(entry).await,
            Engine::FlatText(e) => e.put_entry(entry).await,
        }
    }

    async fn delete_entry(&self, id: i64) -> Result<bool, StoreError> {
        match self {
            Engine::Structured(e) => e.delete_entry(id).await,
            Engine::FlatText(e) => e.delete_entry(id).await,
        }
    }

    async fn clear_all_entries(&self) -> Result<(), StoreError> {
        match self {
            Engine::Structured(e) => e.clear_all_entries().await,
            Engine::FlatText(e) => e.clear_all_entries().await,
        }
    }
}

/// The durable on-device store for fuel entries and settings.
///
/// Cheap to clone; clones share the same underlying engine.
#[derive(Clone)]
pub struct LocalStore {
    engine: Engine,
}

const DB_FILENAME: &str = "fleetfuel.db";
const FLAT_FILENAME: &str = "fleetfuel-data.json";

impl LocalStore {
    /// Opens the store in `data_dir`, preferring the structured engine and
    /// falling back to the flat-text engine when it cannot be opened. The
    /// fallback is silent from the caller's perspective.
    pub async fn open(data_dir: &Path) -> Self {
        match StructuredEngine::open(&data_dir.join(DB_FILENAME)).await {
            Ok(engine) => Self {
                engine: Engine::Structured(engine),
            },
            Err(e) => {
                tracing::warn!(
                    "structured storage unavailable ({}), using flat-file fallback",
                    e
                );
                Self::from_flat(FlatTextEngine::open(data_dir.join(FLAT_FILENAME)).await)
            }
        }
    }

    /// Wraps an already-opened structured engine.
    pub fn from_structured(engine: StructuredEngine) -> Self {
        Self {
            engine: Engine::Structured(engine),
        }
    }

    /// Wraps an already-opened flat-text engine.
    pub fn from_flat(engine: FlatTextEngine) -> Self {
        Self {
            engine: Engine::FlatText(engine),
        }
    }

    /// Reads a setting. Missing keys (and storage failures) yield `None`.
    pub async fn get_setting(&self, key: &str) -> Option<String> {
        match self.engine.get_setting(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("get_setting {}: {}", key, e);
                None
            }
        }
    }

    /// Writes a setting, overwriting any previous value.
    pub async fn set_setting(&self, key: &str, value: &str) {
        if let Err(e) = self.engine.set_setting(key, value).await {
            tracing::error!("set_setting {}: {}", key, e);
        }
    }

    /// Inserts a new entry, returning its id, or `None` when the engine
    /// rejects it (duplicate id or storage failure).
    pub async fn add_entry(&self, entry: &FuelEntry) -> Option<i64> {
        match self.engine.add_entry(entry).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!("add_entry {}: {}", entry.id, e);
                None
            }
        }
    }

    /// Returns all entries, newest first (by `timestamp`, descending).
    pub async fn get_all_entries(&self) -> Vec<FuelEntry> {
        match self.engine.get_all_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("get_all_entries: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn get_entry_by_id(&self, id: i64) -> Option<FuelEntry> {
        match self.engine.get_entry_by_id(id).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!("get_entry_by_id {}: {}", id, e);
                None
            }
        }
    }

    /// Shallow-merges `patch` onto the stored entry and returns the merged
    /// record, or `None` when the id is unknown.
    pub async fn update_entry(&self, id: i64, patch: &FuelEntryPatch) -> Option<FuelEntry> {
        let mut entry = self.get_entry_by_id(id).await?;
        patch.apply_to(&mut entry);
        match self.engine.put_entry(&entry).await {
            Ok(()) => Some(entry),
            Err(e) => {
                tracing::error!("update_entry {}: {}", id, e);
                None
            }
        }
    }

    pub async fn delete_entry(&self, id: i64) -> bool {
        match self.engine.delete_entry(id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!("delete_entry {}: {}", id, e);
                false
            }
        }
    }

    pub async fn clear_all_entries(&self) -> bool {
        match self.engine.clear_all_entries().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("clear_all_entries: {}", e);
                false
            }
        }
    }

    /// Entries whose `date` field parses as a calendar date within the
    /// inclusive range. Entries with an absent or unparsable date are
    /// excluded.
    pub async fn get_entries_in_date_range(&self, from: NaiveDate, to: NaiveDate) -> Vec<FuelEntry> {
        self.get_all_entries()
            .await
            .into_iter()
            .filter(|entry| {
                entry
                    .date
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
                    .map(|d| d >= from && d <= to)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Generates a fresh entry id: current Unix time in milliseconds, bumped
    /// past any id already present so rapid successive calls cannot collide.
    pub async fn next_entry_id(&self) -> i64 {
        let mut id = Utc::now().timestamp_millis();
        while self.get_entry_by_id(id).await.is_some() {
            id += 1;
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    async fn structured_store() -> (LocalStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let engine = StructuredEngine::open(&temp.path().join("test.db"))
            .await
            .unwrap();
        (LocalStore::from_structured(engine), temp)
    }

    async fn flat_store() -> (LocalStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let engine = FlatTextEngine::open(temp.path().join("data.json")).await;
        (LocalStore::from_flat(engine), temp)
    }

    // Fixed timestamp with whole-second precision: the structured engine
    // stores instants at millisecond resolution, and equality checks must
    // not depend on sub-millisecond clock noise.
    fn entry(id: i64) -> FuelEntry {
        FuelEntry::new(id)
            .with_date("2026-08-06")
            .with_operator("Amadou")
            .with_equipment("Generator")
            .with_metrics(8.0, 0.0, 40.0)
            .with_timestamp(Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap())
    }

    async fn check_add_roundtrip(store: &LocalStore) {
        let original = entry(1001).with_site("North Yard");
        let id = store.add_entry(&original).await.unwrap();
        assert_eq!(id, 1001);

        let loaded = store.get_entry_by_id(1001).await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_add_roundtrip_structured() {
        let (store, _temp) = structured_store().await;
        check_add_roundtrip(&store).await;
    }

    #[tokio::test]
    async fn test_add_roundtrip_flat() {
        let (store, _temp) = flat_store().await;
        check_add_roundtrip(&store).await;
    }

    async fn check_update_merges(store: &LocalStore) {
        store.add_entry(&entry(1)).await.unwrap();

        let patch = FuelEntryPatch {
            liters: Some(42.0),
            ..Default::default()
        };
        let merged = store.update_entry(1, &patch).await.unwrap();

        assert_eq!(merged.liters, 42.0);
        assert_eq!(merged.operator.as_deref(), Some("Amadou"));
        assert_eq!(merged.total_hours, 8.0);

        let reloaded = store.get_entry_by_id(1).await.unwrap();
        assert_eq!(reloaded, merged);
    }

    #[tokio::test]
    async fn test_update_merges_structured() {
        let (store, _temp) = structured_store().await;
        check_update_merges(&store).await;
    }

    #[tokio::test]
    async fn test_update_merges_flat() {
        let (store, _temp) = flat_store().await;
        check_update_merges(&store).await;
    }

    #[tokio::test]
    async fn test_update_unknown_id_returns_none() {
        let (store, _temp) = structured_store().await;
        let patch = FuelEntryPatch::default();
        assert!(store.update_entry(999, &patch).await.is_none());
    }

    async fn check_delete(store: &LocalStore) {
        store.add_entry(&entry(1)).await.unwrap();
        assert!(store.delete_entry(1).await);
        assert!(store.get_entry_by_id(1).await.is_none());
        assert!(store.get_all_entries().await.is_empty());
        assert!(!store.delete_entry(1).await);
    }

    #[tokio::test]
    async fn test_delete_structured() {
        let (store, _temp) = structured_store().await;
        check_delete(&store).await;
    }

    #[tokio::test]
    async fn test_delete_flat() {
        let (store, _temp) = flat_store().await;
        check_delete(&store).await;
    }

    async fn check_add_then_clear(store: &LocalStore) {
        store.add_entry(&entry(1001)).await.unwrap();
        store.add_entry(&entry(1002)).await.unwrap();
        assert_eq!(store.get_all_entries().await.len(), 2);

        assert!(store.clear_all_entries().await);
        assert_eq!(store.get_all_entries().await.len(), 0);
    }

    #[tokio::test]
    async fn test_add_then_clear_structured() {
        let (store, _temp) = structured_store().await;
        check_add_then_clear(&store).await;
    }

    #[tokio::test]
    async fn test_add_then_clear_flat() {
        let (store, _temp) = flat_store().await;
        check_add_then_clear(&store).await;
    }

    async fn check_settings(store: &LocalStore) {
        assert_eq!(store.get_setting("theme").await, None);

        store.set_setting("theme", "dark").await;
        assert_eq!(store.get_setting("theme").await.as_deref(), Some("dark"));

        store.set_setting("theme", "light").await;
        assert_eq!(store.get_setting("theme").await.as_deref(), Some("light"));
    }

    #[tokio::test]
    async fn test_settings_structured() {
        let (store, _temp) = structured_store().await;
        check_settings(&store).await;
    }

    #[tokio::test]
    async fn test_settings_flat() {
        let (store, _temp) = flat_store().await;
        check_settings(&store).await;
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (store, _temp) = structured_store().await;
        store.add_entry(&entry(1)).await.unwrap();
        assert!(store.add_entry(&entry(1)).await.is_none());

        let (store, _temp) = flat_store().await;
        store.add_entry(&entry(1)).await.unwrap();
        assert!(store.add_entry(&entry(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_entries_ordered_newest_first() {
        let base = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        for (store, _temp) in [structured_store().await, flat_store().await] {
            store
                .add_entry(&entry(1).with_timestamp(base))
                .await
                .unwrap();
            store
                .add_entry(&entry(3).with_timestamp(base + Duration::hours(2)))
                .await
                .unwrap();
            store
                .add_entry(&entry(2).with_timestamp(base + Duration::hours(1)))
                .await
                .unwrap();

            let ids: Vec<i64> = store.get_all_entries().await.iter().map(|e| e.id).collect();
            assert_eq!(ids, vec![3, 2, 1]);
        }
    }

    #[tokio::test]
    async fn test_date_range_filters_and_excludes_unparsable() {
        let (store, _temp) = structured_store().await;
        store
            .add_entry(&entry(1).with_date("2026-08-01"))
            .await
            .unwrap();
        store
            .add_entry(&entry(2).with_date("2026-08-15"))
            .await
            .unwrap();
        store
            .add_entry(&entry(3).with_date("not a date"))
            .await
            .unwrap();
        store.add_entry(&FuelEntry::new(4)).await.unwrap();

        let from = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let in_range = store.get_entries_in_date_range(from, to).await;

        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].id, 1);
    }

    #[tokio::test]
    async fn test_next_entry_id_probes_past_collisions() {
        let (store, _temp) = flat_store().await;
        let id = store.next_entry_id().await;
        store.add_entry(&FuelEntry::new(id)).await.unwrap();

        let next = store.next_entry_id().await;
        assert_ne!(next, id);
        assert!(store.get_entry_by_id(next).await.is_none());
    }

    #[tokio::test]
    async fn test_open_falls_back_when_structured_unavailable() {
        // A directory squatting on the database path forces the structured
        // engine open to fail; the store must degrade to the flat engine
        // without surfacing an error.
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("fleetfuel.db")).unwrap();

        let store = LocalStore::open(temp.path()).await;
        store.set_setting("theme", "dark").await;
        assert_eq!(store.get_setting("theme").await.as_deref(), Some("dark"));

        store.add_entry(&entry(1)).await.unwrap();
        assert_eq!(store.get_all_entries().await.len(), 1);
    }
}
