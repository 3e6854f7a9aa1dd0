//! Flat-file fallback storage engine.
//!
//! Mirrors a plain key/value text store: the whole entry list lives as one
//! JSON-serialized array under a fixed key, and each setting is a raw string
//! under its own key. The file is rewritten on every mutation; a mutex
//! serializes read-modify-write cycles.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::StoreError;
use crate::models::FuelEntry;

const ENTRIES_KEY: &str = "fuel_history";

#[derive(Clone)]
pub struct FlatTextEngine {
    path: PathBuf,
    slots: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FlatTextEngine {
    /// Opens the flat store at `path`. A missing or unreadable file starts
    /// the store empty; read problems are logged, not surfaced, since this
    /// engine is the degraded path.
    pub async fn open(path: PathBuf) -> Self {
        let slots = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("flat store {} unreadable ({}), starting empty", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path,
            slots: Arc::new(Mutex::new(slots)),
        }
    }

    fn persist(&self, slots: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(slots)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    fn decode_entries(slots: &BTreeMap<String, String>) -> Result<Vec<FuelEntry>, StoreError> {
        match slots.get(ENTRIES_KEY) {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn encode_entries(
        slots: &mut BTreeMap<String, String>,
        entries: &[FuelEntry],
    ) -> Result<(), StoreError> {
        slots.insert(ENTRIES_KEY.to_string(), serde_json::to_string(entries)?);
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let slots = self.slots.lock().await;
        Ok(slots.get(key).cloned())
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().await;
        slots.insert(key.to_string(), value.to_string());
        self.persist(&slots)
    }

    pub async fn add_entry(&self, entry: &FuelEntry) -> Result<i64, StoreError> {
        let mut slots = self.slots.lock().await;
        let mut entries = Self::decode_entries(&slots)?;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(StoreError::DuplicateId(entry.id));
        }
        entries.insert(0, entry.clone());
        Self::encode_entries(&mut slots, &entries)?;
        self.persist(&slots)?;
        Ok(entry.id)
    }

    /// All entries, newest first by `timestamp`.
    pub async fn get_all_entries(&self) -> Result<Vec<FuelEntry>, StoreError> {
        let slots = self.slots.lock().await;
        let mut entries = Self::decode_entries(&slots)?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    pub async fn get_entry_by_id(&self, id: i64) -> Result<Option<FuelEntry>, StoreError> {
        let slots = self.slots.lock().await;
        let entries = Self::decode_entries(&slots)?;
        Ok(entries.into_iter().find(|e| e.id == id))
    }

    pub async fn put_entry(&self, entry: &FuelEntry) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().await;
        let mut entries = Self::decode_entries(&slots)?;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => *slot = entry.clone(),
            None => entries.insert(0, entry.clone()),
        }
        Self::encode_entries(&mut slots, &entries)?;
        self.persist(&slots)
    }

    pub async fn delete_entry(&self, id: i64) -> Result<bool, StoreError> {
        let mut slots = self.slots.lock().await;
        let mut entries = Self::decode_entries(&slots)?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let deleted = entries.len() < before;
        Self::encode_entries(&mut slots, &entries)?;
        self.persist(&slots)?;
        Ok(deleted)
    }

    pub async fn clear_all_entries(&self) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().await;
        Self::encode_entries(&mut slots, &[])?;
        self.persist(&slots)
    }
}
