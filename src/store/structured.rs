//! SQLite-backed storage engine.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use super::StoreError;
use crate::models::{format_instant, parse_instant, FuelEntry};

/// Structured engine: `entries` keyed by `id`, `settings` keyed by `key`,
/// with secondary indexes on entry `date` and `timestamp`.
#[derive(Clone)]
pub struct StructuredEngine {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i64,
    site: Option<String>,
    period: Option<String>,
    date: Option<String>,
    station: Option<String>,
    operator: Option<String>,
    equipment: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    total_hours: f64,
    distance: f64,
    liters: f64,
    consumption: Option<String>,
    consumption_value: Option<f64>,
    timestamp: String,
    location: Option<String>,
    photo_id: Option<String>,
}

impl EntryRow {
    fn into_entry(self) -> Result<FuelEntry, StoreError> {
        let timestamp = parse_instant(&self.timestamp).ok_or_else(|| {
            StoreError::Serde(format!("bad timestamp in entry {}: {}", self.id, self.timestamp))
        })?;
        Ok(FuelEntry {
            id: self.id,
            site: self.site,
            period: self.period,
            date: self.date,
            station: self.station,
            operator: self.operator,
            equipment: self.equipment,
            start_time: self.start_time,
            end_time: self.end_time,
            total_hours: self.total_hours,
            distance: self.distance,
            liters: self.liters,
            consumption: self.consumption,
            consumption_value: self.consumption_value,
            timestamp,
            location: self.location,
            photo_id: self.photo_id,
        })
    }
}

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS entries (
        id INTEGER PRIMARY KEY,
        site TEXT,
        period TEXT,
        date TEXT,
        station TEXT,
        operator TEXT,
        equipment TEXT,
        start_time TEXT,
        end_time TEXT,
        total_hours REAL NOT NULL DEFAULT 0,
        distance REAL NOT NULL DEFAULT 0,
        liters REAL NOT NULL DEFAULT 0,
        consumption TEXT,
        consumption_value REAL,
        timestamp TEXT NOT NULL,
        location TEXT,
        photo_id TEXT
    )",
    "CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_entries_date ON entries (date)",
    "CREATE INDEX IF NOT EXISTS idx_entries_timestamp ON entries (timestamp)",
];

impl StructuredEngine {
    /// Opens (creating if missing) the database at `path` and ensures the
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        Ok(Self { pool })
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(engine_error)?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(engine_error)?;
        Ok(())
    }

    pub async fn add_entry(&self, entry: &FuelEntry) -> Result<i64, StoreError> {
        self.insert(entry, false).await?;
        Ok(entry.id)
    }

    /// Inserts or replaces, used for updates after a merge.
    pub async fn put_entry(&self, entry: &FuelEntry) -> Result<(), StoreError> {
        self.insert(entry, true).await
    }

    async fn insert(&self, entry: &FuelEntry, replace: bool) -> Result<(), StoreError> {
        let sql = if replace {
            "INSERT OR REPLACE INTO entries (id, site, period, date, station, operator, equipment,
                start_time, end_time, total_hours, distance, liters, consumption,
                consumption_value, timestamp, location, photo_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        } else {
            "INSERT INTO entries (id, site, period, date, station, operator, equipment,
                start_time, end_time, total_hours, distance, liters, consumption,
                consumption_value, timestamp, location, photo_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        };

        sqlx::query(sql)
            .bind(entry.id)
            .bind(&entry.site)
            .bind(&entry.period)
            .bind(&entry.date)
            .bind(&entry.station)
            .bind(&entry.operator)
            .bind(&entry.equipment)
            .bind(&entry.start_time)
            .bind(&entry.end_time)
            .bind(entry.total_hours)
            .bind(entry.distance)
            .bind(entry.liters)
            .bind(&entry.consumption)
            .bind(entry.consumption_value)
            .bind(format_instant(entry.timestamp))
            .bind(&entry.location)
            .bind(&entry.photo_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db)
                    if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
                {
                    StoreError::DuplicateId(entry.id)
                }
                other => engine_error(other),
            })?;
        Ok(())
    }

    /// All entries, newest first. Timestamps are stored in a fixed-width
    /// RFC 3339 form, so the textual ORDER BY is chronological.
    pub async fn get_all_entries(&self) -> Result<Vec<FuelEntry>, StoreError> {
        let rows: Vec<EntryRow> =
            sqlx::query_as("SELECT * FROM entries ORDER BY timestamp DESC, id DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(engine_error)?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    pub async fn get_entry_by_id(&self, id: i64) -> Result<Option<FuelEntry>, StoreError> {
        let row: Option<EntryRow> = sqlx::query_as("SELECT * FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(engine_error)?;

        row.map(EntryRow::into_entry).transpose()
    }

    pub async fn delete_entry(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(engine_error)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_all_entries(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM entries")
            .execute(&self.pool)
            .await
            .map_err(engine_error)?;
        Ok(())
    }
}

fn engine_error(e: sqlx::Error) -> StoreError {
    StoreError::Engine(e.to_string())
}
