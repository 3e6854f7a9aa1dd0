//! Entry <-> spreadsheet row codec.
//!
//! Column order is fixed and part of the wire contract; every cell travels
//! as plain text and numeric fields round-trip through string parsing, with
//! unparsable numerics reading as zero.

use chrono::{DateTime, Utc};

use crate::models::{format_instant, parse_instant, FuelEntry, FuelEntryPatch};

/// Header row, columns A through O.
pub const HEADER_ROW: [&str; 15] = [
    "ID",
    "Site",
    "Period",
    "Date",
    "Station",
    "Operator",
    "Equipment",
    "Start Time",
    "End Time",
    "Distance",
    "Total Hours",
    "Liters",
    "Consumption",
    "Timestamp",
    "LastSynced",
];

/// A decoded remote data row.
#[derive(Debug, Clone)]
pub struct RemoteRow {
    pub entry: FuelEntry,
    /// When the pushing device stamped this row. An absent or unparsable
    /// value reads as the epoch, so it can never win a conflict.
    pub last_synced: DateTime<Utc>,
}

impl RemoteRow {
    /// The patch a remote-newer row applies to its local counterpart. The
    /// merge itself counts as a local modification, so `timestamp` is set to
    /// `merged_at`, not to the remote value. Locally-derived fields the wire
    /// does not carry (consumption value, location, photo) are left alone.
    pub fn as_patch(&self, merged_at: DateTime<Utc>) -> FuelEntryPatch {
        FuelEntryPatch {
            site: self.entry.site.clone(),
            period: self.entry.period.clone(),
            date: self.entry.date.clone(),
            station: self.entry.station.clone(),
            operator: self.entry.operator.clone(),
            equipment: self.entry.equipment.clone(),
            start_time: self.entry.start_time.clone(),
            end_time: self.entry.end_time.clone(),
            total_hours: Some(self.entry.total_hours),
            distance: Some(self.entry.distance),
            liters: Some(self.entry.liters),
            consumption: self.entry.consumption.clone(),
            timestamp: Some(merged_at),
            ..Default::default()
        }
    }
}

fn cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn number_cell(value: f64) -> String {
    value.to_string()
}

/// Maps an entry to the fixed column order, stamping the `LastSynced`
/// column.
pub fn entry_to_row(entry: &FuelEntry, last_synced: DateTime<Utc>) -> Vec<String> {
    vec![
        entry.id.to_string(),
        cell(&entry.site),
        cell(&entry.period),
        cell(&entry.date),
        cell(&entry.station),
        cell(&entry.operator),
        cell(&entry.equipment),
        cell(&entry.start_time),
        cell(&entry.end_time),
        number_cell(entry.distance),
        number_cell(entry.total_hours),
        number_cell(entry.liters),
        cell(&entry.consumption),
        format_instant(entry.timestamp),
        format_instant(last_synced),
    ]
}

/// Decodes one data row. Rows without a parsable id are unusable and yield
/// `None`; everything else degrades field by field (missing cells read as
/// empty, bad numerics as zero, a bad timestamp as "now").
pub fn parse_row(cells: &[String]) -> Option<RemoteRow> {
    let id: i64 = cells.first()?.trim().parse().ok()?;

    let text = |index: usize| -> Option<String> {
        cells
            .get(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    let number = |index: usize| -> f64 {
        cells
            .get(index)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0)
    };

    let timestamp = cells
        .get(13)
        .and_then(|s| parse_instant(s))
        .unwrap_or_else(Utc::now);
    let last_synced = cells
        .get(14)
        .and_then(|s| parse_instant(s))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Some(RemoteRow {
        entry: FuelEntry {
            id,
            site: text(1),
            period: text(2),
            date: text(3),
            station: text(4),
            operator: text(5),
            equipment: text(6),
            start_time: text(7),
            end_time: text(8),
            distance: number(9),
            total_hours: number(10),
            liters: number(11),
            consumption: text(12),
            consumption_value: None,
            timestamp,
            location: None,
            photo_id: None,
        },
        last_synced,
    })
}
