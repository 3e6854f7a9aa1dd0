use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fuel entry records one refueling/usage span for a piece of equipment.
///
/// The `id` is caller-supplied at creation (time-based, in milliseconds) and
/// immutable once stored. `timestamp` is the last-modification instant and is
/// the sole conflict-resolution signal during sync. `consumption` and
/// `consumption_value` are derived by the caller; the store never recomputes
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelEntry {
    pub id: i64,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub total_hours: f64,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub liters: f64,
    #[serde(default)]
    pub consumption: Option<String>,
    #[serde(default)]
    pub consumption_value: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub photo_id: Option<String>,
}

impl FuelEntry {
    /// Creates an empty entry with the given id, stamped now.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            site: None,
            period: None,
            date: None,
            station: None,
            operator: None,
            equipment: None,
            start_time: None,
            end_time: None,
            total_hours: 0.0,
            distance: 0.0,
            liters: 0.0,
            consumption: None,
            consumption_value: None,
            timestamp: Utc::now(),
            location: None,
            photo_id: None,
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = Some(station.into());
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    pub fn with_equipment(mut self, equipment: impl Into<String>) -> Self {
        self.equipment = Some(equipment.into());
        self
    }

    pub fn with_times(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_time = Some(start.into());
        self.end_time = Some(end.into());
        self
    }

    pub fn with_metrics(mut self, total_hours: f64, distance: f64, liters: f64) -> Self {
        self.total_hours = total_hours;
        self.distance = distance;
        self.liters = liters;
        self
    }

    pub fn with_consumption(mut self, text: impl Into<String>, value: f64) -> Self {
        self.consumption = Some(text.into());
        self.consumption_value = Some(value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for FuelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Entry {} - {} ({})",
            self.id,
            self.operator.as_deref().unwrap_or("-"),
            self.equipment.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "{}", "=".repeat(30))?;
        writeln!(f, "Date:        {}", self.date.as_deref().unwrap_or("-"))?;
        writeln!(f, "Site:        {}", self.site.as_deref().unwrap_or("-"))?;
        writeln!(f, "Station:     {}", self.station.as_deref().unwrap_or("-"))?;
        writeln!(
            f,
            "Span:        {} - {} ({} hrs)",
            self.start_time.as_deref().unwrap_or("-"),
            self.end_time.as_deref().unwrap_or("-"),
            self.total_hours
        )?;
        if self.distance > 0.0 {
            writeln!(f, "Fuel:        {} L ({} km)", self.liters, self.distance)?;
        } else {
            writeln!(f, "Fuel:        {} L", self.liters)?;
        }
        writeln!(
            f,
            "Consumption: {}",
            self.consumption.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Modified:    {}", self.timestamp.to_rfc3339())?;
        Ok(())
    }
}

/// A partial update to a fuel entry. Fields left as `None` are preserved on
/// the stored record; present fields overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuelEntryPatch {
    pub site: Option<String>,
    pub period: Option<String>,
    pub date: Option<String>,
    pub station: Option<String>,
    pub operator: Option<String>,
    pub equipment: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub total_hours: Option<f64>,
    pub distance: Option<f64>,
    pub liters: Option<f64>,
    pub consumption: Option<String>,
    pub consumption_value: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub photo_id: Option<String>,
}

impl FuelEntryPatch {
    /// Shallow-merges the present fields onto `entry`. The id is never
    /// touched.
    pub fn apply_to(&self, entry: &mut FuelEntry) {
        if let Some(v) = &self.site {
            entry.site = Some(v.clone());
        }
        if let Some(v) = &self.period {
            entry.period = Some(v.clone());
        }
        if let Some(v) = &self.date {
            entry.date = Some(v.clone());
        }
        if let Some(v) = &self.station {
            entry.station = Some(v.clone());
        }
        if let Some(v) = &self.operator {
            entry.operator = Some(v.clone());
        }
        if let Some(v) = &self.equipment {
            entry.equipment = Some(v.clone());
        }
        if let Some(v) = &self.start_time {
            entry.start_time = Some(v.clone());
        }
        if let Some(v) = &self.end_time {
            entry.end_time = Some(v.clone());
        }
        if let Some(v) = self.total_hours {
            entry.total_hours = v;
        }
        if let Some(v) = self.distance {
            entry.distance = v;
        }
        if let Some(v) = self.liters {
            entry.liters = v;
        }
        if let Some(v) = &self.consumption {
            entry.consumption = Some(v.clone());
        }
        if let Some(v) = self.consumption_value {
            entry.consumption_value = Some(v);
        }
        if let Some(v) = self.timestamp {
            entry.timestamp = v;
        }
        if let Some(v) = &self.location {
            entry.location = Some(v.clone());
        }
        if let Some(v) = &self.photo_id {
            entry.photo_id = Some(v.clone());
        }
    }
}
