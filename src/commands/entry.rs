//! Fuel entry CLI commands.

use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::models::consumption;
use crate::models::{FuelEntry, FuelEntryPatch};
use crate::notify::{EntryEvent, Notifier};
use crate::store::LocalStore;

use super::confirm;

/// Log and manage fuel entries
#[derive(Debug, Args)]
pub struct EntryCommand {
    #[command(subcommand)]
    pub command: EntrySubcommand,
}

#[derive(Debug, Subcommand)]
pub enum EntrySubcommand {
    /// Record a fuel entry
    Add {
        /// Equipment kind (Generator, Vehicle, Motorbike, ...)
        #[arg(long)]
        equipment: String,
        /// Liters consumed
        #[arg(long)]
        liters: f64,
        /// Usage span start, HH:MM
        #[arg(long)]
        start: String,
        /// Usage span end, HH:MM (may wrap past midnight)
        #[arg(long)]
        end: String,
        /// Distance covered in km (vehicles/motorbikes)
        #[arg(long, default_value_t = 0.0)]
        distance: f64,
        /// Entry date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        operator: Option<String>,
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        station: Option<String>,
        /// Reporting period (default: derived from date, e.g. 2026-Q3)
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },

    /// List entries, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one entry in full
    Show { id: i64 },

    /// Update fields of an existing entry
    Update {
        id: i64,
        #[arg(long)]
        equipment: Option<String>,
        #[arg(long)]
        liters: Option<f64>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        distance: Option<f64>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        operator: Option<String>,
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        station: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },

    /// Delete one entry
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Delete every entry
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List entries within an inclusive date range
    Range {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
}

impl EntryCommand {
    pub async fn run(
        &self,
        store: &LocalStore,
        notifier: &dyn Notifier,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            EntrySubcommand::Add {
                equipment,
                liters,
                start,
                end,
                distance,
                date,
                operator,
                site,
                station,
                period,
                location,
            } => {
                add(
                    store, notifier, config, equipment, *liters, start, end, *distance, date,
                    operator, site, station, period, location,
                )
                .await
            }
            EntrySubcommand::List { limit } => {
                let entries = store.get_all_entries().await;
                let shown = limit.unwrap_or(entries.len());
                print_entry_lines(entries.iter().take(shown));
                println!("{} entries", entries.len());
                Ok(())
            }
            EntrySubcommand::Show { id } => match store.get_entry_by_id(*id).await {
                Some(entry) => {
                    println!("{}", entry);
                    Ok(())
                }
                None => Err(format!("Entry {} not found", id).into()),
            },
            EntrySubcommand::Update {
                id,
                equipment,
                liters,
                start,
                end,
                distance,
                date,
                operator,
                site,
                station,
                period,
                location,
            } => {
                update(
                    store, notifier, *id, equipment, *liters, start, end, *distance, date,
                    operator, site, station, period, location,
                )
                .await
            }
            EntrySubcommand::Delete { id, yes } => {
                let Some(entry) = store.get_entry_by_id(*id).await else {
                    return Err(format!("Entry {} not found", id).into());
                };
                if !yes && !confirm(&format!("Delete entry {}?", id)) {
                    println!("Cancelled.");
                    return Ok(());
                }
                if !store.delete_entry(*id).await {
                    return Err(format!("Entry {} could not be deleted", id).into());
                }
                notifier.notify(EntryEvent::Deleted, &entry);
                println!("✓ deleted entry {}", id);
                Ok(())
            }
            EntrySubcommand::Clear { yes } => {
                let count = store.get_all_entries().await.len();
                if count == 0 {
                    println!("Nothing to clear.");
                    return Ok(());
                }
                if !yes && !confirm(&format!("Delete all {} entries?", count)) {
                    println!("Cancelled.");
                    return Ok(());
                }
                if !store.clear_all_entries().await {
                    return Err("Entries could not be cleared".into());
                }
                println!("✓ cleared {} entries", count);
                Ok(())
            }
            EntrySubcommand::Range { from, to } => {
                let entries = store.get_entries_in_date_range(*from, *to).await;
                print_entry_lines(entries.iter());
                println!("{} entries between {} and {}", entries.len(), from, to);
                Ok(())
            }
        }
    }
}

fn print_entry_lines<'a>(entries: impl Iterator<Item = &'a FuelEntry>) {
    for entry in entries {
        println!(
            "{}  {}  {} ({})  {} L  {}",
            entry.id,
            entry.date.as_deref().unwrap_or("-"),
            entry.operator.as_deref().unwrap_or("-"),
            entry.equipment.as_deref().unwrap_or("-"),
            entry.liters,
            entry.consumption.as_deref().unwrap_or("-")
        );
    }
}

/// Reporting period for a date, e.g. "2026-Q3". Falls back to the year of
/// the current clock when the date is unparsable.
fn period_for(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => format!("{}-Q{}", d.year(), (d.month0() / 3) + 1),
        Err(_) => format!("{}", Utc::now().year()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn add(
    store: &LocalStore,
    notifier: &dyn Notifier,
    config: &Config,
    equipment: &str,
    liters: f64,
    start: &str,
    end: &str,
    distance: f64,
    date: &Option<String>,
    operator: &Option<String>,
    site: &Option<String>,
    station: &Option<String>,
    period: &Option<String>,
    location: &Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if liters <= 0.0 {
        return Err("Liters must be greater than zero".into());
    }
    let total_hours = consumption::total_hours(start, end)
        .ok_or("Invalid time span: expected HH:MM times")?;
    if matches!(equipment, "Vehicle" | "Motorbike") && distance <= 0.0 {
        return Err("Distance must be greater than zero for vehicles".into());
    }

    let date = date
        .clone()
        .unwrap_or_else(|| Utc::now().date_naive().to_string());
    let operator = operator.clone().unwrap_or_else(|| config.operator.value.clone());
    let period = period.clone().unwrap_or_else(|| period_for(&date));

    let id = store.next_entry_id().await;
    let mut entry = FuelEntry::new(id)
        .with_date(date)
        .with_period(period)
        .with_operator(operator)
        .with_equipment(equipment)
        .with_times(start, end)
        .with_metrics(total_hours, distance, liters);
    if let Some(site) = site {
        entry = entry.with_site(site.clone());
    }
    if let Some(station) = station {
        entry = entry.with_station(station.clone());
    }
    if let Some(location) = location {
        entry = entry.with_location(location.clone());
    }
    if let Some((text, value)) = consumption::derive_consumption(equipment, liters, total_hours, distance) {
        entry = entry.with_consumption(text, value);
    }

    if store.add_entry(&entry).await.is_none() {
        return Err("Entry could not be saved".into());
    }
    notifier.notify(EntryEvent::Added, &entry);

    println!("✓ saved entry {}", entry.id);
    println!("{}", entry);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn update(
    store: &LocalStore,
    notifier: &dyn Notifier,
    id: i64,
    equipment: &Option<String>,
    liters: Option<f64>,
    start: &Option<String>,
    end: &Option<String>,
    distance: Option<f64>,
    date: &Option<String>,
    operator: &Option<String>,
    site: &Option<String>,
    station: &Option<String>,
    period: &Option<String>,
    location: &Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(existing) = store.get_entry_by_id(id).await else {
        return Err(format!("Entry {} not found", id).into());
    };

    // Merge the overrides onto the current values, then re-derive the
    // consumption figures from the merged record.
    let equipment_value = equipment
        .clone()
        .or_else(|| existing.equipment.clone())
        .unwrap_or_default();
    let liters_value = liters.unwrap_or(existing.liters);
    let distance_value = distance.unwrap_or(existing.distance);
    let start_value = start.clone().or_else(|| existing.start_time.clone());
    let end_value = end.clone().or_else(|| existing.end_time.clone());

    let total_hours = match (&start_value, &end_value) {
        (Some(s), Some(e)) => consumption::total_hours(s, e)
            .ok_or("Invalid time span: expected HH:MM times")?,
        _ => existing.total_hours,
    };

    let mut patch = FuelEntryPatch {
        site: site.clone(),
        period: period.clone(),
        date: date.clone(),
        station: station.clone(),
        operator: operator.clone(),
        equipment: equipment.clone(),
        start_time: start.clone(),
        end_time: end.clone(),
        total_hours: Some(total_hours),
        distance,
        liters,
        location: location.clone(),
        timestamp: Some(Utc::now()),
        ..Default::default()
    };
    if let Some((text, value)) =
        consumption::derive_consumption(&equipment_value, liters_value, total_hours, distance_value)
    {
        patch.consumption = Some(text);
        patch.consumption_value = Some(value);
    }

    let Some(merged) = store.update_entry(id, &patch).await else {
        return Err(format!("Entry {} could not be updated", id).into());
    };
    notifier.notify(EntryEvent::Updated, &merged);

    println!("✓ updated entry {}", id);
    println!("{}", merged);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_for_quarters() {
        assert_eq!(period_for("2026-01-15"), "2026-Q1");
        assert_eq!(period_for("2026-03-31"), "2026-Q1");
        assert_eq!(period_for("2026-04-01"), "2026-Q2");
        assert_eq!(period_for("2026-08-06"), "2026-Q3");
        assert_eq!(period_for("2026-12-31"), "2026-Q4");
    }
}
