//! Notification dispatch seam.
//!
//! Entry mutations announce themselves through a [`Notifier`]; delivery is
//! fire-and-forget and failures are the implementation's problem, never the
//! caller's. The default implementation writes a structured log line; a push
//! transport can be slotted in behind the same trait.

use std::fmt;

use crate::models::FuelEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryEvent {
    Added,
    Updated,
    Deleted,
}

impl fmt::Display for EntryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryEvent::Added => write!(f, "added"),
            EntryEvent::Updated => write!(f, "updated"),
            EntryEvent::Deleted => write!(f, "deleted"),
        }
    }
}

pub trait Notifier {
    fn notify(&self, event: EntryEvent, entry: &FuelEntry);
}

/// Logs entry events via tracing.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: EntryEvent, entry: &FuelEntry) {
        tracing::info!(
            "entry {} {}: {} - {}",
            entry.id,
            event,
            entry.operator.as_deref().unwrap_or("-"),
            entry.consumption.as_deref().unwrap_or("-")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        assert_eq!(EntryEvent::Added.to_string(), "added");
        assert_eq!(EntryEvent::Updated.to_string(), "updated");
        assert_eq!(EntryEvent::Deleted.to_string(), "deleted");
    }
}
