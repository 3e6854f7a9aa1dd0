pub mod consumption;
mod fuel_entry;

pub use fuel_entry::{FuelEntry, FuelEntryPatch};

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats an instant for storage and the sync wire: RFC 3339 UTC with
/// millisecond precision and a `Z` suffix. Fixed width, so lexicographic
/// order equals chronological order.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 instant, in any offset, back to UTC.
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_instant_roundtrip() {
        let instant = Utc.with_ymd_and_hms(2026, 8, 6, 10, 30, 0).unwrap();
        let text = format_instant(instant);
        assert_eq!(text, "2026-08-06T10:30:00.000Z");
        assert_eq!(parse_instant(&text), Some(instant));
    }

    #[test]
    fn test_parse_instant_accepts_offsets() {
        let parsed = parse_instant("2026-08-06T12:30:00+02:00").unwrap();
        assert_eq!(format_instant(parsed), "2026-08-06T10:30:00.000Z");
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert!(parse_instant("8/6/2026, 10:30:00 AM").is_none());
        assert!(parse_instant("").is_none());
    }

    #[test]
    fn test_lexicographic_order_matches_chronological() {
        let earlier = format_instant(Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap());
        let later = format_instant(Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 1).unwrap());
        assert!(earlier < later);
    }
}
