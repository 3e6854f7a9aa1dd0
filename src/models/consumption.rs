//! Consumption metric derivation.
//!
//! These calculations belong to the caller side of the store: an entry is
//! saved with whatever `consumption`/`total_hours` the caller derived, and
//! the persistence and sync layers treat them as opaque.

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn parse_hhmm(text: &str) -> Option<i32> {
    let (h, m) = text.trim().split_once(':')?;
    let h: i32 = h.parse().ok()?;
    let m: i32 = m.parse().ok()?;
    if !(0..24).contains(&h) || !(0..60).contains(&m) {
        return None;
    }
    Some(h * 60 + m)
}

/// Duration in hours between two "HH:MM" times, wrapping past midnight when
/// the end is earlier than the start. Returns `None` for unparsable input.
pub fn total_hours(start_time: &str, end_time: &str) -> Option<f64> {
    let start = parse_hhmm(start_time)?;
    let end = parse_hhmm(end_time)?;
    let mut minutes = end - start;
    if minutes < 0 {
        minutes += 24 * 60;
    }
    Some(round2(f64::from(minutes) / 60.0))
}

/// Derives the formatted consumption string and its numeric value for a
/// piece of equipment.
///
/// Generators report liters per hour; vehicles and motorbikes report
/// L/100km alongside km/L, with the L/100km figure as the numeric value.
/// Unknown equipment kinds derive nothing.
pub fn derive_consumption(
    equipment: &str,
    liters: f64,
    total_hours: f64,
    distance: f64,
) -> Option<(String, f64)> {
    match equipment {
        "Generator" => {
            if total_hours <= 0.0 {
                return None;
            }
            let lph = round2(liters / total_hours);
            Some((format!("{:.2} L/h", lph), lph))
        }
        "Vehicle" | "Motorbike" => {
            if distance <= 0.0 || liters <= 0.0 {
                return None;
            }
            let l_per_100km = round2(liters / distance * 100.0);
            let km_per_liter = round2(distance / liters);
            Some((
                format!("{:.2} L/100km | {:.2} km/L", l_per_100km, km_per_liter),
                l_per_100km,
            ))
        }
        _ => None,
    }
}
