//! Schedule translation — five-field cron strings to an interval in days.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule must have 5 whitespace-separated fields: minute hour day month weekday")]
    InvalidFormat,
}

/// A field counts as a wildcard when it is `*` or the every-unit step `*/1`.
fn is_wildcard(field: &str) -> bool {
    field == "*" || field == "*/1"
}

/// Derive the minimum number of days between runs from a five-field
/// cron-style schedule.
///
/// This is a deliberate lossy reduction of cron: only "how many days apart"
/// survives, evaluated day-granular. Precedence: a concrete day-of-month
/// wins (its numeric value, clamped to at least 1; a concrete but
/// non-numeric day falls back to 1 *without* consulting the later fields),
/// then a concrete weekday means weekly, then a concrete hour means daily,
/// and everything-wildcard defaults to daily. Stored intervals depend on
/// this exact rule order.
pub fn interval_days(schedule: &str) -> Result<u32, ScheduleError> {
    let fields: Vec<&str> = schedule.split_whitespace().collect();
    let [_minute, hour, day, _month, weekday] = fields[..] else {
        return Err(ScheduleError::InvalidFormat);
    };

    if !is_wildcard(day) {
        Ok(day.parse::<u32>().map(|d| d.max(1)).unwrap_or(1))
    } else if !is_wildcard(weekday) {
        Ok(7)
    } else if !is_wildcard(hour) {
        Ok(1)
    } else {
        Ok(1)
    }
}
