use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

/// Catalogue index for a vibe day: day-of-year (Jan 1 = 0) modulo the
/// catalogue size. An admin override for the date, handled by the caller,
/// supersedes this.
pub fn rotation_index(date: NaiveDate, catalogue_len: usize) -> usize {
    debug_assert!(catalogue_len > 0);
    date.ordinal0() as usize % catalogue_len
}

/// Observation window for a vibe day: the full calendar day in the server's
/// local timezone. Informational only, never a gate.
pub fn observation_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN);
    let end = start + Duration::days(1);
    (local_instant(start), local_instant(end))
}

fn local_instant(naive: chrono::NaiveDateTime) -> DateTime<Utc> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // DST fold: take the earlier reading
        LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // DST gap: the local midnight does not exist, read it as UTC
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn jan_first_selects_first_entry() {
        assert_eq!(rotation_index(day("2024-01-01"), 10), 0);
        assert_eq!(rotation_index(day("2025-01-01"), 10), 0);
    }

    #[test]
    fn rotation_is_deterministic_and_wraps() {
        let d = day("2024-06-01");
        assert_eq!(rotation_index(d, 10), rotation_index(d, 10));
        // 2024-06-01 is the 153rd day of a leap year, ordinal0 = 152
        assert_eq!(rotation_index(d, 10), 2);
        assert_eq!(rotation_index(d, 7), 152 % 7);
    }

    #[test]
    fn consecutive_days_step_by_one() {
        let a = rotation_index(day("2024-03-01"), 10);
        let b = rotation_index(day("2024-03-02"), 10);
        assert_eq!((a + 1) % 10, b);
    }

    #[test]
    fn window_spans_a_full_day() {
        let (start, end) = observation_window(day("2024-06-01"));
        assert_eq!(end - start, Duration::days(1));
    }
}
