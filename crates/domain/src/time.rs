//! Time and timestamp helpers.

use chrono::{DateTime, Datelike, Duration, Utc};

/// UTC timestamp used for `created_at`, `started_at`, token expiry, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return `reference` moved back by `minutes` minutes, saturating at the
/// earliest representable instant.
#[must_use]
pub fn minutes_before(reference: Timestamp, minutes: u32) -> Timestamp {
    Duration::try_minutes(i64::from(minutes))
        .and_then(|delta| reference.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Return `reference` moved back by `days` days, saturating at the earliest
/// representable instant.
#[must_use]
pub fn days_before(reference: Timestamp, days: u32) -> Timestamp {
    Duration::try_days(i64::from(days))
        .and_then(|delta| reference.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Return `reference` moved forward by `seconds`, or `None` when the result
/// falls outside the four-digit years RFC 3339 can carry.
#[must_use]
pub fn seconds_after(reference: Timestamp, seconds: i64) -> Option<Timestamp> {
    Duration::try_seconds(seconds)
        .and_then(|delta| reference.checked_add_signed(delta))
        .filter(|ts| (0..=9999).contains(&ts.year()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_move_back_by_minutes_and_days() {
        let reference: Timestamp = "2024-03-10T12:00:00Z".parse().unwrap();
        assert_eq!(
            minutes_before(reference, 90),
            "2024-03-10T10:30:00Z".parse::<Timestamp>().unwrap()
        );
        assert_eq!(
            days_before(reference, 30),
            "2024-02-09T12:00:00Z".parse::<Timestamp>().unwrap()
        );
    }

    #[test]
    fn should_saturate_instead_of_overflowing() {
        let reference = now();
        assert_eq!(days_before(reference, u32::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            minutes_before(reference, u32::MAX),
            reference - Duration::minutes(i64::from(u32::MAX))
        );
    }

    #[test]
    fn should_reject_offsets_beyond_four_digit_years() {
        let reference: Timestamp = "2024-03-10T12:00:00Z".parse().unwrap();
        assert_eq!(
            seconds_after(reference, 3600),
            Some("2024-03-10T13:00:00Z".parse().unwrap())
        );
        assert_eq!(seconds_after(reference, i64::MAX), None);
        assert_eq!(seconds_after(reference, 400_000_000_000), None);
    }
}
