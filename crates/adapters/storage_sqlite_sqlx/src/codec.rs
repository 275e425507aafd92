//! Column encodings shared by the repositories.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC with
//! nanosecond precision, so comparing the text columns orders them
//! chronologically and a stored value reads back unchanged.

use std::str::FromStr;

use chrono::SecondsFormat;

use areaflow_domain::time::Timestamp;

pub(crate) fn encode_ts(value: Timestamp) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_ts(value: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

pub(crate) fn decode_opt_ts(value: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    value.as_deref().map(decode_ts).transpose()
}

pub(crate) fn decode_id<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(value).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_with_fixed_width() {
        let whole: Timestamp = "2024-01-01T10:00:00Z".parse().unwrap();
        let fraction: Timestamp = "2024-01-01T10:00:00.5Z".parse().unwrap();

        assert_eq!(encode_ts(whole), "2024-01-01T10:00:00.000000000Z");
        assert!(encode_ts(whole) < encode_ts(fraction));
        assert_eq!(decode_ts(&encode_ts(fraction)).unwrap(), fraction);
    }

    #[test]
    fn should_keep_sub_microsecond_precision() {
        let ts: Timestamp = "2024-01-01T12:00:00.000000500Z".parse().unwrap();
        assert_eq!(encode_ts(ts), "2024-01-01T12:00:00.000000500Z");
        assert_eq!(decode_ts(&encode_ts(ts)).unwrap(), ts);
    }

    #[test]
    fn should_reject_garbage_timestamp() {
        assert!(decode_ts("yesterday").is_err());
        assert_eq!(decode_opt_ts(None).unwrap(), None);
    }
}
