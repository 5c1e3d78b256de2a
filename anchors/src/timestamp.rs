//! Lenient timestamp parsing for anchor files.
//!
//! Files written by this crate use RFC 3339. Older anchor files carry naive
//! ISO 8601 timestamps without an offset (`2024-01-15T10:23:45.123456`);
//! those are read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de};

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(de::Error::custom)
}

pub(crate) fn deserialize_option<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse(&raw).map_err(de::Error::custom))
        .transpose()
}

fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(timestamp) => Ok(timestamp.with_timezone(&Utc)),
        Err(_) => raw.parse::<NaiveDateTime>().map(|naive| naive.and_utc()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rfc3339_with_offset() {
        let parsed = parse("2024-01-15T12:23:45+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 15, 10, 23, 45).unwrap());
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let parsed = parse("2024-01-15T10:23:45.123456").unwrap();
        assert_eq!(parsed.hour(), 10);
        assert_eq!(parsed.nanosecond(), 123_456_000);

        let whole_seconds = parse("2024-01-15T10:23:45").unwrap();
        assert_eq!(
            whole_seconds,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 23, 45).unwrap()
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse("yesterday").is_err());
    }
}
