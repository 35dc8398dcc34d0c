//! Datetime parsing shared by every sqlx repository adapter.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a timestamp column in either RFC3339 or SQLite's bare
/// `YYYY-MM-DD HH:MM:SS` default format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339() {
        let dt = parse_datetime("2026-01-15T12:00:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-01-15T12:00:00+00:00");
    }

    #[test]
    fn parses_sqlite_default_format() {
        let dt = parse_datetime("2026-01-15 12:00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-01-15T12:00:00+00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_datetime("not a date").is_err());
    }
}
