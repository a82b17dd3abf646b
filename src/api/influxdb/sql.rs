//! Pieces of the InfluxDB SQL dialect.
//!
//! Names coming from the configuration go through [`identifier`] or [`string`], instants through
//! [`timestamp`]. Nothing else is ever interpolated into the queries.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};

/// Double-quoted identifier with embedded quotes doubled.
#[must_use]
pub fn identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column reference, or `NULL` when the table has no such column yet.
///
/// InfluxDB fails the entire query on an unknown column instead of treating it as nulls.
#[must_use]
pub fn column_or_null(name: &str, columns: &HashSet<String>) -> String {
    if columns.contains(name) { identifier(name) } else { "NULL".to_owned() }
}

/// Single-quoted string literal with embedded quotes doubled.
#[must_use]
pub fn string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// ISO-8601 timestamp literal.
#[must_use]
pub fn timestamp(instant: DateTime<Utc>) -> String {
    format!("TIMESTAMP '{}'", instant.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn identifier_ok() {
        assert_eq!(identifier("sun2000_monitoring"), r#""sun2000_monitoring""#);
        assert_eq!(identifier(r#"x"; DROP TABLE y; --"#), r#""x""; DROP TABLE y; --""#);
    }

    #[test]
    fn column_or_null_ok() {
        let columns = HashSet::from(["battery_soc".to_owned()]);
        assert_eq!(column_or_null("battery_soc", &columns), r#""battery_soc""#);
        assert_eq!(column_or_null("meter_reverse_active_power", &columns), "NULL");
    }

    #[test]
    fn string_ok() {
        assert_eq!(string("sun2000_monitoring"), "'sun2000_monitoring'");
        assert_eq!(string("it's"), "'it''s'");
    }

    #[test]
    fn timestamp_ok() {
        let instant = Utc.with_ymd_and_hms(2025, 12, 19, 23, 0, 0).unwrap();
        assert_eq!(timestamp(instant), "TIMESTAMP '2025-12-19T23:00:00Z'");
    }
}
