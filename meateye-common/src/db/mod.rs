//! Database schema, row models and value codecs

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Fixed-width UTC timestamp so TEXT comparison matches chronological order
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(column: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
