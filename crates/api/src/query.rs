//! Shared query parameter parsing for API handlers.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{AppError, AppResult};

/// Parse an ISO 8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(field: &str, value: &str) -> AppResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| AppError::BadRequest(format!("Invalid {field}: expected an ISO 8601 timestamp")))
}

/// Parse an optional timestamp parameter.
pub fn parse_optional_timestamp(
    field: &str,
    value: Option<&str>,
) -> AppResult<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(field, v)).transpose()
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
