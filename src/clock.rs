//! Timestamp helpers shared by the pipeline and the API.
//!
//! All hour-of-day bucketing is done in UTC so that history, pricing and
//! detection agree on the same 24 buckets regardless of host timezone.

use crate::error::AppError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const HOURS_PER_DAY: usize = 24;
const SECONDS_PER_HOUR: u64 = 3600;

/// UTC hour of day (0-23) for a timestamp.
pub fn hour_of_day(timestamp: SystemTime) -> u8 {
    OffsetDateTime::from(timestamp).hour()
}

/// Start of the UTC hour containing `timestamp`.
pub fn floor_to_hour(timestamp: SystemTime) -> SystemTime {
    match timestamp.duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => {
            let secs = since_epoch.as_secs() - since_epoch.as_secs() % SECONDS_PER_HOUR;
            UNIX_EPOCH + Duration::from_secs(secs)
        }
        Err(_) => UNIX_EPOCH,
    }
}

pub fn format_timestamp(timestamp: SystemTime) -> Result<String, time::error::Format> {
    OffsetDateTime::from(timestamp).format(&Rfc3339)
}

/// Format for response bodies; never fails.
pub fn format_timestamp_lossy(timestamp: SystemTime) -> String {
    format_timestamp(timestamp).unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Parse an RFC 3339 / ISO 8601 timestamp supplied by a client.
pub fn parse_timestamp(value: &str) -> Result<SystemTime, AppError> {
    let parsed = OffsetDateTime::parse(value.trim(), &Rfc3339)
        .map_err(|err| AppError::Validation(format!("invalid timestamp {value:?}: {err}")))?;
    Ok(parsed.into())
}
