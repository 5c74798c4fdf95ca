//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table. All public functions are re-exported here.

mod appointment;
mod dispatch_ledger;
mod family_profile;
mod medication;
mod preference;
mod user;

use rusqlite::Connection;

use super::DatabaseError;

pub use appointment::*;
pub use dispatch_ledger::*;
pub use family_profile::*;
pub use medication::*;
pub use preference::*;
pub use user::*;

/// Storage format for every naive date-time column.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn parse_datetime(raw: &str) -> Result<chrono::NaiveDateTime, DatabaseError> {
    chrono::NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map_err(|_| DatabaseError::InvalidDateTime(raw.to_string()))
}

pub(crate) fn format_datetime(value: &chrono::NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn decode_string_list(column: &str, raw: &str) -> Result<Vec<String>, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::InvalidJson {
        column: column.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// Run `f` inside a transaction, committing on success.
pub fn with_transaction<T, F>(conn: &Connection, f: F) -> Result<T, DatabaseError>
where
    F: FnOnce(&Connection) -> Result<T, DatabaseError>,
{
    let tx = conn.unchecked_transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
