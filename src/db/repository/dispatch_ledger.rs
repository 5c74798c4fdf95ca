use std::collections::HashSet;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use super::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::{DispatchMarker, ReminderKind};

/// Record a SENT occurrence. Returns false if the key was already recorded.
pub fn record_dispatch(conn: &Connection, marker: &DispatchMarker) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO dispatch_ledger (occurrence_key, user_id, kind, entity_id, slot, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            marker.occurrence_key,
            marker.user_id,
            marker.kind.as_str(),
            marker.entity_id,
            marker.slot,
            format_datetime(&marker.sent_at),
        ],
    )?;
    Ok(inserted > 0)
}

pub fn is_dispatched(conn: &Connection, occurrence_key: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM dispatch_ledger WHERE occurrence_key = ?1",
        [occurrence_key],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Every occurrence key already notified for one user.
pub fn sent_keys_for_user(conn: &Connection, user_id: &str) -> Result<HashSet<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT occurrence_key FROM dispatch_ledger WHERE user_id = ?1")?;
    let keys = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(keys)
}

/// Ledger rows for one user, newest first.
pub fn list_dispatches_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<DispatchMarker>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT occurrence_key, user_id, kind, entity_id, slot, sent_at
         FROM dispatch_ledger WHERE user_id = ?1
         ORDER BY sent_at DESC, occurrence_key",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut markers = Vec::new();
    for row in rows {
        let (occurrence_key, user_id, kind, entity_id, slot, sent_at) = row?;
        markers.push(DispatchMarker {
            occurrence_key,
            user_id,
            kind: kind.parse()?,
            entity_id,
            slot,
            sent_at: parse_datetime(&sent_at)?,
        });
    }
    Ok(markers)
}

/// Delete markers of `kind` sent before `cutoff`. Returns rows removed.
///
/// Only recurring kinds should be pruned: an appointment or welcome marker
/// that disappears would allow a resend.
pub fn prune_dispatch_ledger(
    conn: &Connection,
    kind: ReminderKind,
    cutoff: &NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM dispatch_ledger WHERE kind = ?1 AND sent_at < ?2",
        params![kind.as_str(), format_datetime(cutoff)],
    )?;
    Ok(removed)
}
