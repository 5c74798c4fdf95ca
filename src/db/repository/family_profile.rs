use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::FamilyProfile;

/// Store a dependent profile under `user_id`.
pub fn insert_family_profile(
    conn: &Connection,
    user_id: &str,
    profile: &FamilyProfile,
) -> Result<(), DatabaseError> {
    if profile.is_self {
        return Err(DatabaseError::ConstraintViolation(
            "the self profile is derived from the user record and never stored".into(),
        ));
    }
    conn.execute(
        "INSERT INTO family_profiles (id, user_id, display_name, relationship)
         VALUES (?1, ?2, ?3, ?4)",
        params![profile.id, user_id, profile.display_name, profile.relationship],
    )?;
    Ok(())
}

/// Dependent profiles of a user, in creation order.
pub fn list_family_profiles(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<FamilyProfile>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, display_name, relationship FROM family_profiles
         WHERE user_id = ?1
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(FamilyProfile {
            id: row.get(0)?,
            display_name: row.get(1)?,
            relationship: row.get(2)?,
            is_self: false,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn delete_family_profile(conn: &Connection, user_id: &str, id: &str) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM family_profiles WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "FamilyProfile".into(),
            id: id.into(),
        });
    }
    Ok(())
}
