use rusqlite::{params, Connection};

use super::{decode_string_list, encode_string_list};
use crate::db::DatabaseError;
use crate::models::Medication;

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, user_id, name, dosage, times, days, voice_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            med.id,
            med.user_id,
            med.name,
            med.dosage,
            encode_string_list(&med.times),
            encode_string_list(&med.days),
            med.voice_message,
        ],
    )?;
    Ok(())
}

/// Lists a user's medications ordered by name.
pub fn list_medications_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, dosage, times, days, voice_message
         FROM medications
         WHERE user_id = ?1
         ORDER BY name ASC, id ASC",
    )?;

    let rows = stmt.query_map([user_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;

    let mut medications = Vec::new();
    for row in rows {
        let (id, user_id, name, dosage, times, days, voice_message) = row?;
        medications.push(Medication {
            id,
            user_id,
            name,
            dosage,
            times: decode_string_list("medications.times", &times)?,
            days: decode_string_list("medications.days", &days)?,
            voice_message,
        });
    }
    Ok(medications)
}
