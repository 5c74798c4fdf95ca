use rusqlite::{params, Connection};

use super::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::{Appointment, DoctorRef};

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, user_id, doctor_id, doctor_name, doctor_specialty,
                                   date_time, reminder_lead, voice_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            appt.id,
            appt.user_id,
            appt.doctor.id,
            appt.doctor.name,
            appt.doctor.specialty,
            format_datetime(&appt.date_time),
            appt.reminder_lead,
            appt.voice_message,
        ],
    )?;
    Ok(())
}

/// Move an appointment. A new date-time is a new occurrence for the ledger.
pub fn reschedule_appointment(
    conn: &Connection,
    id: &str,
    date_time: &chrono::NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET date_time = ?2 WHERE id = ?1",
        params![id, format_datetime(date_time)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.into(),
        });
    }
    Ok(())
}

/// Lists a user's appointments ordered by date-time ASC.
pub fn list_appointments_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, doctor_id, doctor_name, doctor_specialty, date_time,
                reminder_lead, voice_message
         FROM appointments
         WHERE user_id = ?1
         ORDER BY date_time ASC",
    )?;

    let rows = stmt.query_map([user_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            DoctorRef {
                id: row.get(2)?,
                name: row.get(3)?,
                specialty: row.get(4)?,
            },
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;

    let mut appointments = Vec::new();
    for row in rows {
        let (id, user_id, doctor, raw_date, reminder_lead, voice_message) = row?;
        appointments.push(Appointment {
            id,
            user_id,
            doctor,
            date_time: parse_datetime(&raw_date)?,
            reminder_lead,
            voice_message,
        });
    }
    Ok(appointments)
}
