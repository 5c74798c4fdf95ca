use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{DispatchMarker, ReminderKind};

/// Identity of one notifiable occurrence.
///
/// The rendered key is what the dedup ledger stores; two scans that see the
/// same occurrence always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OccurrenceKey {
    Appointment {
        user_id: String,
        appointment_id: String,
        scheduled_for: NaiveDateTime,
    },
    Medication {
        user_id: String,
        medication_id: String,
        date: NaiveDate,
        slot: NaiveTime,
    },
    Welcome {
        user_id: String,
    },
}

impl OccurrenceKey {
    /// Appointment keys carry the scheduled date-time, so a rescheduled
    /// appointment is a new occurrence.
    pub fn appointment(user_id: &str, appointment_id: &str, scheduled_for: NaiveDateTime) -> Self {
        Self::Appointment {
            user_id: user_id.to_string(),
            appointment_id: appointment_id.to_string(),
            scheduled_for,
        }
    }

    pub fn medication(user_id: &str, medication_id: &str, date: NaiveDate, slot: NaiveTime) -> Self {
        Self::Medication {
            user_id: user_id.to_string(),
            medication_id: medication_id.to_string(),
            date,
            slot,
        }
    }

    pub fn welcome(user_id: &str) -> Self {
        Self::Welcome {
            user_id: user_id.to_string(),
        }
    }

    pub fn kind(&self) -> ReminderKind {
        match self {
            Self::Appointment { .. } => ReminderKind::Appointment,
            Self::Medication { .. } => ReminderKind::Medication,
            Self::Welcome { .. } => ReminderKind::Welcome,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Appointment { user_id, .. }
            | Self::Medication { user_id, .. }
            | Self::Welcome { user_id } => user_id,
        }
    }

    /// Id of the scheduled entity; the user id for welcome messages.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Appointment { appointment_id, .. } => appointment_id,
            Self::Medication { medication_id, .. } => medication_id,
            Self::Welcome { user_id } => user_id,
        }
    }

    pub fn slot_label(&self) -> Option<String> {
        match self {
            Self::Appointment { scheduled_for, .. } => {
                Some(scheduled_for.format("%Y-%m-%d %H:%M").to_string())
            }
            Self::Medication { date, slot, .. } => Some(format!(
                "{} {}",
                date.format("%Y-%m-%d"),
                slot.format("%H:%M")
            )),
            Self::Welcome { .. } => None,
        }
    }

    /// Ledger key. Id parts are escaped so `:` inside an id cannot make two
    /// occurrences share a key.
    pub fn as_key(&self) -> String {
        match self {
            Self::Appointment {
                user_id,
                appointment_id,
                scheduled_for,
            } => format!(
                "appointment:{}:{}:{}",
                escape_id(user_id),
                escape_id(appointment_id),
                scheduled_for.format("%Y-%m-%dT%H:%M")
            ),
            Self::Medication {
                user_id,
                medication_id,
                date,
                slot,
            } => format!(
                "medication:{}:{}:{}:{}",
                escape_id(user_id),
                escape_id(medication_id),
                date.format("%Y-%m-%d"),
                slot.format("%H:%M")
            ),
            Self::Welcome { user_id } => format!("welcome:{}", escape_id(user_id)),
        }
    }

    /// Ledger row recording this occurrence as sent at `sent_at` (UTC).
    pub fn to_marker(&self, sent_at: NaiveDateTime) -> DispatchMarker {
        DispatchMarker {
            occurrence_key: self.as_key(),
            user_id: self.user_id().to_string(),
            kind: self.kind(),
            entity_id: self.entity_id().to_string(),
            slot: self.slot_label(),
            sent_at,
        }
    }
}

/// Percent-encode the key separator and the escape character itself.
fn escape_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            other => out.push(other),
        }
    }
    out
}

impl std::fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_key())
    }
}
