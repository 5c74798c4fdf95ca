//! Pure due-ness evaluation.
//!
//! Nothing here reads the clock or the store: the dispatcher passes the
//! local instant, the user's schedules and the keys already sent.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::occurrence::OccurrenceKey;
use super::render;
use crate::models::{Appointment, Medication, ReminderKind, User};

/// Timing rules applied to every user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRules {
    /// How long after its slot a medication dose is still notified.
    pub medication_tolerance: Duration,
    /// Lead used when an appointment has no readable lead descriptor.
    pub default_lead: Duration,
}

impl Default for EvaluationRules {
    fn default() -> Self {
        Self {
            medication_tolerance: Duration::minutes(15),
            default_lead: Duration::minutes(60),
        }
    }
}

pub struct EvaluationInput<'a> {
    /// Current wall-clock time in the reminder timezone.
    pub now: NaiveDateTime,
    pub user: &'a User,
    pub appointments: &'a [Appointment],
    pub medications: &'a [Medication],
    pub already_sent: &'a HashSet<String>,
    pub rules: &'a EvaluationRules,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderSource {
    Appointment(Appointment),
    Medication {
        medication: Medication,
        date: NaiveDate,
        slot: NaiveTime,
    },
    Welcome {
        name: String,
    },
}

/// An occurrence that should be notified now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub occurrence: OccurrenceKey,
    pub source: ReminderSource,
    /// Text the client speaks when the notification is opened.
    pub speak_text: String,
}

impl DueReminder {
    pub fn kind(&self) -> ReminderKind {
        self.occurrence.kind()
    }

    pub fn user_id(&self) -> &str {
        self.occurrence.user_id()
    }
}

/// Every due, not-yet-sent occurrence for one user, welcome first, then
/// appointments, then medications.
pub fn evaluate(input: &EvaluationInput<'_>) -> Vec<DueReminder> {
    let mut due = Vec::new();
    let user_id = input.user.id.as_str();

    if input.user.is_validated {
        let occurrence = OccurrenceKey::welcome(user_id);
        if !input.already_sent.contains(&occurrence.as_key()) {
            let name = input.user.greeting_name().to_string();
            due.push(DueReminder {
                occurrence,
                speak_text: render::welcome_speech(&name),
                source: ReminderSource::Welcome { name },
            });
        }
    }

    for appointment in input.appointments {
        if !appointment_due(input.now, appointment, input.rules.default_lead) {
            continue;
        }
        let occurrence = OccurrenceKey::appointment(user_id, &appointment.id, appointment.date_time);
        if input.already_sent.contains(&occurrence.as_key()) {
            continue;
        }
        due.push(DueReminder {
            occurrence,
            speak_text: speech_or(appointment.voice_message.as_deref(), || {
                render::appointment_speech(appointment)
            }),
            source: ReminderSource::Appointment(appointment.clone()),
        });
    }

    for medication in input.medications {
        for (date, slot) in due_medication_slots(input.now, medication, input.rules.medication_tolerance) {
            let occurrence = OccurrenceKey::medication(user_id, &medication.id, date, slot);
            if input.already_sent.contains(&occurrence.as_key()) {
                continue;
            }
            due.push(DueReminder {
                occurrence,
                speak_text: speech_or(medication.voice_message.as_deref(), || {
                    render::medication_speech(medication)
                }),
                source: ReminderSource::Medication {
                    medication: medication.clone(),
                    date,
                    slot,
                },
            });
        }
    }

    due
}

/// Due from `remind_at` until the appointment starts.
pub fn appointment_due(now: NaiveDateTime, appointment: &Appointment, default_lead: Duration) -> bool {
    appointment
        .remind_at(default_lead)
        .is_some_and(|remind_at| remind_at <= now && now < appointment.date_time)
}

/// Slots whose window `[slot, slot + tolerance)` contains `now`.
///
/// Yesterday's slots are checked too so a 23:55 dose is still caught by a
/// scan at 00:05.
pub fn due_medication_slots(
    now: NaiveDateTime,
    medication: &Medication,
    tolerance: Duration,
) -> Vec<(NaiveDate, NaiveTime)> {
    let today = now.date();
    let days = [today.pred_opt(), Some(today)];
    let slots = medication.slots();

    days.into_iter()
        .flatten()
        .filter(|date| medication.is_scheduled_on(date.weekday()))
        .flat_map(|date| slots.iter().map(move |slot| (date, *slot)))
        .filter(|(date, slot)| {
            let start = date.and_time(*slot);
            start <= now && now < start + tolerance
        })
        .collect()
}

fn speech_or(custom: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    match custom.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => fallback(),
    }
}
