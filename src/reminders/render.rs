use super::eligibility::{DueReminder, ReminderSource};
use crate::models::{Appointment, Medication};

/// Notification text shown by the operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub title: String,
    pub body: String,
}

pub fn render(due: &DueReminder) -> RenderedMessage {
    match &due.source {
        ReminderSource::Appointment(appointment) => RenderedMessage {
            title: "Appointment reminder".into(),
            body: format!(
                "You have an appointment with {} on {} at {}.",
                doctor_label(appointment),
                appointment.date_time.format("%A %-d %B"),
                appointment.date_time.format("%H:%M"),
            ),
        },
        ReminderSource::Medication { medication, slot, .. } => RenderedMessage {
            title: "Medication reminder".into(),
            body: format!(
                "Time to take {}. Scheduled for {}.",
                medication_label(medication),
                slot.format("%H:%M"),
            ),
        },
        ReminderSource::Welcome { name } => RenderedMessage {
            title: "Welcome to Carebell".into(),
            body: format!("Hello {name}, your reminders are now active."),
        },
    }
}

pub fn appointment_speech(appointment: &Appointment) -> String {
    format!(
        "Reminder: you have an appointment with {} at {}.",
        doctor_label(appointment),
        appointment.date_time.format("%H:%M"),
    )
}

pub fn medication_speech(medication: &Medication) -> String {
    format!("It is time to take {}.", medication_label(medication))
}

pub fn welcome_speech(name: &str) -> String {
    format!("Welcome {name}. I will remind you of your appointments and medications.")
}

/// "Dr. Martin (Cardiologist)", or "your doctor" when the name is blank.
fn doctor_label(appointment: &Appointment) -> String {
    let name = appointment.doctor.name.trim();
    let name = if name.is_empty() { "your doctor" } else { name };
    match appointment.doctor.specialty.as_deref().map(str::trim) {
        Some(specialty) if !specialty.is_empty() => format!("{name} ({specialty})"),
        _ => name.to_string(),
    }
}

fn medication_label(medication: &Medication) -> String {
    let name = medication.name.trim();
    let name = if name.is_empty() { "your medication" } else { name };
    let dosage = medication.dosage.trim();
    if dosage.is_empty() {
        name.to_string()
    } else {
        format!("{name} {dosage}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{appointment, at, medication};
    use crate::reminders::occurrence::OccurrenceKey;
    use chrono::NaiveTime;

    #[test]
    fn appointment_message_names_doctor_and_time() {
        let appt = appointment("appt-1", "u-1", at(2026, 3, 2, 10, 30));
        let due = DueReminder {
            occurrence: OccurrenceKey::appointment("u-1", "appt-1", appt.date_time),
            speak_text: appointment_speech(&appt),
            source: ReminderSource::Appointment(appt),
        };
        let message = render(&due);

        assert_eq!(message.title, "Appointment reminder");
        assert_eq!(
            message.body,
            "You have an appointment with Dr. Martin (Cardiologist) on Monday 2 March at 10:30."
        );
    }

    #[test]
    fn medication_message_includes_dosage_and_slot() {
        let med = medication("med-1", "u-1", &["08:00"], &["Lundi"]);
        let slot = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let date = at(2026, 3, 2, 0, 0).date();
        let due = DueReminder {
            occurrence: OccurrenceKey::medication("u-1", "med-1", date, slot),
            speak_text: medication_speech(&med),
            source: ReminderSource::Medication {
                medication: med,
                date,
                slot,
            },
        };
        let message = render(&due);

        assert_eq!(message.body, "Time to take Metformin 500mg. Scheduled for 08:00.");
        assert_eq!(due.speak_text, "It is time to take Metformin 500mg.");
    }

    #[test]
    fn blank_fields_fall_back_to_generic_labels() {
        let mut appt = appointment("appt-1", "u-1", at(2026, 3, 2, 10, 30));
        appt.doctor.name = " ".into();
        appt.doctor.specialty = None;
        assert_eq!(
            appointment_speech(&appt),
            "Reminder: you have an appointment with your doctor at 10:30."
        );

        let mut med = medication("med-1", "u-1", &["08:00"], &["Lundi"]);
        med.name.clear();
        med.dosage.clear();
        assert_eq!(medication_speech(&med), "It is time to take your medication.");
    }
}
