use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// A recurring medication schedule: every `times` entry on every `days` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub dosage: String,
    /// Times of day, `HH:MM`.
    pub times: Vec<String>,
    /// Weekday names as entered (French or English).
    pub days: Vec<String>,
    pub voice_message: Option<String>,
}

impl Medication {
    /// Scheduled weekdays; unreadable entries are skipped.
    pub fn weekdays(&self) -> Vec<Weekday> {
        self.days.iter().filter_map(|d| parse_weekday(d)).collect()
    }

    /// Scheduled slots, sorted and de-duplicated; unreadable entries are skipped.
    pub fn slots(&self) -> Vec<NaiveTime> {
        let mut slots: Vec<NaiveTime> = self
            .times
            .iter()
            .filter_map(|t| parse_time_of_day(t))
            .collect();
        slots.sort();
        slots.dedup();
        slots
    }

    pub fn is_scheduled_on(&self, day: Weekday) -> bool {
        self.weekdays().contains(&day)
    }
}

/// Parse a weekday name in French or English, ignoring case and accents.
pub fn parse_weekday(raw: &str) -> Option<Weekday> {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' => 'e',
            other => other,
        })
        .collect();

    match folded.as_str() {
        "lundi" | "monday" | "mon" => Some(Weekday::Mon),
        "mardi" | "tuesday" | "tue" => Some(Weekday::Tue),
        "mercredi" | "wednesday" | "wed" => Some(Weekday::Wed),
        "jeudi" | "thursday" | "thu" => Some(Weekday::Thu),
        "vendredi" | "friday" | "fri" => Some(Weekday::Fri),
        "samedi" | "saturday" | "sat" => Some(Weekday::Sat),
        "dimanche" | "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parse `HH:MM` (also `H:MM`, `HH:MM:SS`, and `08h00`). Slots have
/// minute precision, so seconds are dropped.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let normalized = raw.trim().to_lowercase().replace('h', ":");
    NaiveTime::parse_from_str(&normalized, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&normalized, "%H:%M:%S"))
        .ok()
        .and_then(|t| t.with_second(0))
}
