use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Doctor as referenced from an appointment (denormalized at booking time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRef {
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
}

/// A booked appointment. `date_time` is wall-clock time in the configured
/// reminder timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub user_id: String,
    pub doctor: DoctorRef,
    pub date_time: NaiveDateTime,
    /// Free-form lead-time descriptor as entered by the user ("1h", "30min", "1j").
    pub reminder_lead: Option<String>,
    pub voice_message: Option<String>,
}

impl Appointment {
    /// Moment the reminder becomes due, using `default_lead` when the
    /// descriptor is absent or unreadable. `None` when the lead reaches
    /// outside the representable calendar.
    pub fn remind_at(&self, default_lead: Duration) -> Option<NaiveDateTime> {
        let lead = self
            .reminder_lead
            .as_deref()
            .and_then(|raw| raw.parse::<LeadTime>().ok())
            .map(LeadTime::as_duration)
            .unwrap_or(default_lead);
        self.date_time.checked_sub_signed(lead)
    }
}

/// Parsed reminder lead time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadTime {
    minutes: i64,
}

impl LeadTime {
    /// Longest accepted lead: one year.
    pub const MAX_MINUTES: i64 = 365 * 24 * 60;

    pub fn from_minutes(minutes: i64) -> Option<Self> {
        (minutes > 0 && minutes <= Self::MAX_MINUTES).then_some(Self { minutes })
    }

    pub fn minutes(self) -> i64 {
        self.minutes
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(self.minutes)
    }
}

impl std::str::FromStr for LeadTime {
    type Err = String;

    /// Accepts `45`, `15min`, `30 min`, `15m`, `2h`, `2 heures`, `1d`, `1j`, `1 jour`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_lowercase();
        let digits_end = raw
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(raw.len());
        let (number, unit) = raw.split_at(digits_end);
        let amount: i64 = number
            .parse()
            .map_err(|_| format!("lead time must start with a number: {s}"))?;

        let multiplier = match unit.trim() {
            "" | "m" | "min" | "mins" | "minute" | "minutes" => 1,
            "h" | "hr" | "hrs" | "hour" | "hours" | "heure" | "heures" => 60,
            "d" | "day" | "days" | "j" | "jour" | "jours" => 24 * 60,
            other => return Err(format!("unknown lead time unit: {other}")),
        };

        amount
            .checked_mul(multiplier)
            .and_then(LeadTime::from_minutes)
            .ok_or_else(|| format!("lead time must be between 1 minute and 365 days: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn appointment(lead: Option<&str>) -> Appointment {
        Appointment {
            id: "appt-1".into(),
            user_id: "u-1".into(),
            doctor: DoctorRef {
                id: "doc-1".into(),
                name: "Dr. Martin".into(),
                specialty: Some("Cardiologist".into()),
            },
            date_time: at(14, 30),
            reminder_lead: lead.map(String::from),
            voice_message: None,
        }
    }

    #[test]
    fn parses_common_descriptors() {
        assert_eq!("45".parse::<LeadTime>().unwrap().minutes(), 45);
        assert_eq!("15min".parse::<LeadTime>().unwrap().minutes(), 15);
        assert_eq!("30 min".parse::<LeadTime>().unwrap().minutes(), 30);
        assert_eq!("2h".parse::<LeadTime>().unwrap().minutes(), 120);
        assert_eq!("2 heures".parse::<LeadTime>().unwrap().minutes(), 120);
        assert_eq!("1d".parse::<LeadTime>().unwrap().minutes(), 1440);
        assert_eq!("1 jour".parse::<LeadTime>().unwrap().minutes(), 1440);
        assert_eq!("1J".parse::<LeadTime>().unwrap().minutes(), 1440);
    }

    #[test]
    fn rejects_unreadable_descriptors() {
        assert!("soon".parse::<LeadTime>().is_err());
        assert!("0h".parse::<LeadTime>().is_err());
        assert!("3 weeks".parse::<LeadTime>().is_err());
        assert!("".parse::<LeadTime>().is_err());
    }

    #[test]
    fn rejects_oversized_leads() {
        assert_eq!("365j".parse::<LeadTime>().unwrap().minutes(), LeadTime::MAX_MINUTES);
        assert!("366j".parse::<LeadTime>().is_err());
        assert!("1000000000j".parse::<LeadTime>().is_err());
        assert!("99999999999999999999".parse::<LeadTime>().is_err());
    }

    #[test]
    fn oversized_lead_uses_default() {
        let appt = appointment(Some("1000000000j"));
        assert_eq!(appt.remind_at(Duration::minutes(60)), Some(at(13, 30)));
    }

    #[test]
    fn remind_at_out_of_range_is_none() {
        let mut appt = appointment(None);
        appt.date_time = NaiveDateTime::MIN;
        assert_eq!(appt.remind_at(Duration::minutes(60)), None);
    }

    #[test]
    fn remind_at_uses_descriptor() {
        let appt = appointment(Some("1h"));
        assert_eq!(appt.remind_at(Duration::minutes(15)), Some(at(13, 30)));
    }

    #[test]
    fn remind_at_falls_back_to_default_lead() {
        assert_eq!(
            appointment(None).remind_at(Duration::minutes(60)),
            Some(at(13, 30))
        );
        assert_eq!(
            appointment(Some("whenever")).remind_at(Duration::minutes(30)),
            Some(at(14, 0))
        );
    }
}
