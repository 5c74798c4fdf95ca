use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::ReminderKind;

/// Dedup-ledger row: proof that one occurrence has been notified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchMarker {
    pub occurrence_key: String,
    pub user_id: String,
    pub kind: ReminderKind,
    pub entity_id: String,
    /// Date and slot for medications, scheduled date-time for appointments.
    pub slot: Option<String>,
    /// UTC timestamp of the successful delivery attempt.
    pub sent_at: NaiveDateTime,
}
