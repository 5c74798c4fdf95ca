//! Reminder notification pipeline.
//!
//! Scan → eligibility → render → push → dedup ledger:
//! - `eligibility` decides which occurrences are due at an injected instant
//! - `render` turns a due occurrence into a title/body pair
//! - `push` delivers to every registered token of a user
//! - `voice` hands the spoken text from the background agent to a client window
//! - `dispatcher` runs one scan over all users and writes SENT markers
//! - `scheduler` runs scans periodically

pub mod dispatcher;
pub mod eligibility;
pub mod occurrence;
pub mod push;
pub mod render;
pub mod scheduler;
pub mod store;
pub mod timezone;
pub mod voice;

use thiserror::Error;

use crate::db::DatabaseError;

pub use dispatcher::{DispatchSettings, DispatchSummary, ReminderDispatcher};
pub use eligibility::{evaluate, DueReminder, EvaluationInput, EvaluationRules, ReminderSource};
pub use occurrence::OccurrenceKey;
pub use push::{deliver_to_all, DeliveryReport, PushChannel, PushData, PushError, PushPayload};
pub use render::{render, RenderedMessage};
pub use store::{ReminderStore, SqliteReminderStore};
pub use timezone::ReminderClock;

/// Failure of one user's unit of work during a scan.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}
