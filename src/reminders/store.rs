use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::db::{self, Database, DatabaseError};
use crate::models::{Appointment, DispatchMarker, Medication, ReminderKind, User};

/// Everything the dispatcher reads and writes.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;

    async fn list_appointments(&self, user_id: &str) -> Result<Vec<Appointment>, DatabaseError>;

    async fn list_medications(&self, user_id: &str) -> Result<Vec<Medication>, DatabaseError>;

    /// Occurrence keys already notified for the user.
    async fn sent_keys(&self, user_id: &str) -> Result<HashSet<String>, DatabaseError>;

    /// Returns false when the key was already present.
    async fn mark_sent(&self, marker: &DispatchMarker) -> Result<bool, DatabaseError>;

    async fn remove_push_tokens(&self, user_id: &str, tokens: &[String]) -> Result<usize, DatabaseError>;

    async fn prune_ledger(&self, kind: ReminderKind, cutoff: NaiveDateTime) -> Result<usize, DatabaseError>;
}

/// SQLite adapter. Every call is a short statement under the shared
/// connection lock; the guard never crosses an await point.
#[derive(Clone)]
pub struct SqliteReminderStore {
    db: Database,
}

impl SqliteReminderStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        self.db.with_conn(db::list_users)
    }

    async fn list_appointments(&self, user_id: &str) -> Result<Vec<Appointment>, DatabaseError> {
        self.db
            .with_conn(|conn| db::list_appointments_for_user(conn, user_id))
    }

    async fn list_medications(&self, user_id: &str) -> Result<Vec<Medication>, DatabaseError> {
        self.db
            .with_conn(|conn| db::list_medications_for_user(conn, user_id))
    }

    async fn sent_keys(&self, user_id: &str) -> Result<HashSet<String>, DatabaseError> {
        self.db.with_conn(|conn| db::sent_keys_for_user(conn, user_id))
    }

    async fn mark_sent(&self, marker: &DispatchMarker) -> Result<bool, DatabaseError> {
        self.db.with_conn(|conn| db::record_dispatch(conn, marker))
    }

    async fn remove_push_tokens(&self, user_id: &str, tokens: &[String]) -> Result<usize, DatabaseError> {
        self.db
            .with_conn(|conn| db::remove_push_tokens(conn, user_id, tokens))
    }

    async fn prune_ledger(&self, kind: ReminderKind, cutoff: NaiveDateTime) -> Result<usize, DatabaseError> {
        self.db
            .with_conn(|conn| db::prune_dispatch_ledger(conn, kind, &cutoff))
    }
}
