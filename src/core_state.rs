//! Application state shared by the HTTP surface and the scheduler.
//!
//! Built once at startup and wrapped in `Arc`. Holds the shared database
//! handle, the reminder dispatcher, the flow runner, and the overlap guard
//! that keeps two scans of this process from running at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mockable::DefaultClock;
use thiserror::Error;

use crate::config::AppConfig;
use crate::db::{Database, DatabaseError};
use crate::flows::{FlowCache, FlowError, FlowRunner, HttpCompletionClient, TextCompletion};
use crate::models::ReminderKind;
use crate::reminders::push::{channel_from_config, PushChannel, PushError};
use crate::reminders::store::SqliteReminderStore;
use crate::reminders::timezone::{ReminderClock, SharedClock};
use crate::reminders::{DispatchSettings, DispatchSummary, ReminderDispatcher};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Push channel error: {0}")]
    Push(#[from] PushError),
    #[error("Completion client error: {0}")]
    Flow(#[from] FlowError),
}

/// Result of asking for a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed(DispatchSummary),
    /// Another scan of this process is still running; nothing was done.
    AlreadyRunning,
}

pub struct CoreState {
    config: AppConfig,
    db: Database,
    dispatcher: ReminderDispatcher,
    flows: FlowRunner,
    scan_running: AtomicBool,
    last_summary: Mutex<Option<DispatchSummary>>,
}

impl CoreState {
    pub fn new(
        config: AppConfig,
        db: Database,
        push: Arc<dyn PushChannel>,
        completion: Arc<dyn TextCompletion>,
        clock: SharedClock,
    ) -> Self {
        let dispatcher = ReminderDispatcher::new(
            Arc::new(SqliteReminderStore::new(db.clone())),
            push,
            ReminderClock::new(clock.clone(), config.utc_offset),
            DispatchSettings::from_config(&config),
        );
        let cache_ttl = chrono::Duration::from_std(config.ai.cache_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let flows = FlowRunner::new(
            completion,
            FlowCache::new(config.ai.cache_capacity, cache_ttl, clock),
        );

        Self {
            config,
            db,
            dispatcher,
            flows,
            scan_running: AtomicBool::new(false),
            last_summary: Mutex::new(None),
        }
    }

    /// Production wiring: on-disk database, configured push gateway and
    /// completion backend, host clock.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let db = Database::open(&config.database_path)?;
        let push = channel_from_config(&config.push)?;
        let completion = Arc::new(HttpCompletionClient::from_config(&config.ai)?);
        Ok(Self::new(config, db, push, completion, Arc::new(DefaultClock)))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn flows(&self) -> &FlowRunner {
        &self.flows
    }

    pub fn is_scan_running(&self) -> bool {
        self.scan_running.load(Ordering::Acquire)
    }

    /// Run one scan unless one is already in flight.
    pub async fn run_dispatch(&self) -> ScanOutcome {
        if self
            .scan_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!("Reminder scan already running; skipping");
            return ScanOutcome::AlreadyRunning;
        }
        let _guard = ScanGuard(&self.scan_running);

        let summary = self.dispatcher.run_scan().await;
        match self.last_summary.lock() {
            Ok(mut last) => *last = Some(summary.clone()),
            Err(_) => tracing::warn!("Last-summary lock poisoned; status not updated"),
        }
        ScanOutcome::Completed(summary)
    }

    pub fn last_summary(&self) -> Option<DispatchSummary> {
        self.last_summary.lock().ok().and_then(|last| last.clone())
    }

    /// Drop medication markers older than the retention window. Appointment
    /// and welcome markers are kept: losing them would allow a resend.
    pub async fn prune_ledger(&self) -> Result<usize, DatabaseError> {
        let cutoff = self.dispatcher.clock().now_utc().naive_utc()
            - chrono::Duration::days(self.config.ledger_retention_days);
        self.dispatcher
            .store()
            .prune_ledger(ReminderKind::Medication, cutoff)
            .await
    }
}

/// Clears the running flag however the scan ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
