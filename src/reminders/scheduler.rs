//! Periodic reminder scans.
//!
//! A tokio task ticks every `interval`, runs a scan through
//! `CoreState::run_dispatch` (which refuses to overlap a running scan),
//! and prunes old medication markers once a day. Shutdown lets the scan
//! in progress finish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core_state::{CoreState, ScanOutcome};

const PRUNE_EVERY: Duration = Duration::from_secs(24 * 60 * 60);

pub struct SchedulerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Ask the loop to stop after the current scan.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Stop and wait for the loop to exit.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Reminder scheduler task ended abnormally");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the scheduler. The first scan runs immediately.
pub fn start_reminder_scheduler(core: Arc<CoreState>, interval: Duration) -> SchedulerHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(scheduler_loop(core, interval, shutdown_rx));

    SchedulerHandle {
        shutdown_tx: Some(shutdown_tx),
        handle: Some(handle),
    }
}

async fn scheduler_loop(core: Arc<CoreState>, interval: Duration, mut shutdown_rx: oneshot::Receiver<()>) {
    tracing::info!(interval_secs = interval.as_secs(), "Reminder scheduler started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_prune: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {}
        }

        match core.run_dispatch().await {
            ScanOutcome::Completed(summary) if !summary.success => {
                tracing::warn!(error = ?summary.error, "Scheduled reminder scan failed");
            }
            ScanOutcome::Completed(_) => {}
            ScanOutcome::AlreadyRunning => {
                tracing::debug!("Scheduled scan skipped; a triggered scan is running");
            }
        }

        if last_prune.map_or(true, |at| at.elapsed() >= PRUNE_EVERY) {
            match core.prune_ledger().await {
                Ok(removed) => tracing::info!(removed, "Pruned dispatch ledger"),
                Err(e) => tracing::warn!(error = %e, "Dispatch ledger pruning failed"),
            }
            last_prune = Some(Instant::now());
        }
    }
    tracing::info!("Reminder scheduler shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core_state::testing::test_core;
    use crate::db;
    use crate::db::repository::fixtures::{at, medication, seed_user};
    use crate::flows::client::mock::MockCompletion;

    #[tokio::test]
    async fn first_tick_scans_and_stop_joins() {
        let t = test_core(AppConfig::default(), MockCompletion::new("{}"), at(2026, 3, 2, 8, 0));
        t.core
            .db()
            .with_conn(|conn| {
                seed_user(conn, "u-1", &["tok-a"]);
                db::insert_medication(conn, &medication("med-1", "u-1", &["08:00"], &["Lundi"]))
            })
            .unwrap();

        let handle = start_reminder_scheduler(t.core.clone(), Duration::from_secs(3600));
        for _ in 0..100 {
            if t.core.last_summary().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.stop().await;

        let summary = t.core.last_summary().expect("scheduler should have scanned");
        assert_eq!(summary.medications_sent, 1);
        assert_eq!(t.push.sent_count(), 2, "welcome plus medication");
    }

    #[tokio::test]
    async fn repeated_ticks_do_not_resend() {
        let t = test_core(AppConfig::default(), MockCompletion::new("{}"), at(2026, 3, 2, 8, 0));
        t.core
            .db()
            .with_conn(|conn| {
                seed_user(conn, "u-1", &["tok-a"]);
                db::insert_medication(conn, &medication("med-1", "u-1", &["08:00"], &["Lundi"]))
            })
            .unwrap();

        let handle = start_reminder_scheduler(t.core.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop().await;

        assert_eq!(t.push.sent_count(), 2);
    }
}
