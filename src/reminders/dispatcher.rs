//! One reminder scan over every user.
//!
//! Per user: load schedules and sent keys, evaluate, then for each due
//! occurrence render, push to every token and write the SENT marker.
//! A marker is written only after at least one device accepted the push
//! (or, under `ZeroTokenPolicy::MarkSent`, when there was nobody to push to).
//! A failing user is logged and counted; the scan moves on.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::eligibility::{evaluate, DueReminder, EvaluationInput, EvaluationRules};
use super::push::{deliver_to_all, PushChannel, PushPayload};
use super::render::render;
use super::store::ReminderStore;
use super::timezone::ReminderClock;
use super::DispatchError;
use crate::config::{AppConfig, ZeroTokenPolicy};
use crate::models::{ReminderKind, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub rules: EvaluationRules,
    pub zero_token_policy: ZeroTokenPolicy,
    /// Users processed at the same time.
    pub concurrency: usize,
    pub prune_invalid_tokens: bool,
    /// Client URL embedded in every payload.
    pub origin_url: String,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rules: EvaluationRules {
                medication_tolerance: config.medication_tolerance,
                default_lead: config.default_appointment_lead,
            },
            zero_token_policy: config.zero_token_policy,
            concurrency: config.dispatch_concurrency,
            prune_invalid_tokens: config.prune_invalid_tokens,
            origin_url: config.origin_url.clone(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Result of one scan, returned to the trigger caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub success: bool,
    pub welcome_sent: u32,
    pub appointments_sent: u32,
    pub medications_sent: u32,
    pub users_scanned: u32,
    pub users_failed: u32,
    /// Token-level delivery failures across the scan.
    pub delivery_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchSummary {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn total_sent(&self) -> u32 {
        self.welcome_sent + self.appointments_sent + self.medications_sent
    }

    fn absorb(&mut self, outcome: UserOutcome) {
        self.welcome_sent += outcome.welcome_sent;
        self.appointments_sent += outcome.appointments_sent;
        self.medications_sent += outcome.medications_sent;
        self.delivery_failures += outcome.delivery_failures;
    }
}

#[derive(Debug, Default)]
struct UserOutcome {
    welcome_sent: u32,
    appointments_sent: u32,
    medications_sent: u32,
    delivery_failures: u32,
}

impl UserOutcome {
    fn record_sent(&mut self, kind: ReminderKind) {
        match kind {
            ReminderKind::Welcome => self.welcome_sent += 1,
            ReminderKind::Appointment => self.appointments_sent += 1,
            ReminderKind::Medication => self.medications_sent += 1,
        }
    }
}

pub struct ReminderDispatcher {
    store: Arc<dyn ReminderStore>,
    push: Arc<dyn PushChannel>,
    clock: ReminderClock,
    settings: DispatchSettings,
}

impl ReminderDispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        push: Arc<dyn PushChannel>,
        clock: ReminderClock,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            push,
            clock,
            settings,
        }
    }

    pub fn clock(&self) -> &ReminderClock {
        &self.clock
    }

    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    /// Run one full scan. Never fails as a whole unless the user list
    /// itself cannot be read.
    pub async fn run_scan(&self) -> DispatchSummary {
        let now = self.clock.local_now();
        let scan_id = Uuid::new_v4();
        tracing::info!(%scan_id, now = %now, channel = self.push.name(), "Reminder scan starting");

        let users = match self.store.list_users().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(%scan_id, error = %e, "Reminder scan aborted: could not load users");
                return DispatchSummary::failed(format!("Could not load users: {e}"));
            }
        };

        let mut summary = DispatchSummary {
            success: true,
            users_scanned: users.len() as u32,
            ..DispatchSummary::default()
        };

        let outcomes: Vec<(String, Result<UserOutcome, DispatchError>)> = stream::iter(users)
            .map(|user| async move {
                let result = self.process_user(&user).await;
                (user.id, result)
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    summary.users_failed += 1;
                    tracing::warn!(%scan_id, user_id = %user_id, error = %e, "Reminder processing failed for user");
                }
            }
        }

        tracing::info!(
            %scan_id,
            users = summary.users_scanned,
            failed_users = summary.users_failed,
            welcome = summary.welcome_sent,
            appointments = summary.appointments_sent,
            medications = summary.medications_sent,
            delivery_failures = summary.delivery_failures,
            "Reminder scan completed"
        );
        summary
    }

    async fn process_user(&self, user: &User) -> Result<UserOutcome, DispatchError> {
        // Evaluated per user so a slow scan still sees the right minute.
        let now = self.clock.local_now();
        let appointments = self.store.list_appointments(&user.id).await?;
        let medications = self.store.list_medications(&user.id).await?;
        let already_sent = self.store.sent_keys(&user.id).await?;

        let due = evaluate(&EvaluationInput {
            now,
            user,
            appointments: &appointments,
            medications: &medications,
            already_sent: &already_sent,
            rules: &self.settings.rules,
        });

        let mut outcome = UserOutcome::default();
        let mut invalid_tokens = BTreeSet::new();
        for reminder in &due {
            self.deliver(user, reminder, &mut outcome, &mut invalid_tokens).await;
        }

        if self.settings.prune_invalid_tokens && !invalid_tokens.is_empty() {
            let tokens: Vec<String> = invalid_tokens.into_iter().collect();
            match self.store.remove_push_tokens(&user.id, &tokens).await {
                Ok(removed) => {
                    tracing::info!(user_id = %user.id, removed, "Pruned unregistered push tokens")
                }
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Could not prune push tokens")
                }
            }
        }

        Ok(outcome)
    }

    async fn deliver(
        &self,
        user: &User,
        reminder: &DueReminder,
        outcome: &mut UserOutcome,
        invalid_tokens: &mut BTreeSet<String>,
    ) {
        let message = render(reminder);
        let payload = PushPayload::new(&message, &reminder.speak_text, &self.settings.origin_url);
        // Tokens rejected earlier in this scan are not retried.
        let tokens: Vec<String> = user
            .push_tokens
            .iter()
            .filter(|t| !invalid_tokens.contains(*t))
            .cloned()
            .collect();

        let report = deliver_to_all(self.push.as_ref(), &tokens, &payload).await;
        outcome.delivery_failures += report.failures.len() as u32;
        invalid_tokens.extend(report.invalid_tokens());

        let should_mark = if report.is_success() {
            outcome.record_sent(reminder.kind());
            true
        } else if report.had_no_tokens() {
            self.settings.zero_token_policy == ZeroTokenPolicy::MarkSent
        } else {
            false
        };

        if !should_mark {
            tracing::debug!(
                occurrence = %reminder.occurrence,
                attempted = report.attempted,
                "Reminder left due for the next scan"
            );
            return;
        }

        let marker = reminder.occurrence.to_marker(self.clock.now_utc().naive_utc());
        if let Err(e) = self.store.mark_sent(&marker).await {
            tracing::warn!(
                occurrence = %reminder.occurrence,
                error = %e,
                "Could not record sent reminder; it may be sent again"
            );
        }
    }
}
