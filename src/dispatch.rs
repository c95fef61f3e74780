//! Run pipeline, next-send preview and trigger authorization.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use uuid::Uuid;

use duetrack_schedule::next_send;
use duetrack_schedule::types::{NextSendResult, SchedulePolicy};
use duetrack_smtp::types::{is_valid_address, EmailMessage};

use crate::error::{DispatchError, DispatchResult};
use crate::recipients::{self, ResolvedRecipients};
use crate::sources::{Directory, DueItemSource, OutcomeSink, SettingsStore};
use crate::template;
use crate::transport::MailTransport;
use crate::types::{DeliveryMode, DeliveryOutcome, ReminderSettings, RunStatus, RunSummary};

/// The reminder engine. Wires the collaborator seams together and runs
/// one sequential pipeline per invocation; all state is loaded fresh
/// inside [`ReminderService::run`], nothing is cached across runs.
pub struct ReminderService {
    settings: Arc<dyn SettingsStore>,
    items: Arc<dyn DueItemSource>,
    directory: Arc<dyn Directory>,
    sink: Arc<dyn OutcomeSink>,
    transport: Arc<dyn MailTransport>,
    policy: SchedulePolicy,
}

impl ReminderService {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        items: Arc<dyn DueItemSource>,
        directory: Arc<dyn Directory>,
        sink: Arc<dyn OutcomeSink>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            settings,
            items,
            directory,
            sink,
            transport,
            policy: SchedulePolicy::default(),
        }
    }

    /// Override the grace window and monthly rollover day.
    pub fn with_policy(mut self, policy: SchedulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs the named reminder once. Delivery-path failures come back
    /// as a `Failed` summary, never as `Err`; skipped runs (paused, no
    /// recipients) record no delivery outcome.
    pub async fn run(&self, reminder: &str, now: DateTime<Utc>, test_mode: bool) -> RunSummary {
        info!("[reminder] run start: {} (test={})", reminder, test_mode);

        let settings = match self.settings.load(reminder).await {
            Ok(settings) => settings,
            Err(e) => return self.fail(reminder, now, test_mode, e).await,
        };

        if !settings.frequency.enabled {
            info!("[reminder] {} is paused, nothing to do", reminder);
            return RunSummary::skipped(reminder, RunStatus::Paused, now);
        }

        if let Err(e) = validate_smtp(&settings) {
            return self.fail(reminder, now, test_mode, e).await;
        }

        let items = match self.items.due_items(settings.schedule.lookahead_days).await {
            Ok(items) => items,
            Err(e) => return self.fail(reminder, now, test_mode, e).await,
        };

        let recipients = recipients::resolve(
            &settings.recipients,
            self.directory.as_ref(),
            &settings.smtp.from_email,
        )
        .await;
        if recipients.is_empty() {
            info!("[reminder] {} resolved no recipients, skipping", reminder);
            return RunSummary::skipped(reminder, RunStatus::NoRecipients, now);
        }

        // Report date is today in the reminder's configured zone, so a
        // run triggered late at night lands on the right calendar day.
        let tz = next_send::resolve_timezone(&settings.frequency.timezone);
        let report_date = now.with_timezone(&tz).date_naive();
        let lookahead = settings.schedule.lookahead_days;

        let counts = template::count_items(&items, report_date, lookahead);
        let compiled = template::compile(&settings.template, &items, report_date, lookahead);

        let message = EmailMessage {
            subject: compiled.subject,
            html_body: compiled.html_body,
            to: recipients.to.clone(),
            cc: recipients.cc.clone(),
            bcc: recipients.bcc.clone(),
        };

        match self.transport.send(&settings.smtp, &message).await {
            Ok(()) => {
                info!(
                    "[reminder] {} sent to {} recipients ({} items, {} expired)",
                    reminder,
                    recipients.total(),
                    counts.total,
                    counts.expired
                );
                self.record_outcome(
                    reminder,
                    &recipients,
                    settings.recipients.delivery_mode,
                    &message.subject,
                    &message.html_body,
                    true,
                    None,
                    test_mode,
                )
                .await;
                RunSummary {
                    status: RunStatus::Sent,
                    reminder: reminder.to_string(),
                    items_considered: counts.total,
                    expired_count: counts.expired,
                    warning_count: counts.expiring,
                    recipient_count: recipients.total(),
                    emails_sent: 1,
                    error: None,
                    completed_at: now,
                }
            }
            Err(e) => {
                let e = DispatchError::from(e);
                error!("[reminder] {} delivery failed: {}", reminder, e);
                self.record_outcome(
                    reminder,
                    &recipients,
                    settings.recipients.delivery_mode,
                    &message.subject,
                    &message.html_body,
                    false,
                    Some(e.to_string()),
                    test_mode,
                )
                .await;
                RunSummary {
                    status: RunStatus::Failed,
                    reminder: reminder.to_string(),
                    items_considered: counts.total,
                    expired_count: counts.expired,
                    warning_count: counts.expiring,
                    recipient_count: recipients.total(),
                    emails_sent: 0,
                    error: Some(e.to_string()),
                    completed_at: now,
                }
            }
        }
    }

    /// Evaluates the configured cadence without sending anything.
    /// Recipients are resolved only to learn whether any exist.
    pub async fn next_send_preview(
        &self,
        reminder: &str,
        now: DateTime<Utc>,
    ) -> DispatchResult<NextSendResult> {
        let settings = self.settings.load(reminder).await?;
        let recipients = recipients::resolve(
            &settings.recipients,
            self.directory.as_ref(),
            &settings.smtp.from_email,
        )
        .await;
        Ok(next_send::evaluate(
            &settings.frequency,
            &settings.schedule,
            &self.policy,
            !recipients.is_empty(),
            now,
        ))
    }

    /// Failure exit shared by the pre-delivery steps. Records a failed
    /// outcome so the attempt shows up in the log even when nothing
    /// reached the wire.
    async fn fail(
        &self,
        reminder: &str,
        now: DateTime<Utc>,
        test_mode: bool,
        error: DispatchError,
    ) -> RunSummary {
        error!("[reminder] {} run failed: {}", reminder, error);
        let empty = ResolvedRecipients::default();
        self.record_outcome(
            reminder,
            &empty,
            DeliveryMode::default(),
            "",
            "",
            false,
            Some(error.to_string()),
            test_mode,
        )
        .await;
        RunSummary {
            status: RunStatus::Failed,
            reminder: reminder.to_string(),
            items_considered: 0,
            expired_count: 0,
            warning_count: 0,
            recipient_count: 0,
            emails_sent: 0,
            error: Some(error.to_string()),
            completed_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_outcome(
        &self,
        reminder: &str,
        recipients: &ResolvedRecipients,
        delivery_mode: DeliveryMode,
        subject: &str,
        rendered_body: &str,
        success: bool,
        error: Option<String>,
        test_mode: bool,
    ) {
        let outcome = DeliveryOutcome {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            template_name: reminder.to_string(),
            recipient_count: recipients.total(),
            recipients: recipients
                .envelope()
                .into_iter()
                .map(str::to_string)
                .collect(),
            delivery_mode,
            subject: subject.to_string(),
            rendered_body: rendered_body.to_string(),
            success,
            error,
            provider: self.transport.name().to_string(),
            test_mode,
        };
        if let Err(e) = self.sink.record(&outcome).await {
            warn!("[reminder] outcome log failed: {}", e);
        }
    }
}

/// Constant-time trigger-secret check for externally triggered runs.
/// An empty configured secret always denies; the trigger stays locked
/// until one is set.
pub fn verify_trigger_secret(expected: &str, presented: &str) -> DispatchResult<()> {
    if !expected.is_empty() && constant_time_eq(expected.as_bytes(), presented.as_bytes()) {
        Ok(())
    } else {
        Err(DispatchError::authorization("Invalid trigger secret"))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn validate_smtp(settings: &ReminderSettings) -> DispatchResult<()> {
    if settings.smtp.host.is_empty() {
        return Err(DispatchError::configuration("SMTP host is not configured"));
    }
    if !is_valid_address(&settings.smtp.from_email) {
        return Err(DispatchError::configuration(format!(
            "Invalid sender address: {:?}",
            settings.smtp.from_email
        )));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
